pub mod boarding_passes;
pub mod flights;
pub(crate) mod health;

pub use health::health_check;
