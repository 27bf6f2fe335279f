//! v1 API Data Transfer Objects.
//!
//! Wire types for the v1 REST API, kept separate from the decoding and
//! flight domain types.

pub mod boarding_passes;

pub use boarding_passes::*;
