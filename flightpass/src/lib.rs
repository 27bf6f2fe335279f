//! Flight record backend that recovers flight codes from boarding-pass
//! images.
//!
//! [`decode`] holds the decoding pipeline; [`api`] exposes it over HTTP
//! together with the [`flights`] store and the [`storage`] sink.

pub mod api;
pub mod config;
pub mod decode;
pub mod error;
pub mod flights;
pub mod storage;
