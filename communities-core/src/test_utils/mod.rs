//! Test utilities shared by unit tests, integration tests and benches
//!
//! Builders for communities seen from any node, fixed-balance oracles, an
//! in-memory store and deterministic key material.

pub mod assertions;
pub mod async_helpers;
pub mod deterministic_rng;
pub mod fixtures;
pub mod oracles;

pub use assertions::*;
pub use async_helpers::*;
pub use deterministic_rng::*;
pub use fixtures::*;
pub use oracles::*;

pub use crate::community::ManualTimeSource;
pub use crate::manager::InMemoryStore;
