//! Test utilities and helpers for SharedStore
//!
//! Shared by the unit tests, the integration tests under `tests/` and the
//! benchmarks.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
