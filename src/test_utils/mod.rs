//! Shared helpers for the crate's unit tests: logging setup, an
//! in-memory document store with failure injection, and scenario
//! document builders.
mod common;
mod memory_store;
mod scenario;

pub use common::*;
pub use memory_store::*;
pub use scenario::*;
