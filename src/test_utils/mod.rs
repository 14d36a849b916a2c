//! Shared helpers for the unit tests: recording listeners and a registry
//! wired to an in-memory tree.
mod common;
mod mock;

pub use common::*;
pub use mock::*;
