//! Service registry adapter over a hierarchical, watchable key space.
//!
//! Providers register urls as nodes, consumers subscribe and get the full
//! current list of matching urls on every change. The coordination service
//! itself is reached through the [`WatchClient`] and [`Transporter`] traits;
//! [`MemoryTransporter`] serves an in-process tree.

mod client;
mod config;
pub mod constants;
mod errors;
mod metrics;
mod registry;
mod url;
pub mod utils;

pub use client::*;
pub use config::*;
pub use errors::*;
pub use metrics::*;
pub use registry::*;
pub use url::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
