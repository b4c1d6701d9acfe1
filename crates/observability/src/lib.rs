//! Tracing/logging initialization for worker processes.

pub mod tracing;

pub use tracing::{init, init_with_filter};
