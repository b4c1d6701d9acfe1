//! `campus-worker` — the background task runtime process.
//!
//! Startup order is fixed: configuration, database, plugin loading, then the
//! scheduler. Plugins finish loading before the scheduler dispatches
//! anything, and they are never loaded or unloaded while tasks execute.

pub mod services;

pub use services::{Worker, build, run};
