//! `campus-core` — shared foundation for the background task runtime.
//!
//! Configuration and error primitives only; no infrastructure concerns beyond
//! loading the configuration tree itself.

pub mod config;
pub mod error;

pub use config::{
    AppConfig, DatabaseConfig, PluginErrorPolicy, PluginsConfig, TaskConfig,
};
pub use error::{ConfigError, ConfigResult};
