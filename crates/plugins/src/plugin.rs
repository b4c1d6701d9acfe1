//! Plugin contract.

use thiserror::Error;

use campus_core::{AppConfig, ConfigError};

use crate::registry::ServiceRegistry;

/// Plugin configuration/setup error.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A required config section or key was absent or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The plugin needs a host service that was never registered.
    #[error("required service not registered: {0}")]
    MissingService(&'static str),

    #[error("plugin setup failed: {0}")]
    Setup(String),
}

/// A statically known extension, selected by `plugins.enabled`.
///
/// `configure` runs exactly once at startup, before the scheduler begins
/// dispatching. A plugin binds its own config sub-tree here and must fail
/// immediately — naming the missing key — rather than proceed with defaults.
pub trait Plugin: Send + Sync {
    /// Catalog name; also the `plugins.<name>` config section.
    fn name(&self) -> &str;

    fn configure(
        &self,
        services: &mut ServiceRegistry,
        config: &AppConfig,
    ) -> Result<(), PluginError>;
}
