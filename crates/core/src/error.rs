//! Configuration error model.

use thiserror::Error;

/// Result type for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Startup-fatal configuration error.
///
/// Every variant names the offending section or key so an operator can fix
/// the deployment without reading source. These are raised at load time,
/// never deferred to first execution.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A task is registered/enabled but has no `tasks.<name>` section.
    #[error("missing required config section `tasks.{0}`")]
    MissingTaskSection(String),

    /// A required key inside an existing section is absent.
    #[error("missing required config key `{0}`")]
    MissingKey(String),

    /// A plugin is enabled but has no `plugins.<name>` section.
    #[error("missing required config section `plugins.{0}`")]
    MissingPluginSection(String),

    /// A key is present but its value is unusable.
    #[error("invalid config value for `{key}`: {reason}")]
    Invalid { key: String, reason: String },

    /// The underlying source (file/env) failed to load or deserialize.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
