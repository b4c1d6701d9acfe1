//! Process configuration: loading and representation.
//!
//! The configuration is loaded once at startup and threaded through
//! constructors as a plain value; there is no global settings holder.
//! Required sections that are absent fail the load, not the first run.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Environment variable naming the configuration file path.
pub const CONFIG_PATH_ENV: &str = "CAMPUS_CONFIG";

/// Default configuration file (without extension, `config` crate convention).
pub const DEFAULT_CONFIG_NAME: &str = "campus";

/// Top-level configuration tree for one worker process.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    /// Per-task configuration, keyed by task name.
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// Shared-database connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    8
}

/// Per-task settings (`tasks.<name>`).
///
/// Immutable for the process lifetime. All keys except `batch_size` are
/// required; `batch_size` is required only for incremental sync tasks, which
/// enforce it via [`TaskConfig::require_batch_size`].
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub enabled: bool,
    /// Standard 5-field cron expression, evaluated in UTC.
    pub cron_schedule: String,
    /// Re-attempts after a failed run (0 = no retries).
    pub retry_count: u32,
    /// Seconds between re-attempts.
    pub retry_interval: u64,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

impl TaskConfig {
    /// `retry_interval` as a duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_interval)
    }

    /// Batch size for sync tasks; absence is a configuration error naming
    /// the missing key.
    pub fn require_batch_size(&self, task_name: &str) -> ConfigResult<u32> {
        self.batch_size
            .ok_or_else(|| ConfigError::MissingKey(format!("tasks.{task_name}.batch_size")))
    }
}

/// What to do when a plugin fails to configure at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginErrorPolicy {
    /// Abort process startup (reference behavior, conservative).
    #[default]
    Abort,
    /// Log, skip the failing plugin, continue with the rest.
    Disable,
}

/// Plugin selection and per-plugin settings (`plugins.*`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginsConfig {
    /// Names of plugins to load, in order. Names must exist in the catalog.
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub on_error: PluginErrorPolicy,
    /// Raw per-plugin sub-trees; each plugin binds and validates its own.
    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl AppConfig {
    /// Load from the default file (`campus.toml`, overridable via
    /// `CAMPUS_CONFIG`) layered under `CAMPUS__*` environment variables.
    pub fn load() -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        builder = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => builder.add_source(config::File::with_name(&path)),
            Err(_) => builder.add_source(
                config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
            ),
        };

        let cfg = builder
            .add_source(
                config::Environment::with_prefix("CAMPUS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Load from an explicit file path (tests, tooling).
    pub fn from_file(path: &str) -> ConfigResult<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Parse from a TOML string (tests).
    pub fn from_toml(toml: &str) -> ConfigResult<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Configuration for a task, or an error naming the missing section.
    pub fn task(&self, name: &str) -> ConfigResult<&TaskConfig> {
        self.tasks
            .get(name)
            .ok_or_else(|| ConfigError::MissingTaskSection(name.to_string()))
    }

    /// A plugin's raw config sub-tree, or an error naming the missing section.
    pub fn plugin_section(&self, name: &str) -> ConfigResult<&serde_json::Value> {
        self.plugins
            .settings
            .get(name)
            .ok_or_else(|| ConfigError::MissingPluginSection(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [database]
        url = "postgres://localhost/campus"

        [tasks.sync_sms_log]
        enabled = true
        cron_schedule = "*/5 * * * *"
        retry_count = 3
        retry_interval = 30
        batch_size = 100

        [tasks.sync_payment_log]
        enabled = false
        cron_schedule = "0 2 * * *"
        retry_count = 1
        retry_interval = 60

        [plugins]
        enabled = ["sms"]

        [plugins.sms]
        provider = "console"
        api_key = "k"
        sender_id = "campus"
    "#;

    #[test]
    fn parses_full_sample() {
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(cfg.database.url, "postgres://localhost/campus");
        assert_eq!(cfg.database.max_connections, 8);

        let sms = cfg.task("sync_sms_log").unwrap();
        assert!(sms.enabled);
        assert_eq!(sms.cron_schedule, "*/5 * * * *");
        assert_eq!(sms.retry_count, 3);
        assert_eq!(sms.retry_delay(), Duration::from_secs(30));
        assert_eq!(sms.require_batch_size("sync_sms_log").unwrap(), 100);

        assert_eq!(cfg.plugins.enabled, vec!["sms".to_string()]);
        assert_eq!(cfg.plugins.on_error, PluginErrorPolicy::Abort);
    }

    #[test]
    fn missing_task_section_names_the_section() {
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();

        let err = cfg.task("sync_forum_posts").unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required config section `tasks.sync_forum_posts`"
        );
    }

    #[test]
    fn missing_batch_size_names_the_key() {
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();

        let task = cfg.task("sync_payment_log").unwrap();
        let err = task.require_batch_size("sync_payment_log").unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required config key `tasks.sync_payment_log.batch_size`"
        );
    }

    #[test]
    fn missing_required_task_key_fails_deserialization() {
        let toml = r#"
            [database]
            url = "postgres://localhost/campus"

            [tasks.broken]
            enabled = true
            retry_count = 3
            retry_interval = 30
        "#;

        // cron_schedule is required; the load itself must fail.
        let err = AppConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("cron_schedule"), "{err}");
    }

    #[test]
    fn plugin_sections_are_exposed_raw() {
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();

        let section = cfg.plugin_section("sms").unwrap();
        assert_eq!(section["provider"], "console");

        let err = cfg.plugin_section("email").unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required config section `plugins.email`"
        );
    }
}
