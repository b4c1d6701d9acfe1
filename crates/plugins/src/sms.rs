//! SMS integration plugin.
//!
//! Registers an [`SmsGateway`] implementation (variant selected by
//! `plugins.sms.provider`) and the `sync_sms_log` incremental sync task that
//! ships the host's `sms_log` rows into the activity log. Actual vendor
//! delivery is out of scope here; the shipped gateways are the dev/test
//! variants.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use campus_activity::{ActivityLogStore, IncrementalSyncTask};
use campus_core::{AppConfig, ConfigError};
use campus_infra::PgSmsLogSource;

use crate::capabilities::{CapabilityError, SmsGateway};
use crate::plugin::{Plugin, PluginError};
use crate::registry::ServiceRegistry;

pub const PLUGIN_NAME: &str = "sms";
pub const SYNC_TASK_NAME: &str = "sync_sms_log";

#[derive(Debug, Clone, Deserialize)]
struct SmsPluginConfig {
    provider: SmsProvider,
    api_key: String,
    sender_id: String,
}

/// Statically known gateway variants, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SmsProvider {
    /// Logs messages instead of delivering them.
    Console,
    /// In-process outbox, inspectable by tests and dev tooling.
    Memory,
}

/// The SMS plugin entry point.
pub struct SmsPlugin;

impl Plugin for SmsPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn configure(
        &self,
        services: &mut ServiceRegistry,
        config: &AppConfig,
    ) -> Result<(), PluginError> {
        // Bind our own config sub-tree first; a missing section or key fails
        // here, at load time, never at first send.
        let section = config.plugin_section(PLUGIN_NAME)?;
        let plugin_config: SmsPluginConfig = serde_json::from_value(section.clone())
            .map_err(|e| PluginError::from(ConfigError::invalid("plugins.sms", e.to_string())))?;
        if plugin_config.api_key.is_empty() {
            return Err(ConfigError::invalid("plugins.sms.api_key", "must not be empty").into());
        }

        // The sync task's settings are required config for this plugin,
        // whether or not the scheduler later finds the task enabled.
        let task_config = config.task(SYNC_TASK_NAME)?;
        let batch_size = task_config.require_batch_size(SYNC_TASK_NAME)?;

        let gateway: Arc<dyn SmsGateway> = match plugin_config.provider {
            SmsProvider::Console => Arc::new(ConsoleSmsGateway {
                sender_id: plugin_config.sender_id.clone(),
            }),
            SmsProvider::Memory => Arc::new(MemorySmsGateway::default()),
        };
        services.register::<dyn SmsGateway>(gateway);

        let pool = services.require::<sqlx::PgPool>("PgPool")?;
        let sink = services.require::<dyn ActivityLogStore>("ActivityLogStore")?;
        let task = IncrementalSyncTask::new(PgSmsLogSource::new((*pool).clone()), sink, batch_size);
        services.register_task(Arc::new(task));

        info!(
            provider = ?plugin_config.provider,
            task = SYNC_TASK_NAME,
            batch_size,
            "sms plugin configured"
        );
        Ok(())
    }
}

/// Dev/test gateway: logs the message and fabricates a message id.
struct ConsoleSmsGateway {
    sender_id: String,
}

#[async_trait]
impl SmsGateway for ConsoleSmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<String, CapabilityError> {
        if to.is_empty() {
            return Err(CapabilityError::Rejected("empty recipient".to_string()));
        }
        let message_id = Uuid::now_v7().to_string();
        info!(
            sender = %self.sender_id,
            to,
            chars = body.chars().count(),
            message_id = %message_id,
            "sms sent (console gateway)"
        );
        Ok(message_id)
    }
}

/// One message queued on the in-process gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundSms {
    pub to: String,
    pub body: String,
    pub queued_at: DateTime<Utc>,
}

/// In-process outbox gateway for tests and dev tooling.
#[derive(Debug, Default)]
pub struct MemorySmsGateway {
    outbox: Mutex<Vec<OutboundSms>>,
}

impl MemorySmsGateway {
    pub fn outbox(&self) -> Vec<OutboundSms> {
        self.outbox.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsGateway for MemorySmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<String, CapabilityError> {
        if to.is_empty() {
            return Err(CapabilityError::Rejected("empty recipient".to_string()));
        }
        let message_id = Uuid::now_v7().to_string();
        self.outbox.lock().unwrap().push(OutboundSms {
            to: to.to_string(),
            body: body.to_string(),
            queued_at: Utc::now(),
        });
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use campus_activity::InMemoryActivityLogStore;

    use super::*;

    fn lazy_pool() -> sqlx::PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/campus_test")
            .unwrap()
    }

    fn registry_with_host_services() -> ServiceRegistry {
        let mut services = ServiceRegistry::new();
        services.register(Arc::new(lazy_pool()));
        let sink: Arc<dyn ActivityLogStore> = InMemoryActivityLogStore::arc();
        services.register::<dyn ActivityLogStore>(sink);
        services
    }

    fn full_config() -> AppConfig {
        AppConfig::from_toml(
            r#"
            [database]
            url = "postgres://localhost/campus"

            [tasks.sync_sms_log]
            enabled = true
            cron_schedule = "*/5 * * * *"
            retry_count = 3
            retry_interval = 30
            batch_size = 100

            [plugins]
            enabled = ["sms"]

            [plugins.sms]
            provider = "console"
            api_key = "test-key"
            sender_id = "campus"
            "#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn configures_gateway_and_sync_task() {
        let mut services = registry_with_host_services();

        SmsPlugin.configure(&mut services, &full_config()).unwrap();

        assert!(services.get::<dyn SmsGateway>().is_some());
        let tasks = services.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name(), SYNC_TASK_NAME);
    }

    #[tokio::test]
    async fn missing_plugin_section_fails_at_load_time() {
        let mut services = registry_with_host_services();
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "postgres://localhost/campus"
            "#,
        )
        .unwrap();

        let err = SmsPlugin.configure(&mut services, &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required config section `plugins.sms`"
        );
    }

    #[tokio::test]
    async fn missing_batch_size_fails_naming_the_key() {
        let mut services = registry_with_host_services();
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "postgres://localhost/campus"

            [tasks.sync_sms_log]
            enabled = true
            cron_schedule = "*/5 * * * *"
            retry_count = 3
            retry_interval = 30

            [plugins.sms]
            provider = "console"
            api_key = "test-key"
            sender_id = "campus"
            "#,
        )
        .unwrap();

        let err = SmsPlugin.configure(&mut services, &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required config key `tasks.sync_sms_log.batch_size`"
        );
    }

    #[test]
    fn missing_host_pool_is_a_descriptive_error() {
        // Registry without the database pool the sync task needs.
        let mut services = ServiceRegistry::new();
        let sink: Arc<dyn ActivityLogStore> = InMemoryActivityLogStore::arc();
        services.register::<dyn ActivityLogStore>(sink);

        let err = SmsPlugin.configure(&mut services, &full_config()).unwrap_err();
        assert_eq!(err.to_string(), "required service not registered: PgPool");
    }

    #[tokio::test]
    async fn memory_gateway_captures_outbox() {
        let gateway = MemorySmsGateway::default();

        let id = gateway.send("+15550100", "enrolment confirmed").await.unwrap();
        assert!(!id.is_empty());

        let outbox = gateway.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "+15550100");
        assert_eq!(outbox[0].body, "enrolment confirmed");
    }

    #[tokio::test]
    async fn gateways_reject_empty_recipients() {
        let memory = MemorySmsGateway::default();
        assert!(memory.send("", "x").await.is_err());

        let console = ConsoleSmsGateway {
            sender_id: "campus".to_string(),
        };
        assert!(console.send("", "x").await.is_err());
        assert!(console.send("+15550100", "x").await.is_ok());
    }
}
