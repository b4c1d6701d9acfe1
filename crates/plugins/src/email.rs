//! Email integration plugin.
//!
//! Registers an [`EmailSender`] capability bound to `plugins.email`.
//! A second, independently configured integration alongside the SMS plugin;
//! real SMTP delivery is out of scope.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use campus_core::{AppConfig, ConfigError};

use crate::capabilities::{CapabilityError, EmailSender};
use crate::plugin::{Plugin, PluginError};
use crate::registry::ServiceRegistry;

pub const PLUGIN_NAME: &str = "email";

#[derive(Debug, Clone, Deserialize)]
struct EmailPluginConfig {
    smtp_host: String,
    from_address: String,
}

/// The email plugin entry point.
pub struct EmailPlugin;

impl Plugin for EmailPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn configure(
        &self,
        services: &mut ServiceRegistry,
        config: &AppConfig,
    ) -> Result<(), PluginError> {
        let section = config.plugin_section(PLUGIN_NAME)?;
        let plugin_config: EmailPluginConfig = serde_json::from_value(section.clone())
            .map_err(|e| PluginError::from(ConfigError::invalid("plugins.email", e.to_string())))?;

        if !plugin_config.from_address.contains('@') {
            return Err(ConfigError::invalid(
                "plugins.email.from_address",
                "not an email address",
            )
            .into());
        }

        let sender: Arc<dyn EmailSender> = Arc::new(ConsoleEmailSender {
            smtp_host: plugin_config.smtp_host,
            from_address: plugin_config.from_address,
        });
        services.register::<dyn EmailSender>(sender);

        info!("email plugin configured");
        Ok(())
    }
}

/// Dev/test sender: logs instead of speaking SMTP.
struct ConsoleEmailSender {
    smtp_host: String,
    from_address: String,
}

#[async_trait]
impl EmailSender for ConsoleEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), CapabilityError> {
        if to.is_empty() {
            return Err(CapabilityError::Rejected("empty recipient".to_string()));
        }
        info!(
            host = %self.smtp_host,
            from = %self.from_address,
            to,
            subject,
            chars = body.chars().count(),
            "email sent (console sender)"
        );
        Ok(())
    }
}
