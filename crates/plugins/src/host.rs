//! Plugin host: loads enabled plugins into the service registry at startup.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{error, info};

use campus_core::{AppConfig, PluginErrorPolicy};

use crate::email::EmailPlugin;
use crate::plugin::{Plugin, PluginError};
use crate::registry::ServiceRegistry;
use crate::sms::SmsPlugin;

/// Plugin loading error.
#[derive(Debug, Error)]
pub enum PluginHostError {
    /// `plugins.enabled` names a plugin the catalog does not know. Always
    /// fatal regardless of the error policy: the deployment asked for
    /// something that cannot exist.
    #[error("unknown plugin `{0}` in plugins.enabled")]
    UnknownPlugin(String),

    #[error("plugin `{plugin}` failed to configure: {source}")]
    Configure {
        plugin: String,
        #[source]
        source: PluginError,
    },
}

/// Statically known plugins, by name.
pub struct PluginCatalog {
    constructors: BTreeMap<&'static str, fn() -> Box<dyn Plugin>>,
}

impl PluginCatalog {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Catalog of the plugins shipped with this repository.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register("sms", || Box::new(SmsPlugin));
        catalog.register("email", || Box::new(EmailPlugin));
        catalog
    }

    pub fn register(&mut self, name: &'static str, constructor: fn() -> Box<dyn Plugin>) {
        self.constructors.insert(name, constructor);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    fn construct(&self, name: &str) -> Option<Box<dyn Plugin>> {
        self.constructors.get(name).map(|ctor| ctor())
    }
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Names of plugins that loaded and plugins that were disabled on error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: Vec<String>,
    pub disabled: Vec<String>,
}

/// Loads enabled plugins, single-threaded, before scheduling starts.
pub struct PluginHost {
    catalog: PluginCatalog,
}

impl PluginHost {
    pub fn new(catalog: PluginCatalog) -> Self {
        Self { catalog }
    }

    /// Configure every plugin in `plugins.enabled`, in order.
    ///
    /// Each plugin configures against a staged copy of the registry that is
    /// committed only on success, so a failing plugin cannot leave partial
    /// registrations behind or corrupt what other plugins registered — the
    /// isolation boundary is per-plugin.
    ///
    /// `plugins.on_error` decides whether a failure aborts startup
    /// (default) or merely disables the failing plugin.
    pub fn load_all(
        &self,
        services: &mut ServiceRegistry,
        config: &AppConfig,
    ) -> Result<LoadSummary, PluginHostError> {
        let mut summary = LoadSummary::default();

        for name in &config.plugins.enabled {
            let Some(plugin) = self.catalog.construct(name) else {
                return Err(PluginHostError::UnknownPlugin(name.clone()));
            };

            let mut staged = services.clone();
            match plugin.configure(&mut staged, config) {
                Ok(()) => {
                    info!(plugin = %name, "plugin configured");
                    *services = staged;
                    summary.loaded.push(name.clone());
                }
                Err(err) => match config.plugins.on_error {
                    PluginErrorPolicy::Abort => {
                        return Err(PluginHostError::Configure {
                            plugin: name.clone(),
                            source: err,
                        });
                    }
                    PluginErrorPolicy::Disable => {
                        error!(plugin = %name, error = %err, "plugin disabled after configure failure");
                        summary.disabled.push(name.clone());
                    }
                },
            }
        }

        Ok(summary)
    }
}
