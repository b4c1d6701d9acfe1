//! `campus-plugins` — startup-time extensions.
//!
//! Plugins are statically known implementations selected by configuration:
//! each enabled plugin binds its own config sub-tree and registers
//! capability implementations and/or schedulable tasks into the shared
//! service registry, before the scheduler starts dispatching. The host's
//! business code depends only on the capability abstractions.

pub mod capabilities;
pub mod email;
pub mod host;
pub mod plugin;
pub mod registry;
pub mod sms;

pub use capabilities::{CapabilityError, EmailSender, SmsGateway};
pub use email::EmailPlugin;
pub use host::{LoadSummary, PluginCatalog, PluginHost, PluginHostError};
pub use plugin::{Plugin, PluginError};
pub use registry::ServiceRegistry;
pub use sms::SmsPlugin;
