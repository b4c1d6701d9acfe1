//! Host-defined capability abstractions.
//!
//! Business code resolves these from the service registry; plugins provide
//! the implementations. The host never names a concrete gateway type.

use async_trait::async_trait;
use thiserror::Error;

/// Capability-level delivery error.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Outbound SMS delivery.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Queue one message for delivery; returns the gateway's message id.
    async fn send(&self, to: &str, body: &str) -> Result<String, CapabilityError>;
}

/// Outbound email delivery.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), CapabilityError>;
}
