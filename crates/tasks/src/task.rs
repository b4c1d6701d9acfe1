//! Schedulable task abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Error raised by a task body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The run was cancelled by shutdown before completing.
    #[error("task cancelled")]
    Cancelled,

    /// The task body failed.
    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// A named unit of recurring work driven by the scheduler.
///
/// The name is load-bearing: it is the cluster-wide lock key, the ledger
/// task name, and the `tasks.<name>` configuration key.
#[async_trait]
pub trait SchedulableTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), TaskError>;
}

#[async_trait]
impl<T: SchedulableTask + ?Sized> SchedulableTask for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self) -> Result<(), TaskError> {
        (**self).run().await
    }
}
