//! Task execution ledger: one durable row per attempted run.
//!
//! Rows are created when a run starts and closed when it ends; after closure
//! they are never mutated. Open rows double as overlap detection: a task
//! with an open row is refused a new run even on the same node.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Unique run identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome recorded when a run closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Succeeded,
    Failed { error: String },
}

impl RunResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Succeeded)
    }
}

/// One attempted run of a task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRunRecord {
    pub id: RunId,
    pub task_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub succeeded: Option<bool>,
    pub error: Option<String>,
}

impl TaskRunRecord {
    pub fn is_open(&self) -> bool {
        self.finished_at.is_none()
    }
}

/// Ledger error.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("run not found: {0}")]
    NotFound(RunId),
    #[error("run already closed: {0}")]
    AlreadyClosed(RunId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Durable record of task runs and per-task open-run status.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    /// Create an open row for a starting run.
    async fn open_run(&self, task_name: &str) -> Result<RunId, LedgerError>;

    /// Close a run with its outcome. Closed rows are immutable.
    async fn close_run(&self, run_id: RunId, outcome: &RunResult) -> Result<(), LedgerError>;

    /// Whether any run of this task is still open.
    async fn has_open_run(&self, task_name: &str) -> Result<bool, LedgerError>;

    /// Most recent runs of a task, newest first (audit read side).
    async fn recent_runs(
        &self,
        task_name: &str,
        limit: usize,
    ) -> Result<Vec<TaskRunRecord>, LedgerError>;
}

#[async_trait]
impl<T: ExecutionLedger + ?Sized> ExecutionLedger for Arc<T> {
    async fn open_run(&self, task_name: &str) -> Result<RunId, LedgerError> {
        (**self).open_run(task_name).await
    }

    async fn close_run(&self, run_id: RunId, outcome: &RunResult) -> Result<(), LedgerError> {
        (**self).close_run(run_id, outcome).await
    }

    async fn has_open_run(&self, task_name: &str) -> Result<bool, LedgerError> {
        (**self).has_open_run(task_name).await
    }

    async fn recent_runs(
        &self,
        task_name: &str,
        limit: usize,
    ) -> Result<Vec<TaskRunRecord>, LedgerError> {
        (**self).recent_runs(task_name, limit).await
    }
}

/// In-memory ledger for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryExecutionLedger {
    runs: Mutex<Vec<TaskRunRecord>>,
}

impl InMemoryExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Every recorded run, oldest first (test inspection).
    pub fn all_runs(&self) -> Vec<TaskRunRecord> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionLedger for InMemoryExecutionLedger {
    async fn open_run(&self, task_name: &str) -> Result<RunId, LedgerError> {
        let record = TaskRunRecord {
            id: RunId::new(),
            task_name: task_name.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            succeeded: None,
            error: None,
        };
        let id = record.id;
        self.runs.lock().unwrap().push(record);
        Ok(id)
    }

    async fn close_run(&self, run_id: RunId, outcome: &RunResult) -> Result<(), LedgerError> {
        let mut runs = self.runs.lock().unwrap();
        let record = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(LedgerError::NotFound(run_id))?;

        if !record.is_open() {
            return Err(LedgerError::AlreadyClosed(run_id));
        }

        record.finished_at = Some(Utc::now());
        match outcome {
            RunResult::Succeeded => record.succeeded = Some(true),
            RunResult::Failed { error } => {
                record.succeeded = Some(false);
                record.error = Some(error.clone());
            }
        }
        Ok(())
    }

    async fn has_open_run(&self, task_name: &str) -> Result<bool, LedgerError> {
        let runs = self.runs.lock().unwrap();
        Ok(runs.iter().any(|r| r.task_name == task_name && r.is_open()))
    }

    async fn recent_runs(
        &self,
        task_name: &str,
        limit: usize,
    ) -> Result<Vec<TaskRunRecord>, LedgerError> {
        let runs = self.runs.lock().unwrap();
        let mut result: Vec<_> = runs
            .iter()
            .filter(|r| r.task_name == task_name)
            .cloned()
            .collect();
        result.reverse();
        result.truncate(limit);
        Ok(result)
    }
}
