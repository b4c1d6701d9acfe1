//! Leadership-gated task execution envelope.
//!
//! Per task name: `Idle → AcquiringLock → {Skipped | Running} →
//! {Succeeded | Failed} → Idle`. Skips are expected steady-state noise under
//! multi-node deployment and leave no ledger row; every run that acquires
//! the lock opens a ledger row and closes it on every exit path, including
//! cancellation.

use std::future::Future;

use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::ledger::{ExecutionLedger, RunResult};
use crate::lock::LockManager;
use crate::task::TaskError;

/// Outcome of one scheduler-triggered execution attempt.
///
/// `Skipped` is an explicit result, not an error: nothing went wrong, this
/// node simply was not elected for the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Skipped,
    Failed(TaskError),
}

impl RunOutcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed(_))
    }
}

/// Shutdown signal threaded from the worker into running task bodies.
///
/// A dropped sender counts as shutdown.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Create a shutdown channel pair.
pub fn shutdown_channel() -> (watch::Sender<bool>, ShutdownSignal) {
    watch::channel(false)
}

pub(crate) async fn wait_for_shutdown(signal: &mut ShutdownSignal) {
    let _ = signal.wait_for(|stop| *stop).await;
}

pub(crate) fn is_shutdown(signal: &ShutdownSignal) -> bool {
    *signal.borrow()
}

/// Generic execution envelope: lock gate, ledger row, guaranteed release.
#[derive(Debug)]
pub struct TaskRunner<L, E> {
    locks: L,
    ledger: E,
}

impl<L: LockManager, E: ExecutionLedger> TaskRunner<L, E> {
    pub fn new(locks: L, ledger: E) -> Self {
        Self { locks, ledger }
    }

    pub fn ledger(&self) -> &E {
        &self.ledger
    }

    /// Execute one tick of a task.
    ///
    /// The lock handle is released on every exit path; if this future itself
    /// is dropped mid-run, the handle's drop severs the store session, which
    /// frees the lock (fail-open).
    pub async fn execute<F>(
        &self,
        task_name: &str,
        mut shutdown: ShutdownSignal,
        body: F,
    ) -> RunOutcome
    where
        F: Future<Output = Result<(), TaskError>> + Send,
    {
        let Some(handle) = self.locks.try_acquire(task_name).await else {
            debug!(task = task_name, "lock held elsewhere, skipping run");
            return RunOutcome::Skipped;
        };

        // Refuse overlap even with the lock held: a residual open row means
        // a previous run has not been accounted for yet.
        match self.ledger.has_open_run(task_name).await {
            Ok(false) => {}
            Ok(true) => {
                warn!(task = task_name, "previous run still open, refusing to overlap");
                handle.release().await;
                return RunOutcome::Skipped;
            }
            Err(e) => {
                error!(task = task_name, error = %e, "ledger unavailable");
                handle.release().await;
                return RunOutcome::Failed(TaskError::failed(e.to_string()));
            }
        }

        let run_id = match self.ledger.open_run(task_name).await {
            Ok(id) => id,
            Err(e) => {
                error!(task = task_name, error = %e, "failed to open ledger row");
                handle.release().await;
                return RunOutcome::Failed(TaskError::failed(e.to_string()));
            }
        };

        let result = tokio::select! {
            res = body => res,
            _ = wait_for_shutdown(&mut shutdown) => Err(TaskError::Cancelled),
        };

        let run_result = match &result {
            Ok(()) => RunResult::Succeeded,
            Err(e) => RunResult::failed(e.to_string()),
        };
        if let Err(e) = self.ledger.close_run(run_id, &run_result).await {
            error!(task = task_name, run_id = %run_id, error = %e, "failed to close ledger row");
        }

        handle.release().await;

        match result {
            Ok(()) => {
                debug!(task = task_name, run_id = %run_id, "run succeeded");
                RunOutcome::Succeeded
            }
            Err(err) => {
                warn!(task = task_name, run_id = %run_id, error = %err, "run failed");
                RunOutcome::Failed(err)
            }
        }
    }
}
