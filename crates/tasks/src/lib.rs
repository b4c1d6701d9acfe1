//! `campus-tasks` — cluster-safe background task runtime.
//!
//! Multiple worker processes share one database; each recurring task is
//! serialized cluster-wide through a named distributed lock, every attempted
//! run is recorded in a durable ledger, and an in-process scheduler drives
//! tasks on their configured cron cadence.

pub mod ledger;
pub mod lock;
pub mod runner;
pub mod schedule;
pub mod scheduler;
pub mod task;

pub use ledger::{
    ExecutionLedger, InMemoryExecutionLedger, LedgerError, RunId, RunResult, TaskRunRecord,
};
pub use lock::{HeldLock, InMemoryLockManager, LockError, LockHandle, LockManager};
pub use runner::{RunOutcome, ShutdownSignal, TaskRunner, shutdown_channel};
pub use schedule::{CronSchedule, ScheduleError};
pub use scheduler::Scheduler;
pub use task::{SchedulableTask, TaskError};
