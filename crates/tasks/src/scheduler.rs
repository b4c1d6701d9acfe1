//! In-process scheduling loop.
//!
//! One loop per enabled task: sleep until the next cron fire, run the task
//! through the leadership-gated runner, and re-attempt failures per the
//! task's retry policy. Skips are not retried — the elected node handles
//! the tick.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use campus_core::{AppConfig, ConfigError, ConfigResult, TaskConfig};

use crate::ledger::ExecutionLedger;
use crate::lock::LockManager;
use crate::runner::{RunOutcome, ShutdownSignal, TaskRunner, is_shutdown, wait_for_shutdown};
use crate::schedule::CronSchedule;
use crate::task::SchedulableTask;

/// Drives registered tasks on their configured cadence.
pub struct Scheduler<L, E> {
    runner: Arc<TaskRunner<L, E>>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl<L, E> Scheduler<L, E>
where
    L: LockManager + 'static,
    E: ExecutionLedger + 'static,
{
    pub fn new(runner: TaskRunner<L, E>) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        Self {
            runner: Arc::new(runner),
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// A shutdown signal handle for passing into ad-hoc runs.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_tx.subscribe()
    }

    /// Validate configuration for every task, then spawn the loops.
    ///
    /// Fails fast before spawning anything: a registered task without a
    /// `tasks.<name>` section, or with an unparsable cron expression, is a
    /// startup error — not a problem discovered at first fire.
    pub fn start(&mut self, tasks: Vec<Arc<dyn SchedulableTask>>, config: &AppConfig) -> ConfigResult<()> {
        let mut planned = Vec::new();
        for task in tasks {
            let task_config = config.task(task.name())?;
            if !task_config.enabled {
                info!(task = task.name(), "task disabled, not scheduling");
                continue;
            }

            let schedule = CronSchedule::parse(&task_config.cron_schedule).map_err(|e| {
                ConfigError::invalid(
                    format!("tasks.{}.cron_schedule", task.name()),
                    e.to_string(),
                )
            })?;
            planned.push((task, schedule, task_config.clone()));
        }

        for (task, schedule, task_config) in planned {
            let runner = self.runner.clone();
            let shutdown = self.shutdown_tx.subscribe();
            self.handles.push(tokio::spawn(task_loop(
                runner,
                task,
                schedule,
                task_config,
                shutdown,
            )));
        }
        Ok(())
    }

    /// Number of live task loops (diagnostics).
    pub fn running_loops(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Signal shutdown and wait for all loops to drain.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

async fn task_loop<L, E>(
    runner: Arc<TaskRunner<L, E>>,
    task: Arc<dyn SchedulableTask>,
    schedule: CronSchedule,
    config: TaskConfig,
    mut shutdown: ShutdownSignal,
) where
    L: LockManager,
    E: ExecutionLedger,
{
    info!(
        task = task.name(),
        schedule = %config.cron_schedule,
        "task scheduled"
    );

    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            error!(task = task.name(), "no upcoming fire time, stopping loop");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = wait_for_shutdown(&mut shutdown) => return,
        }

        run_with_retries(&runner, &task, &config, &mut shutdown).await;

        if is_shutdown(&shutdown) {
            return;
        }
    }
}

/// One tick: execute, then re-attempt `Failed` outcomes up to `retry_count`
/// times spaced by `retry_interval`. Returns the final outcome.
async fn run_with_retries<L, E>(
    runner: &TaskRunner<L, E>,
    task: &Arc<dyn SchedulableTask>,
    config: &TaskConfig,
    shutdown: &mut ShutdownSignal,
) -> RunOutcome
where
    L: LockManager,
    E: ExecutionLedger,
{
    let mut attempt = 0u32;
    loop {
        let outcome = runner
            .execute(task.name(), shutdown.clone(), task.run())
            .await;

        match outcome {
            RunOutcome::Failed(_) if attempt < config.retry_count && !is_shutdown(shutdown) => {
                attempt += 1;
                info!(
                    task = task.name(),
                    attempt,
                    retry_count = config.retry_count,
                    "retrying failed run"
                );
                tokio::select! {
                    _ = tokio::time::sleep(config.retry_delay()) => {}
                    _ = wait_for_shutdown(shutdown) => return outcome,
                }
            }
            outcome => return outcome,
        }
    }
}
