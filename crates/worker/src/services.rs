//! Worker process wiring.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use campus_activity::ActivityLogStore;
use campus_core::AppConfig;
use campus_infra::{MIGRATOR, PgActivityLogStore, PgAdvisoryLockManager, PgExecutionLedger};
use campus_plugins::{PluginCatalog, PluginHost, ServiceRegistry};
use campus_tasks::{Scheduler, TaskRunner};

/// A fully wired, not-yet-started worker.
pub struct Worker {
    scheduler: Scheduler<Arc<PgAdvisoryLockManager>, Arc<PgExecutionLedger>>,
    services: ServiceRegistry,
}

impl Worker {
    /// The shared service registry (host services + plugin registrations).
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Validate task configuration and spawn the scheduling loops.
    pub fn start(&mut self, config: &AppConfig) -> anyhow::Result<()> {
        self.scheduler
            .start(self.services.tasks(), config)
            .context("task configuration is invalid")?;
        Ok(())
    }

    pub fn running_loops(&self) -> usize {
        self.scheduler.running_loops()
    }

    /// Signal shutdown and wait for every task loop to drain.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }
}

/// Build the full runtime: pool, migrations, host services, plugins.
///
/// Plugin loading happens here, single-threaded, so every registration is
/// in place before [`Worker::start`] spawns the first loop.
pub async fn build(config: &AppConfig) -> anyhow::Result<Worker> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("failed to connect to the shared database")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("failed to apply task runtime migrations")?;

    let locks = Arc::new(PgAdvisoryLockManager::new(pool.clone()));
    let ledger = Arc::new(PgExecutionLedger::new(pool.clone()));
    let activity_log: Arc<dyn ActivityLogStore> = Arc::new(PgActivityLogStore::new(pool.clone()));

    // Host services that plugins may resolve.
    let mut services = ServiceRegistry::new();
    services.register(Arc::new(pool));
    services.register::<dyn ActivityLogStore>(activity_log);

    let host = PluginHost::new(PluginCatalog::builtin());
    let summary = host.load_all(&mut services, config)?;
    info!(
        loaded = ?summary.loaded,
        disabled = ?summary.disabled,
        tasks = services.task_count(),
        "plugins loaded"
    );

    let runner = TaskRunner::new(locks, ledger);
    Ok(Worker {
        scheduler: Scheduler::new(runner),
        services,
    })
}

/// Build, start, and run until a shutdown signal arrives.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let mut worker = build(&config).await?;
    worker.start(&config)?;
    info!(loops = worker.running_loops(), "worker started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutdown signal received, draining task loops");
    worker.shutdown().await;
    Ok(())
}
