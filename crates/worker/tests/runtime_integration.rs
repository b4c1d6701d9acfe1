//! End-to-end runtime tests over the in-memory implementations.
//!
//! Exercises the full path the worker wires together: leadership gate →
//! ledger row → sync task body → activity log, plus plugin loading into the
//! scheduler.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use campus_activity::{
    ActivityLogStore, IncrementalSyncTask, InMemoryActivityLogStore, SourceRow, SyncError,
    SyncSource,
};
use campus_core::AppConfig;
use campus_plugins::{PluginCatalog, PluginHost, ServiceRegistry, SmsGateway};
use campus_tasks::{
    InMemoryExecutionLedger, InMemoryLockManager, RunOutcome, SchedulableTask, Scheduler,
    TaskRunner, shutdown_channel,
};

/// Source backed by a vector of rows, standing in for a domain table.
struct TableSource {
    tag: &'static str,
    rows: Mutex<Vec<SourceRow>>,
}

impl TableSource {
    fn with_ids(tag: &'static str, ids: impl IntoIterator<Item = i64>) -> Arc<Self> {
        let rows = ids
            .into_iter()
            .map(|id| SourceRow {
                id,
                created_at: Utc::now(),
                data: serde_json::json!({ "row": id }),
            })
            .collect();
        Arc::new(Self {
            tag,
            rows: Mutex::new(rows),
        })
    }
}

#[async_trait]
impl SyncSource for TableSource {
    fn source_tag(&self) -> &str {
        self.tag
    }

    fn entry_type(&self) -> &str {
        "test.row"
    }

    async fn fetch_after(&self, watermark: i64, limit: u32) -> Result<Vec<SourceRow>, SyncError> {
        let mut rows: Vec<SourceRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.id > watermark)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[tokio::test]
async fn backlog_drains_through_the_leadership_gate() {
    let locks = InMemoryLockManager::arc();
    let ledger = InMemoryExecutionLedger::arc();
    let runner = TaskRunner::new(locks, ledger.clone());
    let (_tx, shutdown) = shutdown_channel();

    let sink = InMemoryActivityLogStore::arc();
    let source = TableSource::with_ids("sms_log", 1..=250);
    let task = Arc::new(IncrementalSyncTask::new(source, sink.clone(), 100));

    // Four scheduled ticks: 100 + 100 + 50 + 0.
    for _ in 0..4 {
        let outcome = runner
            .execute(task.name(), shutdown.clone(), task.run())
            .await;
        assert_eq!(outcome, RunOutcome::Succeeded);
    }

    assert_eq!(sink.watermark("sms_log").await.unwrap(), 250);
    assert_eq!(sink.all_records().len(), 250);

    // Every tick was accounted for in the ledger, all closed and succeeded.
    let runs = ledger.all_runs();
    assert_eq!(runs.len(), 4);
    assert!(runs.iter().all(|r| !r.is_open() && r.succeeded == Some(true)));
}

#[tokio::test]
async fn two_nodes_elect_exactly_one_executor() {
    // Two worker "nodes" sharing the lock store, ledger, and sink.
    let locks = InMemoryLockManager::arc();
    let ledger = InMemoryExecutionLedger::arc();
    let node_a = TaskRunner::new(locks.clone(), ledger.clone());
    let node_b = TaskRunner::new(locks.clone(), ledger.clone());
    let (_tx, shutdown) = shutdown_channel();

    let sink = InMemoryActivityLogStore::arc();
    let task_a = Arc::new(IncrementalSyncTask::new(
        TableSource::with_ids("sms_log", 1..=10),
        sink.clone(),
        100,
    ));
    let task_b = Arc::new(IncrementalSyncTask::new(
        TableSource::with_ids("sms_log", 1..=10),
        sink.clone(),
        100,
    ));

    let (a, b) = tokio::join!(
        node_a.execute(task_a.name(), shutdown.clone(), task_a.run()),
        node_b.execute(task_b.name(), shutdown.clone(), task_b.run()),
    );

    // Exactly one ran; the other skipped without writing anything.
    let succeeded = [&a, &b].iter().filter(|o| o.is_succeeded()).count();
    let skipped = [&a, &b].iter().filter(|o| o.is_skipped()).count();
    assert_eq!((succeeded, skipped), (1, 1), "a={a:?} b={b:?}");

    assert_eq!(sink.all_records().len(), 10);
    assert_eq!(ledger.all_runs().len(), 1);
}

#[tokio::test]
async fn failed_batch_write_reships_identically_after_recovery() {
    let locks = InMemoryLockManager::arc();
    let ledger = InMemoryExecutionLedger::arc();
    let runner = TaskRunner::new(locks, ledger.clone());
    let (_tx, shutdown) = shutdown_channel();

    let sink = InMemoryActivityLogStore::arc();
    let source = TableSource::with_ids("sms_log", 1..=150);
    let task = Arc::new(IncrementalSyncTask::new(source, sink.clone(), 100));

    sink.fail_next_write();
    let outcome = runner
        .execute(task.name(), shutdown.clone(), task.run())
        .await;
    assert!(outcome.is_failed());

    // Fail-closed: the watermark did not move, the failure is on record.
    assert_eq!(sink.watermark("sms_log").await.unwrap(), 0);
    let runs = ledger.all_runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].succeeded, Some(false));

    // The next run ships the same ids 1..=100 with no duplicates.
    let outcome = runner
        .execute(task.name(), shutdown.clone(), task.run())
        .await;
    assert_eq!(outcome, RunOutcome::Succeeded);

    let ids: Vec<i64> = sink
        .records_for("sms_log")
        .iter()
        .map(|r| r.source_id)
        .collect();
    assert_eq!(ids, (1..=100).collect::<Vec<i64>>());
}

fn worker_config() -> AppConfig {
    AppConfig::from_toml(
        r#"
        [database]
        url = "postgres://localhost/campus"

        [tasks.sync_sms_log]
        enabled = true
        cron_schedule = "*/5 * * * *"
        retry_count = 3
        retry_interval = 30
        batch_size = 100

        [plugins]
        enabled = ["sms", "email"]

        [plugins.sms]
        provider = "memory"
        api_key = "test-key"
        sender_id = "campus"

        [plugins.email]
        smtp_host = "smtp.example.edu"
        from_address = "noreply@example.edu"
        "#,
    )
    .unwrap()
}

#[tokio::test]
async fn plugins_load_and_their_tasks_schedule() {
    // Host services the plugins resolve. The pool is lazy: nothing here
    // touches the database.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/campus_test")
        .unwrap();
    let mut services = ServiceRegistry::new();
    services.register(Arc::new(pool));
    let sink: Arc<dyn ActivityLogStore> = InMemoryActivityLogStore::arc();
    services.register::<dyn ActivityLogStore>(sink);

    let config = worker_config();
    let host = PluginHost::new(PluginCatalog::builtin());
    let summary = host.load_all(&mut services, &config).unwrap();

    assert_eq!(summary.loaded, vec!["sms".to_string(), "email".to_string()]);
    assert!(summary.disabled.is_empty());
    assert!(services.get::<dyn SmsGateway>().is_some());

    // The sms plugin registered its sync task; the scheduler picks it up.
    let locks = InMemoryLockManager::arc();
    let ledger = InMemoryExecutionLedger::arc();
    let mut scheduler = Scheduler::new(TaskRunner::new(locks, ledger));
    scheduler.start(services.tasks(), &config).unwrap();

    assert_eq!(scheduler.running_loops(), 1);
    scheduler.shutdown().await;
}
