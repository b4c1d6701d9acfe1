//! Activity log sink: append-only, all-or-nothing batch writes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::record::ActivityRecord;

/// Activity log error.
#[derive(Debug, Clone)]
pub enum ActivityLogError {
    /// The batch contained a `(source, source_id)` already present in the
    /// sink. The whole batch is rejected.
    Duplicate { source: String, source_id: i64 },

    Storage(String),
}

impl std::fmt::Display for ActivityLogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityLogError::Duplicate { source, source_id } => write!(
                f,
                "duplicate activity record: source `{source}`, source_id {source_id}"
            ),
            ActivityLogError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for ActivityLogError {}

/// The shared activity log sink.
#[async_trait]
pub trait ActivityLogStore: Send + Sync {
    /// Highest `source_id` already landed for a source tag; 0 if none.
    ///
    /// This *is* the sync watermark: deriving it from the sink guarantees
    /// the cursor and the shipped data cannot diverge.
    async fn watermark(&self, source: &str) -> Result<i64, ActivityLogError>;

    /// Append a batch. All-or-nothing: on any failure, none of the records
    /// land and the watermark is unchanged.
    async fn add_records(&self, records: Vec<ActivityRecord>) -> Result<(), ActivityLogError>;
}

#[async_trait]
impl<T: ActivityLogStore + ?Sized> ActivityLogStore for Arc<T> {
    async fn watermark(&self, source: &str) -> Result<i64, ActivityLogError> {
        (**self).watermark(source).await
    }

    async fn add_records(&self, records: Vec<ActivityRecord>) -> Result<(), ActivityLogError> {
        (**self).add_records(records).await
    }
}

/// In-memory activity log for tests/dev.
///
/// Enforces the same `(source, source_id)` uniqueness as the Postgres schema
/// and supports one-shot write-failure injection for fail-closed tests.
#[derive(Debug, Default)]
pub struct InMemoryActivityLogStore {
    records: Mutex<Vec<ActivityRecord>>,
    fail_next_write: AtomicBool,
}

impl InMemoryActivityLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make the next `add_records` fail with a storage error.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// All landed records, insertion order (test inspection).
    pub fn all_records(&self) -> Vec<ActivityRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Landed records for one source tag, insertion order.
    pub fn records_for(&self, source: &str) -> Vec<ActivityRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ActivityLogStore for InMemoryActivityLogStore {
    async fn watermark(&self, source: &str) -> Result<i64, ActivityLogError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.source == source)
            .map(|r| r.source_id)
            .max()
            .unwrap_or(0))
    }

    async fn add_records(&self, records: Vec<ActivityRecord>) -> Result<(), ActivityLogError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(ActivityLogError::Storage(
                "injected write failure".to_string(),
            ));
        }

        let mut landed = self.records.lock().unwrap();

        // Validate the whole batch before landing any of it.
        let mut seen: HashSet<(&str, i64)> = landed
            .iter()
            .map(|r| (r.source.as_str(), r.source_id))
            .collect();
        for record in &records {
            if !seen.insert((record.source.as_str(), record.source_id)) {
                return Err(ActivityLogError::Duplicate {
                    source: record.source.clone(),
                    source_id: record.source_id,
                });
            }
        }

        landed.extend(records);
        Ok(())
    }
}
