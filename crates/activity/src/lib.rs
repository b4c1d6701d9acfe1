//! `campus-activity` — the shared, append-only activity log and the
//! watermark-driven incremental sync pattern that feeds it.
//!
//! Downstream consumers (audit, analytics) read the activity log; this crate
//! only ever appends to it.

pub mod record;
pub mod store;
pub mod sync;

pub use record::ActivityRecord;
pub use store::{ActivityLogError, ActivityLogStore, InMemoryActivityLogStore};
pub use sync::{IncrementalSyncTask, SourceRow, SyncError, SyncReport, SyncSource};
