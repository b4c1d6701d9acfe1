//! Activity log entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable activity log entry.
///
/// `(source, source_id)` is unique in the sink; the watermark for a source
/// is derived from the highest `source_id` already landed, so entries are
/// never updated or deleted by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Tag identifying the originating table/stream, e.g. `sms_log`.
    pub source: String,
    /// The originating row's id; drives the watermark and deduplication.
    pub source_id: i64,
    /// Consumer-facing entry type, e.g. `sms.sent`.
    pub entry_type: String,
    /// Creation time of the originating row, not of the copy.
    pub created_at: DateTime<Utc>,
    /// Serialized snapshot of the relevant source fields.
    pub data: serde_json::Value,
}

impl ActivityRecord {
    pub fn new(
        source: impl Into<String>,
        source_id: i64,
        entry_type: impl Into<String>,
        created_at: DateTime<Utc>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            source: source.into(),
            source_id,
            entry_type: entry_type.into(),
            created_at,
            data,
        }
    }
}
