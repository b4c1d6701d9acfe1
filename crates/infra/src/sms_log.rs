//! Sync source over the host's `sms_log` table.
//!
//! The table belongs to the host application (its ORM writes one row per
//! outbound SMS); this reader only ever selects past the watermark.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use campus_activity::{SourceRow, SyncError, SyncSource};

const SOURCE_TAG: &str = "sms_log";

/// Reads unshipped `sms_log` rows in ascending id order.
#[derive(Debug, Clone)]
pub struct PgSmsLogSource {
    pool: PgPool,
}

impl PgSmsLogSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn source_error(e: sqlx::Error) -> SyncError {
    SyncError::Source {
        source: SOURCE_TAG.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl SyncSource for PgSmsLogSource {
    fn source_tag(&self) -> &str {
        SOURCE_TAG
    }

    fn entry_type(&self) -> &str {
        "sms.sent"
    }

    async fn fetch_after(&self, watermark: i64, limit: u32) -> Result<Vec<SourceRow>, SyncError> {
        let rows = sqlx::query(
            r#"
            SELECT id, phone, body, status, created_at
            FROM sms_log
            WHERE id > $1
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(watermark)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(source_error)?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(source_error)?;
            let phone: String = row.try_get("phone").map_err(source_error)?;
            let body: String = row.try_get("body").map_err(source_error)?;
            let status: String = row.try_get("status").map_err(source_error)?;
            let created_at: DateTime<Utc> = row.try_get("created_at").map_err(source_error)?;

            result.push(SourceRow {
                id,
                created_at,
                data: serde_json::json!({
                    "phone": phone,
                    "body": body,
                    "status": status,
                }),
            });
        }
        Ok(result)
    }
}
