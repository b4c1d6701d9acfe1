//! Postgres-backed activity log sink.
//!
//! Batch writes run inside one transaction: either every record lands or
//! none does. `UNIQUE (source, source_id)` makes redundant inserts from a
//! repeated batch detectable, which is what makes sync re-runs idempotent.

use async_trait::async_trait;
use sqlx::PgPool;

use campus_activity::{ActivityLogError, ActivityLogStore, ActivityRecord};

/// Append-only activity log over the shared database.
#[derive(Debug, Clone)]
pub struct PgActivityLogStore {
    pool: PgPool,
}

impl PgActivityLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(e: sqlx::Error) -> ActivityLogError {
    ActivityLogError::Storage(e.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[async_trait]
impl ActivityLogStore for PgActivityLogStore {
    async fn watermark(&self, source: &str) -> Result<i64, ActivityLogError> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(source_id) FROM activity_log WHERE source = $1")
                .bind(source)
                .fetch_one(&self.pool)
                .await
                .map_err(storage)?;

        Ok(max.unwrap_or(0))
    }

    async fn add_records(&self, records: Vec<ActivityRecord>) -> Result<(), ActivityLogError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(storage)?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO activity_log (source, source_id, entry_type, created_at, data)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&record.source)
            .bind(record.source_id)
            .bind(&record.entry_type)
            .bind(record.created_at)
            .bind(&record.data)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ActivityLogError::Duplicate {
                        source: record.source.clone(),
                        source_id: record.source_id,
                    }
                } else {
                    storage(e)
                }
            })?;
            // An early return drops the transaction, rolling back the batch.
        }

        tx.commit().await.map_err(storage)?;
        Ok(())
    }
}
