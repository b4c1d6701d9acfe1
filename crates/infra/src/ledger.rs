//! Postgres-backed task execution ledger.
//!
//! One row per attempted run in `task_execution_log`. Rows are closed with
//! a guarded `UPDATE ... WHERE finished_at IS NULL`, so a closed row can
//! never be rewritten.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use campus_tasks::{ExecutionLedger, LedgerError, RunId, RunResult, TaskRunRecord};

/// Durable execution ledger over the shared database.
#[derive(Debug, Clone)]
pub struct PgExecutionLedger {
    pool: PgPool,
}

impl PgExecutionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(e: sqlx::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

#[async_trait]
impl ExecutionLedger for PgExecutionLedger {
    async fn open_run(&self, task_name: &str) -> Result<RunId, LedgerError> {
        let id = RunId::new();
        sqlx::query(
            r#"
            INSERT INTO task_execution_log (id, task_name, started_at)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(id.0)
        .bind(task_name)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(id)
    }

    async fn close_run(&self, run_id: RunId, outcome: &RunResult) -> Result<(), LedgerError> {
        let (succeeded, error) = match outcome {
            RunResult::Succeeded => (true, None),
            RunResult::Failed { error } => (false, Some(error.as_str())),
        };

        let result = sqlx::query(
            r#"
            UPDATE task_execution_log
            SET finished_at = NOW(), succeeded = $2, error = $3
            WHERE id = $1 AND finished_at IS NULL
            "#,
        )
        .bind(run_id.0)
        .bind(succeeded)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM task_execution_log WHERE id = $1)",
            )
            .bind(run_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

            return Err(if exists {
                LedgerError::AlreadyClosed(run_id)
            } else {
                LedgerError::NotFound(run_id)
            });
        }
        Ok(())
    }

    async fn has_open_run(&self, task_name: &str) -> Result<bool, LedgerError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM task_execution_log
                WHERE task_name = $1 AND finished_at IS NULL
            )
            "#,
        )
        .bind(task_name)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)
    }

    async fn recent_runs(
        &self,
        task_name: &str,
        limit: usize,
    ) -> Result<Vec<TaskRunRecord>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, task_name, started_at, finished_at, succeeded, error
            FROM task_execution_log
            WHERE task_name = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(task_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(TaskRunRecord {
                id: RunId::from_uuid(row.try_get("id").map_err(storage)?),
                task_name: row.try_get("task_name").map_err(storage)?,
                started_at: row.try_get::<DateTime<Utc>, _>("started_at").map_err(storage)?,
                finished_at: row.try_get("finished_at").map_err(storage)?,
                succeeded: row.try_get("succeeded").map_err(storage)?,
                error: row.try_get("error").map_err(storage)?,
            });
        }
        Ok(records)
    }
}
