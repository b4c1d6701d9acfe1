//! Postgres advisory-lock manager.
//!
//! Locks are keyed by `hashtextextended(key, 0)` and are session-scoped:
//! each held lock pins one pooled connection for the duration of the hold,
//! and the server frees the lock when that session ends. A crashed or
//! disconnected holder therefore cannot lock the cluster out permanently.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::warn;

use campus_tasks::{HeldLock, LockError, LockHandle, LockManager};

/// Distributed lock manager over Postgres advisory locks.
#[derive(Debug, Clone)]
pub struct PgAdvisoryLockManager {
    pool: PgPool,
}

impl PgAdvisoryLockManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockManager for PgAdvisoryLockManager {
    async fn try_acquire(&self, key: &str) -> Option<LockHandle> {
        // Transport errors surface as "not obtained": lock unavailability is
        // an expected control-flow outcome, not an exception.
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(key, error = %e, "lock store unreachable, treating lock as not obtained");
                return None;
            }
        };

        let obtained =
            sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock(hashtextextended($1, 0))")
                .bind(key)
                .fetch_one(&mut *conn)
                .await;

        match obtained {
            Ok(true) => Some(LockHandle::new(
                key,
                Box::new(PgHeldLock {
                    key: key.to_string(),
                    conn: Some(conn),
                }),
            )),
            Ok(false) => None,
            Err(e) => {
                warn!(key, error = %e, "advisory lock query failed, treating lock as not obtained");
                None
            }
        }
    }

    async fn acquire(&self, key: &str) -> Result<LockHandle, LockError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| LockError::Store(e.to_string()))?;

        // Blocks server-side until the lock is free.
        sqlx::query("SELECT pg_advisory_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(&mut *conn)
            .await
            .map_err(|e| LockError::Store(e.to_string()))?;

        Ok(LockHandle::new(
            key,
            Box::new(PgHeldLock {
                key: key.to_string(),
                conn: Some(conn),
            }),
        ))
    }
}

/// Holds the locking session's connection for the lifetime of the lock.
struct PgHeldLock {
    key: String,
    conn: Option<PoolConnection<Postgres>>,
}

#[async_trait]
impl HeldLock for PgHeldLock {
    async fn release(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        let unlocked =
            sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock(hashtextextended($1, 0))")
                .bind(&self.key)
                .fetch_one(&mut *conn)
                .await;

        match unlocked {
            Ok(true) => {} // connection goes back to the pool clean
            Ok(false) => {
                warn!(key = %self.key, "advisory unlock reported no lock held by this session");
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "orderly unlock failed, closing the session instead");
                // Closing the session makes the server release the lock.
                drop(conn.detach());
            }
        }
    }
}

impl Drop for PgHeldLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Never hand a still-locked session back to the pool: detach it
            // so the session closes and the server releases the lock.
            drop(conn.detach());
        }
    }
}
