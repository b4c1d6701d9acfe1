//! Named distributed mutual-exclusion locks.
//!
//! The lock store is the cluster's only coordination point: no node may
//! assume leadership for a task without holding the named lock at the moment
//! of the check-then-act. Handles are scoped to the underlying store session,
//! so a crashed holder releases its locks when the session dies (fail-open).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;

/// Lock acquisition error (blocking path only).
///
/// `try_acquire` never raises: transport errors are logged by the
/// implementation and surface as "not obtained".
#[derive(Debug, Clone, Error)]
pub enum LockError {
    #[error("lock store unavailable: {0}")]
    Store(String),
}

/// Backend-held state behind a [`LockHandle`].
///
/// `release` is the orderly path. Implementations must also release in their
/// `Drop` so an abandoned handle cannot leave the cluster locked out.
#[async_trait]
pub trait HeldLock: Send {
    async fn release(&mut self);
}

/// A held distributed lock.
///
/// Owned exclusively by the caller that acquired it. [`LockHandle::release`]
/// consumes the handle; dropping an unreleased handle severs the backing
/// store session instead, which also frees the lock.
pub struct LockHandle {
    key: String,
    held: Option<Box<dyn HeldLock>>,
}

impl LockHandle {
    pub fn new(key: impl Into<String>, held: Box<dyn HeldLock>) -> Self {
        Self {
            key: key.into(),
            held: Some(held),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Orderly release. Idempotent with respect to the drop path.
    pub async fn release(mut self) {
        if let Some(mut held) = self.held.take() {
            held.release().await;
        }
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key)
            .field("held", &self.held.is_some())
            .finish()
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        // Fail-open: dropping the backend guard tears down its store session,
        // which releases the lock without an explicit round trip.
        self.held.take();
    }
}

/// Named mutual exclusion backed by a shared store.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Non-blocking. `None` means the lock is held elsewhere *or* the store
    /// was unreachable — callers treat both as "not my turn".
    async fn try_acquire(&self, key: &str) -> Option<LockHandle>;

    /// Blocking: waits until the lock becomes available.
    async fn acquire(&self, key: &str) -> Result<LockHandle, LockError>;
}

#[async_trait]
impl<T: LockManager + ?Sized> LockManager for Arc<T> {
    async fn try_acquire(&self, key: &str) -> Option<LockHandle> {
        (**self).try_acquire(key).await
    }

    async fn acquire(&self, key: &str) -> Result<LockHandle, LockError> {
        (**self).acquire(key).await
    }
}

/// In-memory lock manager for tests/dev.
///
/// Same handle semantics as the distributed implementation, scoped to one
/// process. Not a substitute for cluster coordination.
#[derive(Debug, Default)]
pub struct InMemoryLockManager {
    table: Arc<LockTable>,
}

#[derive(Debug, Default)]
struct LockTable {
    held: Mutex<HashSet<String>>,
    freed: Notify,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn try_acquire(&self, key: &str) -> Option<LockHandle> {
        {
            let mut held = self.table.held.lock().unwrap();
            if !held.insert(key.to_string()) {
                return None;
            }
        }

        Some(LockHandle::new(
            key,
            Box::new(InMemoryHeldLock {
                key: key.to_string(),
                table: self.table.clone(),
                released: false,
            }),
        ))
    }

    async fn acquire(&self, key: &str) -> Result<LockHandle, LockError> {
        loop {
            // Register interest before re-checking so a release between the
            // check and the await cannot be missed.
            let freed = self.table.freed.notified();
            if let Some(handle) = self.try_acquire(key).await {
                return Ok(handle);
            }
            freed.await;
        }
    }
}

struct InMemoryHeldLock {
    key: String,
    table: Arc<LockTable>,
    released: bool,
}

impl InMemoryHeldLock {
    fn unlock(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.table.held.lock().unwrap().remove(&self.key);
        self.table.freed.notify_waiters();
    }
}

#[async_trait]
impl HeldLock for InMemoryHeldLock {
    async fn release(&mut self) {
        self.unlock();
    }
}

impl Drop for InMemoryHeldLock {
    fn drop(&mut self) {
        self.unlock();
    }
}
