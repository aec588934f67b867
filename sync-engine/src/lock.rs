//! Cluster-wide mutual exclusion.
//!
//! [`KvLock`] is a thin wrapper over an atomic set-if-not-exists with
//! expiry. The lock is single-owner, bounded by its TTL and best-effort:
//! a crashed holder blocks others at most until the key expires.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// The backing key-value store failed.
    #[error("lock backend unavailable: {0}")]
    Unavailable(String),
}

/// A distributed lock handle.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take `key` for `ttl`. Returns `false` if someone else holds it.
    async fn lock(&self, key: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Release the key taken by the last successful `lock`, if any.
    async fn unlock(&self) -> Result<(), LockError>;
}

/// Key-value primitives needed by [`KvLock`].
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Set `key` to `value` with expiry unless it already exists.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Delete `key` if its value is `value`. Returns whether it was deleted.
    async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool, LockError>;
}

/// [`DistributedLock`] over a [`KvStore`].
///
/// Each instance has a random owner token, so it can only release keys it
/// took itself.
pub struct KvLock {
    kv: Arc<dyn KvStore>,
    owner: String,
    held: tokio::sync::Mutex<Option<String>>,
}

impl KvLock {
    /// Create a lock handle with a fresh owner token.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            owner: Uuid::new_v4().to_string(),
            held: tokio::sync::Mutex::new(None),
        }
    }

    /// This handle's owner token.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

#[async_trait]
impl DistributedLock for KvLock {
    async fn lock(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut held = self.held.lock().await;
        let acquired = self.kv.set_nx(key, &self.owner, ttl).await?;
        if acquired {
            *held = Some(key.to_string());
        }
        Ok(acquired)
    }

    async fn unlock(&self) -> Result<(), LockError> {
        let mut held = self.held.lock().await;
        let Some(key) = held.take() else {
            return Ok(());
        };
        if !self.kv.delete_if_eq(&key, &self.owner).await? {
            tracing::debug!("Lock {} already expired or taken over", key);
        }
        Ok(())
    }
}

/// In-memory [`KvStore`] with real expiry.
///
/// Clones share the same keys.
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    inner: Arc<Mutex<MemoryKvInner>>,
}

#[derive(Debug, Default)]
struct MemoryKvInner {
    entries: HashMap<String, (String, Instant)>,
    fail_next: Option<String>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryKvInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current value of a key, ignoring expired entries.
    pub fn get(&self, key: &str) -> Option<String> {
        let inner = self.lock();
        inner
            .entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(value, _)| value.clone())
    }

    /// Cause the next call to fail with the given error.
    pub fn fail_next(&self, error: &str) {
        self.lock().fail_next = Some(error.to_string());
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next.take() {
            return Err(LockError::Unavailable(error));
        }

        let now = Instant::now();
        if inner.entries.get(key).is_some_and(|(_, expires)| *expires > now) {
            return Ok(false);
        }
        inner
            .entries
            .insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(true)
    }

    async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool, LockError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next.take() {
            return Err(LockError::Unavailable(error));
        }

        let owned = inner
            .entries
            .get(key)
            .is_some_and(|(v, expires)| v == value && *expires > Instant::now());
        if owned {
            inner.entries.remove(key);
        }
        Ok(owned)
    }
}
