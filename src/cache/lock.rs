//! Cross-process mutual exclusion on top of the cache's set-if-absent.
//!
//! # Design Decisions
//! - The TTL bounds how long a crashed holder blocks everyone else
//! - Each acquisition stores a random token; release only deletes a key that
//!   still carries our token, so an expired-and-retaken lock is left alone
//! - A process that failed to acquire never touches the key

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::cache::{CacheError, CacheLayer};

/// Lock primitive bound to one well-known key.
#[derive(Clone)]
pub struct DistributedLock {
    cache: Arc<dyn CacheLayer>,
    key: String,
    ttl: Duration,
}

impl DistributedLock {
    pub fn new(cache: Arc<dyn CacheLayer>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            key: key.into(),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Try once to take the lock. `Ok(None)` means another holder has it.
    pub async fn try_acquire(&self) -> Result<Option<LockGuard>, CacheError> {
        let token = Uuid::new_v4().to_string();
        let acquired = self
            .cache
            .set_if_absent(&self.key, Value::String(token.clone()), self.ttl)
            .await?;

        if !acquired {
            tracing::debug!(key = %self.key, "Lock held elsewhere");
            return Ok(None);
        }

        tracing::debug!(key = %self.key, ttl = ?self.ttl, "Lock acquired");
        Ok(Some(LockGuard {
            cache: self.cache.clone(),
            key: self.key.clone(),
            token,
            released: false,
        }))
    }
}

/// A held lock.
///
/// Call [`LockGuard::release`] on the normal path. If the guard is dropped
/// instead (error, panic or cancelled future) release is scheduled on the
/// current tokio runtime; without a runtime the TTL frees the key.
#[must_use = "dropping the guard releases the lock"]
pub struct LockGuard {
    cache: Arc<dyn CacheLayer>,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock now.
    pub async fn release(mut self) -> Result<bool, CacheError> {
        self.released = true;
        release_if_owned(self.cache.as_ref(), &self.key, &self.token).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let cache = self.cache.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = release_if_owned(cache.as_ref(), &key, &token).await {
                        tracing::warn!(key = %key, error = %e, "Failed to release lock on drop");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(key = %key, "No runtime to release lock; waiting for TTL expiry");
            }
        }
    }
}

async fn release_if_owned(cache: &dyn CacheLayer, key: &str, token: &str) -> Result<bool, CacheError> {
    match cache.get(key).await? {
        Some(Value::String(current)) if current == token => {
            let removed = cache.delete(key).await?;
            tracing::debug!(key = %key, "Lock released");
            Ok(removed)
        }
        _ => {
            tracing::warn!(key = %key, "Lock no longer owned at release");
            Ok(false)
        }
    }
}
