//! In-process TTL cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use crate::cache::{CacheError, CacheLayer};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Far enough out to never expire within a process lifetime.
const FOREVER: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + ttl`, clamped so absurd TTLs cannot overflow the clock.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FOREVER))
        .unwrap_or(now)
}

/// A thread-safe TTL cache. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| !entry.is_expired(now));
        before - self.inner.len()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.inner.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.inner.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.inner.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: expiry(Instant::now(), ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError> {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: expiry(now, ttl),
        };
        match self.inner.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_expired(now) {
                    slot.insert(entry);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .inner
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_set_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", json!(8), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!(8)));

        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_falsy_values_are_hits() {
        let cache = MemoryCache::new();
        cache.set("zero", json!(0), Duration::from_secs(60)).await.unwrap();
        cache.set("off", json!(false), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("zero").await.unwrap(), Some(json!(0)));
        assert_eq!(cache.get("off").await.unwrap(), Some(json!(false)));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let cache = MemoryCache::new();
        assert!(cache.set_if_absent("lock", json!("a"), Duration::from_secs(60)).await.unwrap());
        assert!(!cache.set_if_absent("lock", json!("b"), Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get("lock").await.unwrap(), Some(json!("a")));
    }

    #[tokio::test]
    async fn test_set_if_absent_takes_over_expired_entry() {
        let cache = MemoryCache::new();
        cache.set_if_absent("lock", json!("a"), Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.set_if_absent("lock", json!("b"), Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get("lock").await.unwrap(), Some(json!("b")));
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(i64::MAX as u64);
        cache.set("k", json!(1), ttl).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!(1)));
        assert!(cache.set_if_absent("lock", json!("a"), Duration::MAX).await.unwrap());
        assert!(!cache.set_if_absent("lock", json!("b"), ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("short", json!(1), Duration::from_millis(10)).await.unwrap();
        cache.set("long", json!(2), Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
