//! Cache layer adapter.
//!
//! # Responsibilities
//! - TTL-bounded key/value cache in front of the store
//! - Atomic set-if-absent, used as a cross-process lock
//!
//! # Design Decisions
//! - The cache is never authoritative; every entry can be rebuilt from the store
//! - Expired entries behave exactly like absent ones

pub mod lock;
pub mod memory;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use lock::{DistributedLock, LockGuard};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// Errors reported by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache entry is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Shared TTL cache.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Store `value` only if `key` is absent or expired. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError>;

    /// Remove `key`. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
}
