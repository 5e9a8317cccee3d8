//! TTL cache in a SQLite table, shared by every process opening the database.
//!
//! Expiry is stored as wall-clock milliseconds. `set_if_absent` is a single
//! upsert that only overwrites an expired row, which makes it usable as a
//! cross-process lock.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::cache::{CacheError, CacheLayer};

/// Cache sharing a pool (and usually a database file) with the store.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Wrap `pool`, creating the cache table if it is missing.
    pub async fn new(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runtime_cache (
                cache_key  TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Remove every expired row. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM runtime_cache WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute expiry for `ttl` from now, saturating instead of overflowing.
fn expires_at(ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_add(ttl)
}

#[async_trait]
impl CacheLayer for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM runtime_cache WHERE cache_key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_millis())
                .fetch_optional(&self.pool)
                .await?;
        value.map(|v| serde_json::from_str(&v)).transpose().map_err(CacheError::from)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            INSERT INTO runtime_cache (cache_key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(serde_json::to_string(&value)?)
        .bind(expires_at(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError> {
        let result = sqlx::query(
            r#"
            INSERT INTO runtime_cache (cache_key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            WHERE runtime_cache.expires_at <= ?
            "#,
        )
        .bind(key)
        .bind(serde_json::to_string(&value)?)
        .bind(expires_at(ttl))
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let expired_at: Option<i64> =
            sqlx::query_scalar("DELETE FROM runtime_cache WHERE cache_key = ? RETURNING expires_at")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(expired_at.is_some_and(|at| at > now_millis()))
    }
}
