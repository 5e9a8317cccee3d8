//! Persistent store adapter.
//!
//! # Responsibilities
//! - Durable, id-addressed storage of [`ConfigRecord`]s
//! - Point lookup, batch lookup, create, upsert
//! - Batch update by filter (soft delete) and filtered listing
//!
//! # Design Decisions
//! - Records are never hard-deleted; `deleted_at` marks them inactive
//! - `create` reports `Conflict` so callers can detect a racing replica
//! - Backends: in-memory (tests, single process) and SQLite (shared by replicas)

pub mod memory;
pub mod record;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use record::{ConfigRecord, RecordFilter, RecordPatch};
pub use sqlite::SqliteStore;

/// Errors reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} already exists")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable storage for runtime setting records.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Look up one record, active or not.
    async fn find(&self, id: &str) -> Result<Option<ConfigRecord>, StoreError>;

    /// Look up several records in one round-trip.
    async fn find_many(&self, ids: &[String]) -> Result<Vec<ConfigRecord>, StoreError> {
        self.find_all(RecordFilter::ids(ids.iter().cloned())).await
    }

    /// All records matching `filter`, ordered by id.
    async fn find_all(&self, filter: RecordFilter) -> Result<Vec<ConfigRecord>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::Conflict`] if the id exists.
    async fn create(&self, record: ConfigRecord) -> Result<ConfigRecord, StoreError>;

    /// Insert `create` if `id` is unknown, otherwise apply `update` to the existing record.
    async fn upsert(
        &self,
        id: &str,
        create: ConfigRecord,
        update: RecordPatch,
    ) -> Result<ConfigRecord, StoreError>;

    /// Apply `patch` to every matching record; returns the number changed.
    async fn update_many(&self, filter: RecordFilter, patch: RecordPatch) -> Result<usize, StoreError>;
}
