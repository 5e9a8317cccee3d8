//! Runtime configuration service.
//!
//! # Data Flow
//! ```text
//! fetch(id):     cache → (miss) store → (absent) materialize default → cache
//! fetch_all(ids): store batch read, no cache
//! set(id, v):    validate → store upsert → cache refresh
//! update(id, f): fetch → f(value).await → set   (not atomic, last write wins)
//! ```

pub mod service;

use thiserror::Error;

use crate::cache::CacheError;
use crate::registry::ValueKind;
use crate::store::StoreError;

pub use service::{RuntimeConfig, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_TTL};

/// Errors surfaced to consumers of the runtime config service.
#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("runtime config {0} not found")]
    NotFound(String),

    #[error("runtime config {id} expects a {expected} value, got {actual}")]
    Validation {
        id: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("runtime config {id} could not be decoded: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl RuntimeConfigError {
    /// Whether the failure comes from an unavailable backend and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, RuntimeConfigError::Store(_) | RuntimeConfigError::Cache(_))
    }
}
