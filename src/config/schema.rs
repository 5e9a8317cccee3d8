//! Configuration schema definitions.
//!
//! This module defines the startup configuration of the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::reconcile::DEFAULT_LOCK_KEY;
use crate::runtime::DEFAULT_CACHE_PREFIX;

/// Root configuration for the runtime config service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Persistent store backend.
    pub store: StoreConfig,

    /// Cache and reconciliation lock settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Which store backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local map; contents are lost on exit.
    #[default]
    Memory,
    /// SQLite database file; replicas pointing at the same file share records.
    Sqlite,
}

/// Persistent store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database file (sqlite backend only).
    pub path: Option<String>,
}

/// Which cache backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local; the reconciliation lock only excludes this process.
    #[default]
    Memory,
    /// Table in a SQLite database shared by replicas.
    Sqlite,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Database file (sqlite backend only). Defaults to the store's database.
    pub path: Option<String>,

    /// How long fetched values are served from cache.
    pub ttl_secs: u64,

    /// Reconciliation lock TTL; bounds how long a crashed holder blocks others.
    pub lock_ttl_secs: u64,

    /// Namespace prepended to setting ids.
    pub key_prefix: String,

    /// Well-known reconciliation lock key.
    pub lock_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            path: None,
            ttl_secs: 60,
            lock_ttl_secs: 10 * 60,
            key_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            lock_key: DEFAULT_LOCK_KEY.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Database file backing the sqlite cache, falling back to the store's.
    pub fn cache_path(&self) -> Option<&str> {
        let store_path = match self.store.backend {
            StoreBackend::Sqlite => self.store.path.as_deref(),
            StoreBackend::Memory => None,
        };
        self.cache.path.as_deref().or(store_path).filter(|p| !p.is_empty())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
