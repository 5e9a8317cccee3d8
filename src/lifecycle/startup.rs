//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the configured store and cache
//! - Reconcile persisted records with the registry before serving
//! - Hand out the runtime service to the rest of the process
//!
//! # Design Decisions
//! - Store open failures are fatal; reconciliation failures are not
//! - Reads self-heal via lazy materialization, so a skipped or failed
//!   reconciliation only delays cleanup of stale records

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{CacheError, CacheLayer, MemoryCache, SqliteCache};
use crate::config::{CacheBackend, ServiceConfig, StoreBackend};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::registry::SchemaRegistry;
use crate::runtime::RuntimeConfig;
use crate::store::sqlite::open_pool;
use crate::store::{ConfigStore, MemoryStore, SqliteStore, StoreError};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {field} {message}")]
    Config { field: &'static str, message: &'static str },

    #[error("failed to open database: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Everything the serving layer needs.
#[derive(Clone)]
pub struct Services {
    pub runtime: RuntimeConfig,
    pub reconciler: Arc<Reconciler>,
}

/// Opened store and cache backends.
pub struct Backends {
    pub store: Arc<dyn ConfigStore>,
    pub cache: Arc<dyn CacheLayer>,
}

/// Open the store and cache backends named in the config.
///
/// A sqlite store and cache pointing at the same file share one pool.
pub async fn open_backends(config: &ServiceConfig) -> Result<Backends, StartupError> {
    let store_pool = match config.store.backend {
        StoreBackend::Memory => None,
        StoreBackend::Sqlite => {
            let path = config
                .store
                .path
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or(StartupError::Config {
                    field: "store.path",
                    message: "is required for the sqlite backend",
                })?;
            Some((path, open_pool(Path::new(path)).await?))
        }
    };

    let cache: Arc<dyn CacheLayer> = match config.cache.backend {
        CacheBackend::Memory => {
            if config.store.backend != StoreBackend::Memory {
                tracing::warn!("Using in-memory cache; the upgrade lock only excludes this process");
            }
            Arc::new(MemoryCache::new())
        }
        CacheBackend::Sqlite => {
            let path = config.cache_path().ok_or(StartupError::Config {
                field: "cache.path",
                message: "is required for the sqlite backend",
            })?;
            let pool = match &store_pool {
                Some((store_path, pool)) if *store_path == path => pool.clone(),
                _ => open_pool(Path::new(path)).await?,
            };
            Arc::new(SqliteCache::new(pool).await?)
        }
    };

    let store: Arc<dyn ConfigStore> = match store_pool {
        None => {
            tracing::warn!("Using in-memory store; runtime settings will not survive a restart");
            Arc::new(MemoryStore::new())
        }
        Some((_, pool)) => Arc::new(SqliteStore::new(pool).await?),
    };

    Ok(Backends { store, cache })
}

/// Wire the runtime service and reconciler from explicit parts.
pub fn build_services(
    config: &ServiceConfig,
    registry: SchemaRegistry,
    store: Arc<dyn ConfigStore>,
    cache: Arc<dyn CacheLayer>,
) -> Services {
    let runtime = RuntimeConfig::new(registry.clone(), store.clone(), cache.clone())
        .with_cache_ttl(Duration::from_secs(config.cache.ttl_secs))
        .with_cache_prefix(config.cache.key_prefix.clone());

    let reconciler = Reconciler::new(registry, store, cache)
        .with_lock(config.cache.lock_key.clone(), Duration::from_secs(config.cache.lock_ttl_secs))
        .with_cache_prefix(config.cache.key_prefix.clone());

    Services {
        runtime,
        reconciler: Arc::new(reconciler),
    }
}

/// Run reconciliation once, never failing startup.
pub async fn bootstrap(reconciler: &Reconciler) -> Option<ReconcileOutcome> {
    match reconciler.run().await {
        Ok(outcome) => {
            tracing::info!(outcome = outcome.label(), "Runtime config bootstrap finished");
            Some(outcome)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Runtime config reconciliation failed; continuing startup");
            None
        }
    }
}

/// Open backends, build services and reconcile.
pub async fn start(config: &ServiceConfig, registry: SchemaRegistry) -> Result<Services, StartupError> {
    tracing::info!(settings = registry.len(), modules = ?registry.modules(), "Schema registry built");

    let Backends { store, cache } = open_backends(config).await?;
    let services = build_services(config, registry, store, cache);

    bootstrap(&services.reconciler).await;
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::default_registry;
    use crate::registry::ConfigNode;
    use crate::store::RecordFilter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_start_reconciles_default_registry() {
        let config = ServiceConfig::default();
        let services = start(&config, default_registry().unwrap()).await.unwrap();

        let records = services.runtime.list(None).await.unwrap();
        assert_eq!(records.len(), services.runtime.registry().len());
        assert_eq!(services.runtime.fetch("auth/password.min").await.unwrap(), json!(8));
    }

    struct BrokenStore;

    #[async_trait]
    impl ConfigStore for BrokenStore {
        async fn find(&self, _: &str) -> Result<Option<crate::store::ConfigRecord>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn find_all(&self, _: RecordFilter) -> Result<Vec<crate::store::ConfigRecord>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn create(&self, _: crate::store::ConfigRecord) -> Result<crate::store::ConfigRecord, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn upsert(
            &self,
            _: &str,
            _: crate::store::ConfigRecord,
            _: crate::store::RecordPatch,
        ) -> Result<crate::store::ConfigRecord, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn update_many(&self, _: RecordFilter, _: crate::store::RecordPatch) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_not_fatal() {
        let services = build_services(
            &ServiceConfig::default(),
            default_registry().unwrap(),
            Arc::new(BrokenStore),
            Arc::new(MemoryCache::new()),
        );
        assert_eq!(bootstrap(&services.reconciler).await, None);
    }

    #[tokio::test]
    async fn test_sqlite_backend_requires_path() {
        let mut config = ServiceConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        assert!(matches!(
            open_backends(&config).await,
            Err(StartupError::Config { field: "store.path", .. })
        ));

        let mut config = ServiceConfig::default();
        config.cache.backend = CacheBackend::Sqlite;
        assert!(matches!(
            open_backends(&config).await,
            Err(StartupError::Config { field: "cache.path", .. })
        ));
    }

    #[tokio::test]
    async fn test_replicas_on_sqlite_share_records_and_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        config.store.path = Some(dir.path().join("settings.db").display().to_string());
        config.cache.backend = CacheBackend::Sqlite;

        let first = start(&config, default_registry().unwrap()).await.unwrap();
        first.runtime.set("auth/password.min", json!(12)).await.unwrap();

        let second = start(&config, default_registry().unwrap()).await.unwrap();
        assert_eq!(second.runtime.fetch("auth/password.min").await.unwrap(), json!(12));

        // A third process holds the upgrade lock in the shared database.
        let Backends { cache, .. } = open_backends(&config).await.unwrap();
        assert!(cache
            .set_if_absent(&config.cache.lock_key, json!("elsewhere"), Duration::from_secs(60))
            .await
            .unwrap());

        let mut builder = SchemaRegistry::builder();
        builder
            .register("extra", BTreeMap::from([("beta".to_string(), ConfigNode::leaf("Beta", false))]))
            .unwrap();
        let Backends { store, cache } = open_backends(&config).await.unwrap();
        let reconciler = build_services(&config, builder.build(), store, cache).reconciler;
        assert!(matches!(reconciler.run().await.unwrap(), ReconcileOutcome::Skipped { .. }));
        assert_eq!(
            first.runtime.list(None).await.unwrap().len(),
            first.runtime.registry().len()
        );
    }
}
