//! Startup reconciliation of persisted records against declared settings.
//!
//! # Algorithm
//! ```text
//! active ids  = store.find_all(active)
//! new_ids     = declared − active
//! stale_ids   = active − declared
//! empty diff  → done, no lock taken
//! lock held   → done, the holder (or the next start) converges
//! lock taken  → re-plan; upsert/restore new_ids, soft-delete stale_ids, release
//! ```
//!
//! Every step is idempotent per id and the diff is recomputed from persisted
//! state on each run, so a crash mid-way converges on the next start.

pub mod diff;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::cache::{CacheLayer, DistributedLock};
use crate::observability::metrics;
use crate::registry::SchemaRegistry;
use crate::runtime::{RuntimeConfigError, DEFAULT_CACHE_PREFIX};
use crate::store::{ConfigRecord, ConfigStore, RecordFilter, RecordPatch};

pub use diff::SchemaDiff;

/// Well-known key guarding reconciliation across replicas.
pub const DEFAULT_LOCK_KEY: &str = "runtime:upgrade";

/// Upper bound on how long a crashed reconciler blocks the others.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10 * 60);

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Persisted records already match the registry.
    UpToDate,
    /// Another process holds the lock; nothing was written.
    Skipped { pending: SchemaDiff },
    /// The diff was applied.
    Applied { created: usize, soft_deleted: usize },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::UpToDate => "up_to_date",
            ReconcileOutcome::Skipped { .. } => "skipped",
            ReconcileOutcome::Applied { .. } => "applied",
        }
    }
}

/// Aligns the store with the schema registry.
pub struct Reconciler {
    registry: SchemaRegistry,
    store: Arc<dyn ConfigStore>,
    cache: Arc<dyn CacheLayer>,
    lock: DistributedLock,
    cache_prefix: String,
}

impl Reconciler {
    pub fn new(registry: SchemaRegistry, store: Arc<dyn ConfigStore>, cache: Arc<dyn CacheLayer>) -> Self {
        let lock = DistributedLock::new(cache.clone(), DEFAULT_LOCK_KEY, DEFAULT_LOCK_TTL);
        Self {
            registry,
            store,
            cache,
            lock,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
        }
    }

    pub fn with_lock(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.lock = DistributedLock::new(self.cache.clone(), key, ttl);
        self
    }

    /// Prefix used by the runtime service, so restored values are not shadowed by stale cache entries.
    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Compute what would change, without taking the lock or writing.
    pub async fn plan(&self) -> Result<SchemaDiff, RuntimeConfigError> {
        let active = self.store.find_all(RecordFilter::active()).await?;
        Ok(SchemaDiff::compute(
            self.registry.ids(),
            active.iter().map(|record| record.id.as_str()),
        ))
    }

    pub async fn run(&self) -> Result<ReconcileOutcome, RuntimeConfigError> {
        let diff = self.plan().await?;
        if diff.is_empty() {
            tracing::debug!("Runtime config schema up to date");
            metrics::record_reconcile("up_to_date");
            return Ok(ReconcileOutcome::UpToDate);
        }

        tracing::info!(
            new = diff.new_ids.len(),
            stale = diff.stale_ids.len(),
            "Found runtime config changes, upgrading"
        );

        let Some(guard) = self.lock.try_acquire().await? else {
            tracing::info!(lock = %self.lock.key(), "Runtime config upgrade already in progress elsewhere");
            metrics::record_reconcile("skipped");
            return Ok(ReconcileOutcome::Skipped { pending: diff });
        };

        // The previous holder may have applied the same diff before releasing.
        let applied = match self.plan().await {
            Ok(diff) if diff.is_empty() => Ok(None),
            Ok(diff) => self.apply(&diff).await.map(Some),
            Err(e) => Err(e),
        };
        if let Err(e) = guard.release().await {
            tracing::warn!(error = %e, "Failed to release runtime config upgrade lock");
        }
        let Some((created, soft_deleted)) = applied? else {
            tracing::debug!("Runtime config schema already upgraded by another process");
            metrics::record_reconcile("up_to_date");
            return Ok(ReconcileOutcome::UpToDate);
        };

        tracing::info!(created, soft_deleted, "Runtime config upgrade completed");
        metrics::record_reconcile("applied");
        Ok(ReconcileOutcome::Applied { created, soft_deleted })
    }

    async fn apply(&self, diff: &SchemaDiff) -> Result<(usize, usize), RuntimeConfigError> {
        let mut created = 0;
        for id in &diff.new_ids {
            let Some(descriptor) = self.registry.get(id) else {
                continue;
            };
            // A soft-deleted record with this id is restored, not duplicated.
            self.store
                .upsert(id, ConfigRecord::from_descriptor(descriptor), RecordPatch::restore(descriptor))
                .await?;
            self.cache.delete(&format!("{}{}", self.cache_prefix, id)).await?;
            tracing::debug!(id = %id, "Runtime config record created");
            created += 1;
        }

        let soft_deleted = if diff.stale_ids.is_empty() {
            0
        } else {
            self.store
                .update_many(
                    RecordFilter::ids(diff.stale_ids.iter().cloned()),
                    RecordPatch::soft_delete(Utc::now()),
                )
                .await?
        };

        Ok((created, soft_deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::registry::ConfigNode;
    use crate::store::{MemoryStore, StoreError};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn registry(entries: &[(&str, i64)]) -> SchemaRegistry {
        let mut builder = SchemaRegistry::builder();
        let tree: BTreeMap<String, ConfigNode> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), ConfigNode::leaf(format!("{k} setting"), *v)))
            .collect();
        builder.register("auth", tree).unwrap();
        builder.build()
    }

    fn reconciler(registry: SchemaRegistry, store: &MemoryStore, cache: &MemoryCache) -> Reconciler {
        Reconciler::new(registry, Arc::new(store.clone()), Arc::new(cache.clone()))
    }

    #[tokio::test]
    async fn test_creates_missing_records_then_noop() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let r = reconciler(registry(&[("min", 8), ("max", 32)]), &store, &cache);

        assert_eq!(
            r.run().await.unwrap(),
            ReconcileOutcome::Applied { created: 2, soft_deleted: 0 }
        );
        assert_eq!(store.find("auth/min").await.unwrap().unwrap().value, json!(8));
        assert_eq!(r.run().await.unwrap(), ReconcileOutcome::UpToDate);
        // Lock released after the run.
        assert_eq!(cache.get(DEFAULT_LOCK_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_skips_when_lock_held() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        cache
            .set_if_absent(DEFAULT_LOCK_KEY, json!("other-process"), DEFAULT_LOCK_TTL)
            .await
            .unwrap();

        let r = reconciler(registry(&[("min", 8)]), &store, &cache);
        let outcome = r.run().await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Skipped { ref pending } if pending.new_ids == ["auth/min"]));
        assert!(store.is_empty());
        // The foreign lock is untouched.
        assert_eq!(cache.get(DEFAULT_LOCK_KEY).await.unwrap(), Some(json!("other-process")));
    }

    #[tokio::test]
    async fn test_soft_deletes_then_restores_with_new_default() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();

        reconciler(registry(&[("min", 8), ("max", 32)]), &store, &cache).run().await.unwrap();
        store
            .upsert("auth/max", ConfigRecord::from_descriptor(&crate::registry::ConfigDescriptor::new("auth", "max", "", json!(0))), RecordPatch::value(json!(64)))
            .await
            .unwrap();

        let outcome = reconciler(registry(&[("min", 8)]), &store, &cache).run().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied { created: 0, soft_deleted: 1 });
        let removed = store.find("auth/max").await.unwrap().unwrap();
        assert!(!removed.is_active());
        assert_eq!(removed.value, json!(64));

        cache.set("SERVER_RUNTIME:auth/max", json!(64), Duration::from_secs(60)).await.unwrap();
        let outcome = reconciler(registry(&[("min", 8), ("max", 48)]), &store, &cache).run().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied { created: 1, soft_deleted: 0 });

        let restored = store.find("auth/max").await.unwrap().unwrap();
        assert!(restored.is_active());
        assert_eq!(restored.value, json!(48));
        assert_eq!(store.len(), 2);
        assert_eq!(cache.get("SERVER_RUNTIME:auth/max").await.unwrap(), None);
    }

    /// Delegates to a [`MemoryStore`] but fails every write.
    struct ReadOnlyStore(MemoryStore);

    #[async_trait::async_trait]
    impl ConfigStore for ReadOnlyStore {
        async fn find(&self, id: &str) -> Result<Option<ConfigRecord>, StoreError> {
            self.0.find(id).await
        }
        async fn find_all(&self, filter: RecordFilter) -> Result<Vec<ConfigRecord>, StoreError> {
            self.0.find_all(filter).await
        }
        async fn create(&self, _: ConfigRecord) -> Result<ConfigRecord, StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }
        async fn upsert(&self, _: &str, _: ConfigRecord, _: RecordPatch) -> Result<ConfigRecord, StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }
        async fn update_many(&self, _: RecordFilter, _: RecordPatch) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }
    }

    #[tokio::test]
    async fn test_lock_released_when_apply_fails() {
        let cache = MemoryCache::new();
        let r = Reconciler::new(
            registry(&[("min", 8)]),
            Arc::new(ReadOnlyStore(MemoryStore::new())),
            Arc::new(cache.clone()),
        );

        let err = r.run().await.unwrap_err();
        assert!(matches!(err, RuntimeConfigError::Store(StoreError::Unavailable(_))));
        assert_eq!(cache.get(DEFAULT_LOCK_KEY).await.unwrap(), None);
    }

    /// Serves one empty `find_all`, as seen by a process that planned before
    /// another one applied the same diff.
    struct StaleFirstRead {
        inner: MemoryStore,
        served: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl ConfigStore for StaleFirstRead {
        async fn find(&self, id: &str) -> Result<Option<ConfigRecord>, StoreError> {
            self.inner.find(id).await
        }
        async fn find_all(&self, filter: RecordFilter) -> Result<Vec<ConfigRecord>, StoreError> {
            if !self.served.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Ok(Vec::new());
            }
            self.inner.find_all(filter).await
        }
        async fn create(&self, record: ConfigRecord) -> Result<ConfigRecord, StoreError> {
            self.inner.create(record).await
        }
        async fn upsert(&self, id: &str, create: ConfigRecord, update: RecordPatch) -> Result<ConfigRecord, StoreError> {
            self.inner.upsert(id, create, update).await
        }
        async fn update_many(&self, filter: RecordFilter, patch: RecordPatch) -> Result<usize, StoreError> {
            self.inner.update_many(filter, patch).await
        }
    }

    #[tokio::test]
    async fn test_replans_after_acquiring_lock() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();

        // Applied elsewhere, then changed by an admin.
        reconciler(registry(&[("min", 8)]), &store, &cache).run().await.unwrap();
        store
            .upsert(
                "auth/min",
                ConfigRecord::from_descriptor(&crate::registry::ConfigDescriptor::new("auth", "min", "", json!(8))),
                RecordPatch::value(json!(20)),
            )
            .await
            .unwrap();

        let late = Reconciler::new(
            registry(&[("min", 8)]),
            Arc::new(StaleFirstRead {
                inner: store.clone(),
                served: Default::default(),
            }),
            Arc::new(cache.clone()),
        );
        assert_eq!(late.run().await.unwrap(), ReconcileOutcome::UpToDate);
        assert_eq!(store.find("auth/min").await.unwrap().unwrap().value, json!(20));
        assert_eq!(cache.get(DEFAULT_LOCK_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_plan_does_not_write() {
        let store = MemoryStore::new();
        let r = reconciler(registry(&[("min", 8)]), &store, &MemoryCache::new());
        let plan = r.plan().await.unwrap();
        assert_eq!(plan.new_ids, vec!["auth/min"]);
        assert!(store.is_empty());
    }
}
