//! Read-through, write-refresh access to runtime settings.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::CacheLayer;
use crate::observability::metrics;
use crate::registry::{ConfigDescriptor, SchemaRegistry, ValueKind};
use crate::runtime::RuntimeConfigError;
use crate::store::{ConfigRecord, ConfigStore, RecordFilter, RecordPatch, StoreError};

/// How long a fetched value is served from cache.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Namespace for setting values in a shared cache.
pub const DEFAULT_CACHE_PREFIX: &str = "SERVER_RUNTIME:";

/// Access point for runtime settings.
///
/// ```text
/// runtime.fetch("auth/password.min")                       // 8
/// runtime.fetch_all(["auth/password.min", "auth/password.max"])
/// runtime.set("auth/password.min", json!(10))
/// runtime.update("auth/password.max", |v| async move { json!(v.as_u64().unwrap_or(32) * 2) })
/// ```
///
/// There is no ordering between concurrent calls on the same id; `update`
/// in particular can lose a write that lands between its read and its write.
#[derive(Clone)]
pub struct RuntimeConfig {
    registry: SchemaRegistry,
    store: Arc<dyn ConfigStore>,
    cache: Arc<dyn CacheLayer>,
    cache_ttl: Duration,
    cache_prefix: String,
}

impl RuntimeConfig {
    pub fn new(registry: SchemaRegistry, store: Arc<dyn ConfigStore>, cache: Arc<dyn CacheLayer>) -> Self {
        Self {
            registry,
            store,
            cache,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    fn cache_key(&self, id: &str) -> String {
        format!("{}{}", self.cache_prefix, id)
    }

    fn descriptor(&self, id: &str) -> Result<&ConfigDescriptor, RuntimeConfigError> {
        self.registry
            .get(id)
            .ok_or_else(|| RuntimeConfigError::NotFound(id.to_string()))
    }

    /// Current value of `id`, creating its record from the default if needed.
    pub async fn fetch(&self, id: &str) -> Result<Value, RuntimeConfigError> {
        let descriptor = self.descriptor(id)?;
        let key = self.cache_key(id);

        if let Some(value) = self.cache.get(&key).await? {
            tracing::debug!(id = %id, "Runtime config cache hit");
            metrics::record_cache_lookup(true);
            return Ok(value);
        }
        metrics::record_cache_lookup(false);

        let value = match self.store.find(id).await? {
            Some(record) if record.is_active() => record.value,
            Some(_) => {
                let record = self
                    .store
                    .upsert(id, ConfigRecord::from_descriptor(descriptor), RecordPatch::restore(descriptor))
                    .await?;
                tracing::info!(id = %id, "Restored soft-deleted runtime config from default");
                metrics::record_materialized();
                record.value
            }
            None => self.materialize(descriptor).await?,
        };

        self.cache.set(&key, value.clone(), self.cache_ttl).await?;
        Ok(value)
    }

    /// Fetch and decode into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self, id: &str) -> Result<T, RuntimeConfigError> {
        let value = self.fetch(id).await?;
        serde_json::from_value(value).map_err(|source| RuntimeConfigError::Decode {
            id: id.to_string(),
            source,
        })
    }

    async fn materialize(&self, descriptor: &ConfigDescriptor) -> Result<Value, RuntimeConfigError> {
        match self.store.create(ConfigRecord::from_descriptor(descriptor)).await {
            Ok(record) => {
                tracing::info!(id = %descriptor.id, "Materialized runtime config from default");
                metrics::record_materialized();
                Ok(record.value)
            }
            Err(StoreError::Conflict(_)) => {
                tracing::debug!(id = %descriptor.id, "Runtime config created concurrently, re-reading");
                self.store
                    .find(&descriptor.id)
                    .await?
                    .map(|record| record.value)
                    .ok_or_else(|| RuntimeConfigError::NotFound(descriptor.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Values of every requested id that has an active record, read in one store call.
    pub async fn fetch_all<I, S>(&self, ids: I) -> Result<BTreeMap<String, Value>, RuntimeConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        ids.sort();
        ids.dedup();

        let records = self.store.find_many(&ids).await?;
        Ok(records
            .into_iter()
            .filter(ConfigRecord::is_active)
            .map(|record| (record.id, record.value))
            .collect())
    }

    /// Write `value` for `id` and refresh its cache entry.
    pub async fn set(&self, id: &str, value: Value) -> Result<ConfigRecord, RuntimeConfigError> {
        let descriptor = self.descriptor(id)?;
        if !descriptor.accepts(&value) {
            return Err(RuntimeConfigError::Validation {
                id: id.to_string(),
                expected: descriptor.kind(),
                actual: ValueKind::of(&value),
            });
        }

        let create = ConfigRecord {
            value: value.clone(),
            ..ConfigRecord::from_descriptor(descriptor)
        };
        let record = self
            .store
            .upsert(id, create, RecordPatch::value(value).and_restore())
            .await?;

        self.cache
            .set(&self.cache_key(id), record.value.clone(), self.cache_ttl)
            .await?;

        tracing::info!(id = %id, "Runtime config updated");
        metrics::record_write();
        Ok(record)
    }

    /// Read, transform and write back `id`.
    ///
    /// Not atomic: a concurrent write between the read and the write is lost.
    pub async fn update<F, Fut>(&self, id: &str, modifier: F) -> Result<Value, RuntimeConfigError>
    where
        F: FnOnce(Value) -> Fut + Send,
        Fut: Future<Output = Value> + Send,
    {
        let current = self.fetch(id).await?;
        let updated = modifier(current).await;
        self.set(id, updated.clone()).await?;
        Ok(updated)
    }

    /// Active records, optionally restricted to one module.
    pub async fn list(&self, module: Option<&str>) -> Result<Vec<ConfigRecord>, RuntimeConfigError> {
        let mut filter = RecordFilter::active();
        if let Some(module) = module {
            filter = filter.module(module);
        }
        Ok(self.store.find_all(filter).await?)
    }

    /// Drop the cached value of `id`; the next fetch reads the store.
    pub async fn invalidate(&self, id: &str) -> Result<bool, RuntimeConfigError> {
        Ok(self.cache.delete(&self.cache_key(id)).await?)
    }
}
