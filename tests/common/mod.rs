//! Shared utilities for integration tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use runtime_config::registry::{ConfigNode, SchemaRegistry};
use runtime_config::store::{ConfigRecord, ConfigStore, MemoryStore, RecordFilter, RecordPatch, StoreError};

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub find: AtomicUsize,
    pub find_many: AtomicUsize,
    pub find_all: AtomicUsize,
    pub create: AtomicUsize,
    pub upsert: AtomicUsize,
    pub update_many: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        [
            &self.find,
            &self.find_many,
            &self.find_all,
            &self.create,
            &self.upsert,
            &self.update_many,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    pub fn reads(&self) -> usize {
        self.find.load(Ordering::SeqCst)
            + self.find_many.load(Ordering::SeqCst)
            + self.find_all.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.create.load(Ordering::SeqCst)
            + self.upsert.load(Ordering::SeqCst)
            + self.update_many.load(Ordering::SeqCst)
    }
}

/// A [`MemoryStore`] that counts calls and can delay writes.
#[derive(Clone, Default)]
pub struct InstrumentedStore {
    pub inner: MemoryStore,
    pub counts: Arc<CallCounts>,
    pub write_delay: Option<Duration>,
}

#[allow(dead_code)]
impl InstrumentedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    async fn delay(&self) {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ConfigStore for InstrumentedStore {
    async fn find(&self, id: &str) -> Result<Option<ConfigRecord>, StoreError> {
        self.counts.find.fetch_add(1, Ordering::SeqCst);
        self.inner.find(id).await
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<ConfigRecord>, StoreError> {
        self.counts.find_many.fetch_add(1, Ordering::SeqCst);
        self.inner.find_many(ids).await
    }

    async fn find_all(&self, filter: RecordFilter) -> Result<Vec<ConfigRecord>, StoreError> {
        self.counts.find_all.fetch_add(1, Ordering::SeqCst);
        self.inner.find_all(filter).await
    }

    async fn create(&self, record: ConfigRecord) -> Result<ConfigRecord, StoreError> {
        self.counts.create.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.inner.create(record).await
    }

    async fn upsert(&self, id: &str, create: ConfigRecord, update: RecordPatch) -> Result<ConfigRecord, StoreError> {
        self.counts.upsert.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.inner.upsert(id, create, update).await
    }

    async fn update_many(&self, filter: RecordFilter, patch: RecordPatch) -> Result<usize, StoreError> {
        self.counts.update_many.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.inner.update_many(filter, patch).await
    }
}

/// Registry declaring `auth/password.min` and `auth/password.max` with the given defaults.
#[allow(dead_code)]
pub fn password_registry(min: i64, max: Option<i64>) -> SchemaRegistry {
    let mut password = vec![("min", ConfigNode::leaf("The minimum length of user password", min))];
    if let Some(max) = max {
        password.push(("max", ConfigNode::leaf("The maximum length of user password", max)));
    }

    let mut builder = SchemaRegistry::builder();
    builder
        .register(
            "auth",
            BTreeMap::from([("password".to_string(), ConfigNode::branch(password))]),
        )
        .unwrap();
    builder
        .register(
            "flags",
            BTreeMap::from([("earlyAccessControl".to_string(), ConfigNode::leaf("Early access", false))]),
        )
        .unwrap();
    builder.build()
}
