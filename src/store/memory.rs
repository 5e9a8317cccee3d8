//! In-memory store backed by a concurrent map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::{ConfigRecord, ConfigStore, RecordFilter, RecordPatch, StoreError};

/// A thread-safe, process-local record store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, ConfigRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_records<I: IntoIterator<Item = ConfigRecord>>(records: I) -> Self {
        let store = Self::new();
        for record in records {
            store.inner.insert(record.id.clone(), record);
        }
        store
    }

    /// Copy of every record, keyed by id.
    pub fn snapshot(&self) -> HashMap<String, ConfigRecord> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn find(&self, id: &str) -> Result<Option<ConfigRecord>, StoreError> {
        Ok(self.inner.get(id).map(|r| r.value().clone()))
    }

    async fn find_all(&self, filter: RecordFilter) -> Result<Vec<ConfigRecord>, StoreError> {
        let mut records: Vec<ConfigRecord> = self
            .inner
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn create(&self, record: ConfigRecord) -> Result<ConfigRecord, StoreError> {
        match self.inner.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn upsert(
        &self,
        id: &str,
        create: ConfigRecord,
        update: RecordPatch,
    ) -> Result<ConfigRecord, StoreError> {
        match self.inner.entry(id.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.get_mut().apply(&update);
                Ok(slot.get().clone())
            }
            Entry::Vacant(slot) => {
                slot.insert(create.clone());
                Ok(create)
            }
        }
    }

    async fn update_many(&self, filter: RecordFilter, patch: RecordPatch) -> Result<usize, StoreError> {
        let mut changed = 0;
        for mut r in self.inner.iter_mut() {
            if filter.matches(r.value()) {
                r.value_mut().apply(&patch);
                changed += 1;
            }
        }
        Ok(changed)
    }
}
