//! Persisted setting records, filters and patches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::ConfigDescriptor;

/// Durable state of one runtime setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    pub id: String,
    pub module: String,
    pub key: String,
    pub value: Value,
    pub description: String,
    /// `None` while the record is active.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ConfigRecord {
    /// A fresh active record holding the descriptor's default.
    pub fn from_descriptor(descriptor: &ConfigDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            module: descriptor.module.clone(),
            key: descriptor.key.clone(),
            value: descriptor.default.clone(),
            description: descriptor.description.clone(),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Apply a patch in place.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(module) = &patch.module {
            self.module = module.clone();
        }
        if let Some(key) = &patch.key {
            self.key = key.clone();
        }
        if let Some(value) = &patch.value {
            self.value = value.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(deleted_at) = patch.deleted_at {
            self.deleted_at = deleted_at;
        }
    }
}

/// Partial update of a record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub module: Option<String>,
    pub key: Option<String>,
    pub value: Option<Value>,
    pub description: Option<String>,
    /// `Some(None)` restores, `Some(Some(t))` soft-deletes.
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

impl RecordPatch {
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn soft_delete(at: DateTime<Utc>) -> Self {
        Self {
            deleted_at: Some(Some(at)),
            ..Self::default()
        }
    }

    /// Reset every field to the descriptor and clear the deletion marker.
    pub fn restore(descriptor: &ConfigDescriptor) -> Self {
        Self {
            module: Some(descriptor.module.clone()),
            key: Some(descriptor.key.clone()),
            value: Some(descriptor.default.clone()),
            description: Some(descriptor.description.clone()),
            deleted_at: Some(None),
        }
    }

    pub fn and_restore(mut self) -> Self {
        self.deleted_at = Some(None);
        self
    }
}

/// Selection criteria for batch reads and updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub ids: Option<Vec<String>>,
    pub module: Option<String>,
    pub active_only: bool,
}

impl RecordFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn matches(&self, record: &ConfigRecord) -> bool {
        if self.active_only && !record.is_active() {
            return false;
        }
        if let Some(module) = &self.module {
            if &record.module != module {
                return false;
            }
        }
        match &self.ids {
            Some(ids) => ids.iter().any(|id| id == &record.id),
            None => true,
        }
    }
}
