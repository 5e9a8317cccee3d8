//! Difference between declared ids and persisted active ids.

use std::collections::BTreeSet;

use serde::Serialize;

/// What reconciliation has to change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    /// Declared but without an active record.
    pub new_ids: Vec<String>,
    /// Active but no longer declared.
    pub stale_ids: Vec<String>,
}

impl SchemaDiff {
    pub fn compute<'a, D, A>(declared: D, active: A) -> Self
    where
        D: IntoIterator<Item = &'a str>,
        A: IntoIterator<Item = &'a str>,
    {
        let declared: BTreeSet<&str> = declared.into_iter().collect();
        let active: BTreeSet<&str> = active.into_iter().collect();

        Self {
            new_ids: declared.difference(&active).map(|id| id.to_string()).collect(),
            stale_ids: active.difference(&declared).map(|id| id.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_ids.is_empty() && self.stale_ids.is_empty()
    }
}
