//! Store backed by a SQLite database shared by every replica on the host.
//!
//! Each operation is a single statement, so concurrent processes never see
//! a half-applied write. `create` and `upsert` rely on `ON CONFLICT(id)`.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::store::{ConfigRecord, ConfigStore, RecordFilter, RecordPatch, StoreError};

const COLUMNS: &str = "id, module, setting_key, value, description, deleted_at";

/// Open (creating if needed) the database at `path`.
pub async fn open_pool(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::info!(path = %path.display(), "Opened runtime config database");
    Ok(pool)
}

/// Durable store for deployments where replicas share a host or volume.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap `pool`, creating the records table if it is missing.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runtime_configs (
                id          TEXT PRIMARY KEY NOT NULL,
                module      TEXT NOT NULL,
                setting_key TEXT NOT NULL,
                value       TEXT NOT NULL,
                description TEXT NOT NULL,
                deleted_at  TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Open the database at `path` and wrap it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new(open_pool(path.as_ref()).await?).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode(row: &SqliteRow) -> Result<ConfigRecord, StoreError> {
    let value: String = row.try_get("value")?;
    Ok(ConfigRecord {
        id: row.try_get("id")?,
        module: row.try_get("module")?,
        key: row.try_get("setting_key")?,
        value: serde_json::from_str(&value)?,
        description: row.try_get("description")?,
        deleted_at: row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")?,
    })
}

/// Append `AND ...` clauses for `filter`. Returns false when nothing can match.
fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &RecordFilter) -> bool {
    query.push(" WHERE 1 = 1");
    if filter.active_only {
        query.push(" AND deleted_at IS NULL");
    }
    if let Some(module) = &filter.module {
        query.push(" AND module = ").push_bind(module.clone());
    }
    if let Some(ids) = &filter.ids {
        if ids.is_empty() {
            return false;
        }
        query.push(" AND id IN (");
        let mut list = query.separated(", ");
        for id in ids {
            list.push_bind(id.clone());
        }
        list.push_unseparated(")");
    }
    true
}

fn encode_value(value: &Option<serde_json::Value>) -> Result<Option<String>, StoreError> {
    value.as_ref().map(serde_json::to_string).transpose().map_err(StoreError::from)
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn find(&self, id: &str) -> Result<Option<ConfigRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM runtime_configs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }

    async fn find_all(&self, filter: RecordFilter) -> Result<Vec<ConfigRecord>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM runtime_configs"));
        if !push_filter(&mut query, &filter) {
            return Ok(Vec::new());
        }
        query.push(" ORDER BY id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode).collect()
    }

    async fn create(&self, record: ConfigRecord) -> Result<ConfigRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO runtime_configs (id, module, setting_key, value, description, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.module)
        .bind(&record.key)
        .bind(serde_json::to_string(&record.value)?)
        .bind(&record.description)
        .bind(record.deleted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(record.id));
        }
        Ok(record)
    }

    async fn upsert(
        &self,
        id: &str,
        create: ConfigRecord,
        update: RecordPatch,
    ) -> Result<ConfigRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO runtime_configs (id, module, setting_key, value, description, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                module      = COALESCE(?, module),
                setting_key = COALESCE(?, setting_key),
                value       = COALESCE(?, value),
                description = COALESCE(?, description),
                deleted_at  = CASE WHEN ? THEN ? ELSE deleted_at END
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&create.module)
        .bind(&create.key)
        .bind(serde_json::to_string(&create.value)?)
        .bind(&create.description)
        .bind(create.deleted_at)
        .bind(update.module)
        .bind(update.key)
        .bind(encode_value(&update.value)?)
        .bind(update.description)
        .bind(update.deleted_at.is_some())
        .bind(update.deleted_at.flatten())
        .fetch_one(&self.pool)
        .await?;

        decode(&row)
    }

    async fn update_many(&self, filter: RecordFilter, patch: RecordPatch) -> Result<usize, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE runtime_configs SET module = COALESCE(");
        query.push_bind(patch.module);
        query.push(", module), setting_key = COALESCE(").push_bind(patch.key);
        query.push(", setting_key), value = COALESCE(").push_bind(encode_value(&patch.value)?);
        query.push(", value), description = COALESCE(").push_bind(patch.description);
        query.push(", description), deleted_at = CASE WHEN ").push_bind(patch.deleted_at.is_some());
        query.push(" THEN ").push_bind(patch.deleted_at.flatten());
        query.push(" ELSE deleted_at END");
        if !push_filter(&mut query, &filter) {
            return Ok(0);
        }

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConfigDescriptor;
    use serde_json::json;

    fn record(key: &str, default: i64) -> ConfigRecord {
        ConfigRecord::from_descriptor(&ConfigDescriptor::new("auth", key, key, json!(default)))
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");

        let store = SqliteStore::open(&path).await.unwrap();
        store.create(record("password.min", 8)).await.unwrap();
        store
            .upsert("auth/password.min", record("password.min", 8), RecordPatch::value(json!(12)))
            .await
            .unwrap();
        store
            .update_many(RecordFilter::ids(["auth/password.min"]), RecordPatch::soft_delete(Utc::now()))
            .await
            .unwrap();
        store.pool().close().await;

        let reopened = SqliteStore::open(&path).await.unwrap();
        let loaded = reopened.find("auth/password.min").await.unwrap().unwrap();
        assert_eq!(loaded.value, json!(12));
        assert!(!loaded.is_active());
        assert!(reopened.find_all(RecordFilter::active()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replicas_on_one_database_keep_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");

        let a = SqliteStore::open(&path).await.unwrap();
        let b = SqliteStore::open(&path).await.unwrap();
        a.create(record("password.min", 8)).await.unwrap();
        b.create(record("password.max", 32)).await.unwrap();

        // The second replica sees the first one's record as a conflict.
        assert!(matches!(
            b.create(record("password.min", 10)).await,
            Err(StoreError::Conflict(id)) if id == "auth/password.min"
        ));

        a.pool().close().await;
        b.pool().close().await;
        let reopened = SqliteStore::open(&path).await.unwrap();
        let ids: Vec<String> = reopened
            .find_all(RecordFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["auth/password.max", "auth/password.min"]);
    }

    #[tokio::test]
    async fn test_upsert_restores_soft_deleted_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("settings.db")).await.unwrap();

        let created = store
            .upsert("auth/password.max", record("password.max", 32), RecordPatch::value(json!(0)))
            .await
            .unwrap();
        assert_eq!(created.value, json!(32));

        store
            .update_many(RecordFilter::ids(["auth/password.max"]), RecordPatch::soft_delete(Utc::now()))
            .await
            .unwrap();

        let descriptor = ConfigDescriptor::new("auth", "password.max", "new max", json!(48));
        let restored = store
            .upsert("auth/password.max", ConfigRecord::from_descriptor(&descriptor), RecordPatch::restore(&descriptor))
            .await
            .unwrap();
        assert!(restored.is_active());
        assert_eq!(restored.value, json!(48));
        assert_eq!(restored.description, "new max");
    }

    #[tokio::test]
    async fn test_filters_by_module_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("settings.db")).await.unwrap();
        store.create(record("password.min", 8)).await.unwrap();
        store.create(record("password.max", 32)).await.unwrap();
        store
            .create(ConfigRecord::from_descriptor(&ConfigDescriptor::new("flags", "beta", "b", json!(false))))
            .await
            .unwrap();

        let auth = store.find_all(RecordFilter::active().module("auth")).await.unwrap();
        assert_eq!(auth.len(), 2);

        let many = store
            .find_many(&["auth/password.min".to_string(), "flags/beta".to_string()])
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].value, json!(false));

        assert!(store.find_all(RecordFilter::ids(Vec::<String>::new())).await.unwrap().is_empty());
        assert_eq!(
            store
                .update_many(RecordFilter::ids(Vec::<String>::new()), RecordPatch::soft_delete(Utc::now()))
                .await
                .unwrap(),
            0
        );
    }
}
