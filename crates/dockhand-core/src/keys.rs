//! API key store
//!
//! A simple keyed-record store over SQLite used to authorize requests.
//! Keys are opaque strings; records carry an optional note for bookkeeping.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, Result};

/// One stored API key record
#[derive(Debug, Clone, Serialize)]
pub struct ApiKey {
    /// Record id (uuid)
    pub id: String,
    /// The key value itself
    pub key: String,
    /// Free-form note
    pub note: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed key store
#[derive(Clone)]
pub struct ApiKeyStore {
    pool: Pool<Sqlite>,
}

impl ApiKeyStore {
    /// Open (or create) the store at `path`.
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store, for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id TEXT PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                note TEXT,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_api_keys_key ON api_keys(key)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// List all stored keys.
    pub async fn list(&self) -> Result<Vec<ApiKey>> {
        let rows = sqlx::query(
            "SELECT id, key, note, created_at FROM api_keys ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_key).collect())
    }

    /// Add a key. When `key` is `None` a fresh uuid hex value is generated.
    ///
    /// Fails if the key value already exists.
    pub async fn add(&self, key: Option<String>, note: Option<String>) -> Result<ApiKey> {
        let key_value = key.unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        if self.verify(&key_value).await? {
            return Err(Error::Store("key already exists".to_string()));
        }

        let record = ApiKey {
            id: Uuid::new_v4().to_string(),
            key: key_value,
            note,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO api_keys (id, key, note, created_at) VALUES (?, ?, ?, ?)")
            .bind(&record.id)
            .bind(&record.key)
            .bind(&record.note)
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;

        Ok(record)
    }

    /// Whether `key` exists in the store.
    pub async fn verify(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM api_keys WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Delete a key by its value. Returns whether a record was removed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_key(row: &sqlx::sqlite::SqliteRow) -> ApiKey {
    ApiKey {
        id: row.get("id"),
        key: row.get("key"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_verify_delete_cycle() {
        let store = ApiKeyStore::in_memory().await.unwrap();

        let record = store
            .add(Some("secret".to_string()), Some("phone".to_string()))
            .await
            .unwrap();
        assert_eq!(record.key, "secret");
        assert_eq!(record.note.as_deref(), Some("phone"));

        assert!(store.verify("secret").await.unwrap());
        assert!(!store.verify("other").await.unwrap());

        assert!(store.delete("secret").await.unwrap());
        assert!(!store.verify("secret").await.unwrap());
        assert!(!store.delete("secret").await.unwrap());
    }

    #[tokio::test]
    async fn generated_keys_are_unique() {
        let store = ApiKeyStore::in_memory().await.unwrap();
        let a = store.add(None, None).await.unwrap();
        let b = store.add(None, None).await.unwrap();
        assert_ne!(a.key, b.key);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_keys_are_rejected() {
        let store = ApiKeyStore::in_memory().await.unwrap();
        store.add(Some("dup".to_string()), None).await.unwrap();
        assert!(store.add(Some("dup".to_string()), None).await.is_err());
    }
}
