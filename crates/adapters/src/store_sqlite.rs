//! SQLite local store implementation

use async_trait::async_trait;
use connectum_domain::{LocalStore, StoreError};
use serde_json::Value;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

/// SQLite-backed durable local store
///
/// Every collection is an ordered list of JSON documents.
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Open (or create) the database at `db_path`
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS local_records (
                collection TEXT NOT NULL,
                position INTEGER NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, position)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT body FROM local_records WHERE collection = ? ORDER BY position",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(body,)| {
                serde_json::from_str(&body).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn write_all(&self, collection: &str, records: &[Value]) -> Result<(), StoreError> {
        let bodies = records
            .iter()
            .map(|r| serde_json::to_string(r).map_err(|e| StoreError::Serialization(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM local_records WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        for (position, body) in bodies.iter().enumerate() {
            sqlx::query("INSERT INTO local_records (collection, position, body) VALUES (?, ?, ?)")
                .bind(collection)
                .bind(position as i64)
                .bind(body)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(collection = %collection, count = records.len(), "Wrote local collection");
        Ok(())
    }

    async fn append(&self, collection: &str, record: Value) -> Result<(), StoreError> {
        let body =
            serde_json::to_string(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO local_records (collection, position, body)
            VALUES (
                ?1,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM local_records WHERE collection = ?1),
                ?2
            )
            "#,
        )
        .bind(collection)
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = SqliteLocalStore::in_memory().await.unwrap();
        assert!(store.read_all("local_questions").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_all_replaces_collection() {
        let store = SqliteLocalStore::in_memory().await.unwrap();

        store
            .write_all("local_questions", &[json!({"id": "a"}), json!({"id": "b"})])
            .await
            .unwrap();
        store
            .write_all("local_questions", &[json!({"id": "c"})])
            .await
            .unwrap();

        let records = store.read_all("local_questions").await.unwrap();
        assert_eq!(records, vec![json!({"id": "c"})]);
    }

    #[tokio::test]
    async fn test_append_keeps_order_per_collection() {
        let store = SqliteLocalStore::in_memory().await.unwrap();

        store.append("a", json!(1)).await.unwrap();
        store.append("b", json!("other")).await.unwrap();
        store.append("a", json!(2)).await.unwrap();

        assert_eq!(store.read_all("a").await.unwrap(), vec![json!(1), json!(2)]);
        assert_eq!(store.read_all("b").await.unwrap(), vec![json!("other")]);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("local.db");

        {
            let store = SqliteLocalStore::new(&path).await.unwrap();
            store
                .write_all("user_xp_alice", &[json!({"xp": 60})])
                .await
                .unwrap();
        }

        let reopened = SqliteLocalStore::new(&path).await.unwrap();
        assert_eq!(
            reopened.read_all("user_xp_alice").await.unwrap(),
            vec![json!({"xp": 60})]
        );
    }
}
