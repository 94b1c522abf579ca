use crate::application::ports::KeyValueStore;
use crate::shared::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use tracing::info;

/// SQLite-backed record store. One upsert per write keeps writes inside a
/// few milliseconds; durability is best effort and failures are the
/// caller's to log.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Connect, creating the database directory and running migrations.
    pub async fn initialize(database_url: &str) -> Result<Self, StoreError> {
        if let Some(file_path) = database_url
            .strip_prefix("sqlite://")
            .map(|rest| rest.split('?').next().unwrap_or(rest))
        {
            if file_path != ":memory:" {
                if let Some(parent) = Path::new(file_path).parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|err| StoreError::Database(err.to_string()))?;
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        info!("Offline store connected: {}", database_url);

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Database(err.to_string()))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM offline_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get("value"))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO offline_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM offline_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn set_get_delete_roundtrip() {
        let store = setup_store().await;

        store.set("queue", "[]").await.unwrap();
        assert_eq!(store.get("queue").await.unwrap(), Some("[]".to_string()));

        store.delete("queue").await.unwrap();
        assert_eq!(store.get("queue").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let store = setup_store().await;

        store.set("stats", "{\"pending\":1}").await.unwrap();
        store.set("stats", "{\"pending\":2}").await.unwrap();

        assert_eq!(
            store.get("stats").await.unwrap(),
            Some("{\"pending\":2}".to_string())
        );
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let store = setup_store().await;
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn initialize_creates_database_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("store.db");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let store = SqliteStore::initialize(&db_url).await.unwrap();
        store.set("probe", "1").await.unwrap();

        assert!(db_path.exists());
    }
}
