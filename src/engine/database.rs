use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use anyhow::Result;
use log::{debug, error, info};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::engine::catalog::{Catalog, Snapshot};
use crate::engine::records::{Record, RecordKind};

/// Local key/value blob store. One JSON blob per catalog.
pub struct Database {
    pub pool: Pool<Sqlite>,
    last_error: Mutex<Option<String>>,
}

impl Database {
    pub async fn new(db_path: &str) -> Result<Self> {
        // Create file if not exists
        if !Path::new(db_path).exists() {
            fs::File::create(db_path).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite://{}", db_path))
            .await?;

        let db = Self { pool, last_error: Mutex::new(None) };
        db.migrate().await?;
        Ok(db)
    }

    /// Private database that lives as long as the pool's single connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool, last_error: Mutex::new(None) };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>("SELECT key FROM kv_store ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    /// Stored catalog for `kind`, or `None` when it was never written.
    pub async fn load_catalog<T: Record>(&self, kind: RecordKind) -> Result<Option<Catalog<T>>> {
        match self.get(kind.storage_key()).await? {
            Some(blob) => Ok(Some(Catalog::from_blob(kind, &blob)?)),
            None => Ok(None),
        }
    }

    pub async fn save_catalog<T: Record>(&self, catalog: &Catalog<T>) -> Result<()> {
        self.set(catalog.kind().storage_key(), &catalog.to_blob()?).await
    }

    /// Message of the most recent failed write, if the last write failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) {
        match self.set(snapshot.key, &snapshot.blob).await {
            Ok(()) => {
                debug!("Saved {} ({} bytes)", snapshot.key, snapshot.blob.len());
                *self.last_error.lock() = None;
            }
            Err(e) => {
                // The in-memory catalog keeps the change; it is lost on restart.
                error!("Failed to save {}: {}", snapshot.key, e);
                *self.last_error.lock() = Some(format!("{}: {}", snapshot.key, e));
            }
        }
    }

    /// Writes catalog snapshots as they arrive until every hook is dropped.
    pub fn spawn_writer(self: Arc<Self>, mut rx: UnboundedReceiver<Snapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Persistence writer started");
            while let Some(snapshot) = rx.recv().await {
                self.write_snapshot(&snapshot).await;
            }
            info!("Persistence writer stopped");
        })
    }
}
