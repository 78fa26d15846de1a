use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::config::AppConfig;
use crate::core::error::StorageError;
use crate::storage::LocalStore;

const DB_FILE_NAME: &str = "htp-client.db";

/// SQLite file backing the local store, one per data directory.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    pub async fn open(config: &AppConfig) -> Result<Self, StorageError> {
        let dir = config.data_path();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StorageError::Database(format!("{}: {e}", dir.display())))?;

        let path = dir.join(DB_FILE_NAME);
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // The CLI and a running REPL may share the file.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        tracing::debug!(path = %path.display(), "opened local store");
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Apply pending files from `migrations/`; already applied ones are skipped.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))
    }

    pub fn local_store(&self) -> LocalStore {
        LocalStore::new(self.pool.clone())
    }
}
