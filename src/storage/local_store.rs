use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::core::error::StorageError;
use crate::core::persistence::{SessionPersistence, TokenStore};
use crate::core::session::LastSession;

pub(crate) const LAST_SESSION_KEY: &str = "htp.last_session";
pub(crate) const AUTH_TOKEN_KEY: &str = "htp.auth_token";

/// String key/value table standing in for browser local storage.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM local_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(row.map(|r| r.0))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO local_store (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM local_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SessionPersistence for LocalStore {
    async fn save_last_session(&self, last: &LastSession) -> Result<(), StorageError> {
        let json =
            serde_json::to_string(last).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set(LAST_SESSION_KEY, &json).await
    }

    async fn load_last_session(&self) -> Result<Option<LastSession>, StorageError> {
        self.get(LAST_SESSION_KEY)
            .await?
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn clear_last_session(&self) -> Result<(), StorageError> {
        self.remove(LAST_SESSION_KEY).await
    }
}

#[async_trait]
impl TokenStore for LocalStore {
    async fn token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.get(AUTH_TOKEN_KEY).await?.filter(|t| !t.is_empty()))
    }

    async fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.set(AUTH_TOKEN_KEY, token).await
    }

    async fn clear_token(&self) -> Result<(), StorageError> {
        self.remove(AUTH_TOKEN_KEY).await
    }
}
