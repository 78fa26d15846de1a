use async_trait::async_trait;
use std::sync::Mutex;

use crate::core::error::StorageError;
use crate::core::persistence::{SessionPersistence, TokenStore};
use crate::core::session::LastSession;

/// Process-lifetime store, for tests and `--ephemeral` runs.
#[derive(Default)]
pub struct MemoryStore {
    last_session: Mutex<Option<LastSession>>,
    token: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            last_session: Mutex::new(None),
            token: Mutex::new(Some(token.into())),
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Database("memory store lock poisoned".into())
}

#[async_trait]
impl SessionPersistence for MemoryStore {
    async fn save_last_session(&self, last: &LastSession) -> Result<(), StorageError> {
        *self.last_session.lock().map_err(poisoned)? = Some(last.clone());
        Ok(())
    }

    async fn load_last_session(&self) -> Result<Option<LastSession>, StorageError> {
        Ok(self.last_session.lock().map_err(poisoned)?.clone())
    }

    async fn clear_last_session(&self) -> Result<(), StorageError> {
        *self.last_session.lock().map_err(poisoned)? = None;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.token.lock().map_err(poisoned)?.clone())
    }

    async fn set_token(&self, token: &str) -> Result<(), StorageError> {
        *self.token.lock().map_err(poisoned)? = Some(token.to_string());
        Ok(())
    }

    async fn clear_token(&self) -> Result<(), StorageError> {
        *self.token.lock().map_err(poisoned)? = None;
        Ok(())
    }
}
