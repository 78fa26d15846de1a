use async_trait::async_trait;

use crate::core::error::StorageError;
use crate::core::session::LastSession;

/// Mirror of the most recent chat session. Last write wins.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn save_last_session(&self, last: &LastSession) -> Result<(), StorageError>;

    async fn load_last_session(&self) -> Result<Option<LastSession>, StorageError>;

    async fn clear_last_session(&self) -> Result<(), StorageError>;
}

/// Holder of the bearer token attached to every request.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn token(&self) -> Result<Option<String>, StorageError>;

    async fn set_token(&self, token: &str) -> Result<(), StorageError>;

    async fn clear_token(&self) -> Result<(), StorageError>;
}
