use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "message_id", deserialize_with = "wire::id_string")]
    pub id: String,
    #[serde(deserialize_with = "wire::id_string")]
    pub session_id: String,
    #[serde(alias = "sender_type")]
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "wire::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Result of one chat round trip: the stored user message and the reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub user_message: Message,
    pub assistant_message: Message,
    /// Set when the server changed session metadata (name, activity).
    #[serde(default)]
    pub session_updated: bool,
}
