use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::message::Message;
use crate::core::persona::PersonaId;
use crate::core::wire;

/// A conversation thread between one user and one persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(alias = "session_id", deserialize_with = "wire::id_string")]
    pub id: String,
    #[serde(deserialize_with = "wire::id_string")]
    pub user_id: String,
    pub persona_id: PersonaId,
    #[serde(default, alias = "session_name")]
    pub name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(with = "wire::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "wire::timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Session {
    /// Name to show in listings, falling back to the persona's display name.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.persona_id.info().display_name.to_string(),
        }
    }
}

/// Session record with its transcript embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    pub persona_id: PersonaId,
    #[serde(rename = "session_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// What the local store mirrors about the most recent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSession {
    pub session_id: String,
    pub persona_id: PersonaId,
    pub timestamp: DateTime<Utc>,
}

impl LastSession {
    pub fn new(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            persona_id: session.persona_id,
            timestamp: Utc::now(),
        }
    }
}

/// Star rating left on a finished conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRating {
    pub session_id: String,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
