use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::wire;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(alias = "user_id", deserialize_with = "wire::id_string")]
    pub id: String,
    #[serde(alias = "nickname")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default, with = "wire::opt_timestamp")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub test_count: u32,
    #[serde(default)]
    pub chat_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(rename = "nickname", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NicknameAvailability {
    pub available: bool,
    #[serde(default)]
    pub message: Option<String>,
}
