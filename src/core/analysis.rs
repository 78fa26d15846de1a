use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::core::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl AnalysisStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Returned by the upload call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTicket {
    #[serde(deserialize_with = "wire::id_string")]
    pub test_id: String,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, alias = "personality_type")]
    pub predicted_category: Option<String>,
    /// Category to probability. Values may be fractions or percentages.
    #[serde(default)]
    pub probabilities: HashMap<String, f64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatusReport {
    #[serde(deserialize_with = "wire::id_string")]
    pub test_id: String,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub current_step: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<AnalysisResult>,
}

impl AnalysisStatusReport {
    /// Synthetic report used when polling stops on cancellation.
    pub fn cancelled(test_id: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            status: AnalysisStatus::Cancelled,
            current_step: None,
            message: Some("Analysis polling was cancelled".into()),
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A drawing queued for upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub note: Option<String>,
}

impl ImageUpload {
    pub fn mime_type(&self) -> &'static str {
        match extension(&self.file_name).as_deref() {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

pub(crate) fn extension(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
