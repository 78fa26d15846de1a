use async_trait::async_trait;

use crate::core::analysis::{AnalysisStatusReport, AnalysisTicket, ImageUpload};
use crate::core::error::ApiError;
use crate::core::message::{Message, SendMessageResponse};
use crate::core::profile::{ProfileUpdate, UserProfile};
use crate::core::session::{CreateSessionRequest, Session, SessionDetail, SessionRating};

#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn create_session(&self, req: CreateSessionRequest) -> Result<Session, ApiError>;

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, ApiError>;

    async fn get_session(&self, session_id: &str) -> Result<SessionDetail, ApiError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError>;

    async fn send_message(
        &self,
        session_id: &str,
        content: &str,
    ) -> Result<SendMessageResponse, ApiError>;

    /// Personalised opening line for a fresh session.
    async fn fetch_greeting(&self, session_id: &str) -> Result<String, ApiError>;

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, ApiError>;

    async fn rate_session(&self, rating: SessionRating) -> Result<(), ApiError>;
}

#[async_trait]
pub trait AnalysisApi: Send + Sync {
    async fn submit_analysis(&self, upload: ImageUpload) -> Result<AnalysisTicket, ApiError>;

    async fn analysis_status(&self, test_id: &str) -> Result<AnalysisStatusReport, ApiError>;
}

#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, ApiError>;

    /// `true` when nobody else holds the nickname.
    async fn check_nickname(&self, nickname: &str) -> Result<bool, ApiError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, ApiError>;
}
