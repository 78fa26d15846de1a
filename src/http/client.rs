use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::core::analysis::{AnalysisStatusReport, AnalysisTicket, ImageUpload};
use crate::core::api::{AnalysisApi, ProfileApi, SessionApi};
use crate::core::config::AppConfig;
use crate::core::error::{ApiError, GENERIC_ERROR_MESSAGE};
use crate::core::message::{Message, SendMessageRequest, SendMessageResponse};
use crate::core::persistence::TokenStore;
use crate::core::profile::{NicknameAvailability, ProfileUpdate, UserProfile};
use crate::core::session::{CreateSessionRequest, Session, SessionDetail, SessionRating};

const MAX_BODY_MESSAGE_CHARS: usize = 200;

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedIn,
    SignedOut,
}

/// Thin JSON-over-HTTP client for the HTP backend.
pub struct HttpApi {
    client: Client,
    base_url: String,
    api_prefix: String,
    tokens: Arc<dyn TokenStore>,
    auth_state: watch::Sender<AuthState>,
}

#[derive(Debug, Deserialize)]
struct GreetingResponse {
    greeting: String,
}

impl HttpApi {
    pub fn new(config: &AppConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::network(format!("Failed to build HTTP client: {e}")))?;

        let (auth_state, _) = watch::channel(AuthState::SignedIn);

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_prefix: config.api_prefix.clone(),
            tokens,
            auth_state,
        })
    }

    /// Flips to `SignedOut` when the server rejects the token.
    pub fn auth_state(&self) -> watch::Receiver<AuthState> {
        self.auth_state.subscribe()
    }

    pub fn url(&self, path: &str) -> String {
        resolve_url(&self.base_url, &self.api_prefix, path)
    }

    async fn bearer(&self) -> Result<String, ApiError> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| ApiError::auth(format!("Could not read the stored token: {e}")))?;
        match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => Ok(token),
            None => {
                self.auth_state.send_replace(AuthState::SignedOut);
                Err(ApiError::auth("You are not signed in."))
            }
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.bearer().await?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let url = self.url(path);
        tracing::debug!(%method, %url, %request_id, "api request");

        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("X-Request-Id", request_id))
    }

    async fn dispatch(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.send().await.map_err(|e| {
            let err = transport_error(&e);
            tracing::warn!(error = %e, "api transport failure");
            err
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let err = normalize_error(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), message = %err.message, "api error response");

        if status == StatusCode::UNAUTHORIZED {
            self.sign_out().await;
        }
        Err(err)
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.dispatch(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::network(format!("Unexpected response from server: {e}")))
    }

    async fn sign_out(&self) {
        if let Err(e) = self.tokens.clear_token().await {
            tracing::warn!(error = %e, "failed to clear token after 401");
        }
        self.auth_state.send_replace(AuthState::SignedOut);
    }
}

/// Join origin, prefix and path with exactly one slash between each.
pub fn resolve_url(base_url: &str, api_prefix: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let prefix = api_prefix.trim_matches('/');
    let path = path.trim_start_matches('/');
    if prefix.is_empty() {
        format!("{base}/{path}")
    } else {
        format!("{base}/{prefix}/{path}")
    }
}

/// Map a non-success response to the client error shape.
pub fn normalize_error(status: u16, body: &str) -> ApiError {
    let message = extract_server_message(body);
    if status == 401 {
        return ApiError::auth(message.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.into()));
    }
    ApiError::server(status, message.unwrap_or_else(|| GENERIC_ERROR_MESSAGE.into()))
}

/// Pull a human-readable message out of an error body.
pub fn extract_server_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["detail", "message", "error"] {
            if let Some(text) = json[field].as_str().filter(|s| !s.trim().is_empty()) {
                return Some(text.trim().to_string());
            }
        }
        // Validation failures come back as a list of {loc, msg}
        if let Some(text) = json["detail"]
            .as_array()
            .and_then(|items| items.first())
            .and_then(|item| item["msg"].as_str())
        {
            return Some(text.to_string());
        }
        return None;
    }

    if body.starts_with('<') {
        return None;
    }
    Some(body.chars().take(MAX_BODY_MESSAGE_CHARS).collect())
}

fn transport_error(e: &reqwest::Error) -> ApiError {
    let message = if e.is_timeout() {
        "The request timed out. Please try again.".to_string()
    } else if e.is_connect() {
        "Could not reach the server. Check your connection.".to_string()
    } else {
        let text = e.to_string();
        if text.is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            text
        }
    };
    ApiError::network(message)
}

#[async_trait]
impl SessionApi for HttpApi {
    async fn create_session(&self, req: CreateSessionRequest) -> Result<Session, ApiError> {
        let builder = self.request(Method::POST, "chat/sessions").await?.json(&req);
        self.json(builder).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, ApiError> {
        let path = format!("chat/users/{user_id}/sessions");
        let builder = self.request(Method::GET, &path).await?;
        self.json(builder).await
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionDetail, ApiError> {
        let path = format!("chat/sessions/{session_id}");
        let builder = self.request(Method::GET, &path).await?;
        self.json(builder).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        let path = format!("chat/sessions/{session_id}");
        let builder = self.request(Method::DELETE, &path).await?;
        self.dispatch(builder).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        session_id: &str,
        content: &str,
    ) -> Result<SendMessageResponse, ApiError> {
        let path = format!("chat/sessions/{session_id}/messages");
        let body = SendMessageRequest {
            content: content.to_string(),
        };
        let builder = self.request(Method::POST, &path).await?.json(&body);
        self.json(builder).await
    }

    async fn fetch_greeting(&self, session_id: &str) -> Result<String, ApiError> {
        let path = format!("chat/sessions/{session_id}/greeting");
        let builder = self.request(Method::GET, &path).await?;
        let resp: GreetingResponse = self.json(builder).await?;
        Ok(resp.greeting)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, ApiError> {
        let path = format!("chat/sessions/{session_id}/messages");
        let builder = self.request(Method::GET, &path).await?;
        self.json(builder).await
    }

    async fn rate_session(&self, rating: SessionRating) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, "ratings").await?.json(&rating);
        self.dispatch(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisApi for HttpApi {
    async fn submit_analysis(&self, upload: ImageUpload) -> Result<AnalysisTicket, ApiError> {
        let mime = upload.mime_type();
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(mime)
            .map_err(|e| ApiError::validation(format!("Unsupported image type: {e}")))?;

        let mut form = reqwest::multipart::Form::new().part("image", part);
        if let Some(note) = upload.note.filter(|n| !n.trim().is_empty()) {
            form = form.text("description", note);
        }

        let builder = self
            .request(Method::POST, "pipeline/analyze")
            .await?
            .multipart(form);
        self.json(builder).await
    }

    async fn analysis_status(&self, test_id: &str) -> Result<AnalysisStatusReport, ApiError> {
        let path = format!("pipeline/status/{test_id}");
        let builder = self.request(Method::GET, &path).await?;
        self.json(builder).await
    }
}

#[async_trait]
impl ProfileApi for HttpApi {
    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let path = format!("users/{user_id}/profile");
        let builder = self.request(Method::GET, &path).await?;
        self.json(builder).await
    }

    async fn check_nickname(&self, nickname: &str) -> Result<bool, ApiError> {
        let body = serde_json::json!({ "nickname": nickname });
        let builder = self
            .request(Method::POST, "users/nickname/check")
            .await?
            .json(&body);
        let resp: NicknameAvailability = self.json(builder).await?;
        Ok(resp.available)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, ApiError> {
        let path = format!("users/{user_id}/profile");
        let builder = self.request(Method::PUT, &path).await?.json(&update);
        self.json(builder).await
    }
}
