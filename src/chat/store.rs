use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::api::SessionApi;
use crate::core::error::ApiError;
use crate::core::message::Message;
use crate::core::persistence::SessionPersistence;
use crate::core::persona::PersonaId;
use crate::core::session::{CreateSessionRequest, LastSession, Session, SessionRating};

const MAX_RATING_COMMENT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Creating,
    Ready,
    Error,
}

/// Whether a store operation changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
}

/// Non-fatal degradation from a best-effort call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    GreetingUnavailable(String),
    HistoryUnavailable(String),
    MetadataRefreshFailed(String),
    PersistenceFailed(String),
}

/// Render-ready view of the chat store.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub phase: SessionPhase,
    pub session: Option<Session>,
    pub messages: Vec<Message>,
    pub greeting: Option<String>,
    pub last_error: Option<ApiError>,
    pub warnings: Vec<Warning>,
    pub sending: bool,
    pub loading: bool,
}

#[derive(Default)]
struct Inner {
    view: ChatState,
    /// Bumped on every hard reset; results from older epochs are dropped.
    epoch: u64,
}

impl Inner {
    fn holds(&self, epoch: u64, session_id: &str) -> bool {
        self.epoch == epoch
            && self
                .view
                .session
                .as_ref()
                .is_some_and(|s| s.id == session_id)
    }
}

/// Single source of truth for the active chat session and its transcript.
///
/// The lock is only ever held between suspension points, so the in-flight
/// checks and the flags they guard are updated atomically.
pub struct ChatSessionStore {
    api: Arc<dyn SessionApi>,
    persistence: Arc<dyn SessionPersistence>,
    inner: Mutex<Inner>,
}

impl ChatSessionStore {
    pub fn new(api: Arc<dyn SessionApi>, persistence: Arc<dyn SessionPersistence>) -> Self {
        Self {
            api,
            persistence,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ChatState {
        self.lock().view.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().view.phase
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().view.session.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().view.messages.clone()
    }

    pub fn last_error(&self) -> Option<ApiError> {
        self.lock().view.last_error.clone()
    }

    pub fn clear_error(&self) {
        self.lock().view.last_error = None;
    }

    fn fail(&self, err: &ApiError) {
        self.lock().view.last_error = Some(err.clone());
    }

    fn warn(&self, epoch: u64, warning: Warning) {
        let mut inner = self.lock();
        if inner.epoch == epoch {
            inner.view.warnings.push(warning);
        }
    }

    /// Create a remote session unless one exists or is being created.
    pub async fn create_session(
        &self,
        owner_id: &str,
        persona_id: PersonaId,
        name: Option<String>,
    ) -> Result<Outcome, ApiError> {
        let epoch = {
            let mut inner = self.lock();
            if inner.view.session.is_some() || inner.view.phase == SessionPhase::Creating {
                tracing::debug!(%persona_id, "create skipped: session present or in flight");
                return Ok(Outcome::Skipped);
            }
            inner.view.phase = SessionPhase::Creating;
            inner.view.last_error = None;
            inner.epoch
        };

        let req = CreateSessionRequest {
            user_id: owner_id.to_string(),
            persona_id,
            name: name.filter(|n| !n.trim().is_empty()),
        };

        let session = match self.api.create_session(req).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(%persona_id, error = %e, "session creation failed");
                let mut inner = self.lock();
                if inner.epoch == epoch {
                    inner.view.phase = SessionPhase::Error;
                    inner.view.last_error = Some(e.clone());
                }
                return Err(e);
            }
        };

        {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                tracing::debug!(session_id = %session.id, "reset during creation; dropping");
                return Ok(Outcome::Skipped);
            }
            inner.view.session = Some(session.clone());
            inner.view.messages.clear();
            inner.view.greeting = None;
            inner.view.warnings.clear();
            inner.view.phase = SessionPhase::Ready;
        }
        tracing::info!(session_id = %session.id, %persona_id, "chat session created");

        self.mirror(epoch, &session).await;
        self.hydrate(epoch, &session.id).await;
        Ok(Outcome::Applied)
    }

    /// Greeting and existing history; neither failure affects the session.
    async fn hydrate(&self, epoch: u64, session_id: &str) {
        match self.api.fetch_greeting(session_id).await {
            Ok(greeting) => {
                let mut inner = self.lock();
                if inner.holds(epoch, session_id) {
                    inner.view.greeting = Some(greeting);
                }
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "greeting unavailable");
                self.warn(epoch, Warning::GreetingUnavailable(e.message));
            }
        }

        match self.api.list_messages(session_id).await {
            Ok(history) => {
                let mut inner = self.lock();
                if inner.holds(epoch, session_id) && inner.view.messages.is_empty() {
                    inner.view.messages = history;
                }
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "message history unavailable");
                self.warn(epoch, Warning::HistoryUnavailable(e.message));
            }
        }
    }

    async fn mirror(&self, epoch: u64, session: &Session) {
        if let Err(e) = self
            .persistence
            .save_last_session(&LastSession::new(session))
            .await
        {
            tracing::warn!(session_id = %session.id, error = %e, "failed to mirror last session");
            self.warn(epoch, Warning::PersistenceFailed(e.to_string()));
        }
    }

    /// Replace session and transcript with the server's copy.
    pub async fn load_session(&self, session_id: &str) -> Result<Outcome, ApiError> {
        let epoch = {
            let mut inner = self.lock();
            inner.view.loading = true;
            inner.epoch
        };

        let detail = match self.api.get_session(session_id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "session load failed");
                let mut inner = self.lock();
                inner.view.loading = false;
                inner.view.last_error = Some(e.clone());
                return Err(e);
            }
        };

        let session = detail.session.clone();
        {
            let mut inner = self.lock();
            inner.view.loading = false;
            if inner.epoch != epoch {
                return Ok(Outcome::Skipped);
            }
            let same_session = inner
                .view
                .session
                .as_ref()
                .is_some_and(|s| s.id == session.id);
            if !same_session {
                inner.view.greeting = None;
            }
            inner.view.session = Some(detail.session);
            inner.view.messages = detail.messages;
            inner.view.warnings.clear();
            inner.view.last_error = None;
            inner.view.phase = SessionPhase::Ready;
        }
        tracing::info!(session_id = %session.id, "chat session loaded");

        self.mirror(epoch, &session).await;
        Ok(Outcome::Applied)
    }

    /// Send one message; appends the echoed user message and the reply together.
    pub async fn send_message(&self, text: &str) -> Result<Outcome, ApiError> {
        let text = text.trim();
        let (epoch, session_id) = {
            let mut inner = self.lock();
            let Some(session_id) = inner.view.session.as_ref().map(|s| s.id.clone()) else {
                return Ok(Outcome::Skipped);
            };
            if text.is_empty() || inner.view.sending {
                return Ok(Outcome::Skipped);
            }
            inner.view.sending = true;
            inner.view.last_error = None;
            (inner.epoch, session_id)
        };

        let resp = match self.api.send_message(&session_id, text).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "send failed");
                let mut inner = self.lock();
                if inner.epoch == epoch {
                    inner.view.sending = false;
                    inner.view.last_error = Some(e.clone());
                }
                return Err(e);
            }
        };

        {
            let mut inner = self.lock();
            if inner.epoch == epoch {
                inner.view.sending = false;
            }
            if !inner.holds(epoch, &session_id) {
                tracing::debug!(%session_id, "session changed during send; dropping reply");
                return Ok(Outcome::Skipped);
            }
            inner.view.messages.push(resp.user_message);
            inner.view.messages.push(resp.assistant_message);
        }

        if resp.session_updated {
            self.refresh_metadata(epoch, &session_id).await;
        }
        Ok(Outcome::Applied)
    }

    /// Re-fetch the session record only; the transcript stays as appended.
    async fn refresh_metadata(&self, epoch: u64, session_id: &str) {
        match self.api.get_session(session_id).await {
            Ok(detail) => {
                let mut inner = self.lock();
                if inner.holds(epoch, session_id) {
                    inner.view.session = Some(detail.session);
                }
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "session metadata refresh failed");
                self.warn(epoch, Warning::MetadataRefreshFailed(e.message));
            }
        }
    }

    /// Delete remotely, then drop local state for that session either way.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        let result = self.api.delete_session(session_id).await;

        {
            let mut inner = self.lock();
            let is_current = inner
                .view
                .session
                .as_ref()
                .is_some_and(|s| s.id == session_id);
            if is_current {
                inner.epoch += 1;
                let last_error = inner.view.last_error.take();
                inner.view = ChatState {
                    last_error,
                    ..ChatState::default()
                };
            }
        }

        match self.persistence.load_last_session().await {
            Ok(Some(last)) if last.session_id == session_id => {
                if let Err(e) = self.persistence.clear_last_session().await {
                    tracing::warn!(%session_id, error = %e, "failed to clear last session mirror");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read last session mirror"),
        }

        if let Err(e) = result {
            tracing::warn!(%session_id, error = %e, "remote delete failed");
            self.fail(&e);
            return Err(e);
        }
        tracing::info!(%session_id, "chat session deleted");
        Ok(())
    }

    /// Abandon the session locally without touching the server.
    pub fn reset_session(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.view = ChatState::default();
    }

    /// Make sure a session with `persona_id` is active.
    ///
    /// Reuses the mirrored last session when it belongs to the same persona
    /// and is still active on the server; otherwise creates a new one.
    pub async fn ensure_session(
        &self,
        owner_id: &str,
        persona_id: PersonaId,
        name: Option<String>,
    ) -> Result<Outcome, ApiError> {
        {
            let inner = self.lock();
            if inner.view.phase == SessionPhase::Creating {
                return Ok(Outcome::Skipped);
            }
            if let Some(session) = &inner.view.session {
                if session.persona_id == persona_id {
                    return Ok(Outcome::Skipped);
                }
            }
        }
        if self.session().is_some() {
            tracing::debug!(%persona_id, "switching persona; abandoning current session");
            self.reset_session();
        }

        let last = match self.persistence.load_last_session().await {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!(error = %e, "could not read last session mirror");
                None
            }
        };

        if let Some(last) = last.filter(|l| l.persona_id == persona_id) {
            match self.load_session(&last.session_id).await {
                Ok(_) if self.session().is_some_and(|s| s.is_active) => {
                    return Ok(Outcome::Applied);
                }
                Ok(_) => {
                    tracing::debug!(session_id = %last.session_id, "mirrored session inactive");
                    self.reset_session();
                }
                Err(e) => {
                    tracing::debug!(
                        session_id = %last.session_id,
                        error = %e,
                        "mirrored session unusable"
                    );
                }
            }
        }

        self.create_session(owner_id, persona_id, name).await
    }

    /// Leave a one to five star rating on a session.
    pub async fn rate_session(
        &self,
        session_id: &str,
        stars: u8,
        comment: Option<String>,
    ) -> Result<(), ApiError> {
        let rating = match build_rating(session_id, stars, comment) {
            Ok(rating) => rating,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        self.api.rate_session(rating).await.map_err(|e| {
            tracing::warn!(%session_id, error = %e, "rating failed");
            self.fail(&e);
            e
        })
    }

    pub async fn list_sessions(&self, owner_id: &str) -> Result<Vec<Session>, ApiError> {
        self.api.list_sessions(owner_id).await.map_err(|e| {
            self.fail(&e);
            e
        })
    }
}

fn build_rating(
    session_id: &str,
    stars: u8,
    comment: Option<String>,
) -> Result<SessionRating, ApiError> {
    if !(1..=5).contains(&stars) {
        return Err(ApiError::validation("Rating must be between 1 and 5 stars."));
    }
    let comment = comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if comment
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_RATING_COMMENT_CHARS)
    {
        return Err(ApiError::validation(format!(
            "Comments can be at most {MAX_RATING_COMMENT_CHARS} characters."
        )));
    }
    Ok(SessionRating {
        session_id: session_id.to_string(),
        rating: stars,
        comment,
    })
}
