use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::api::ProfileApi;
use crate::core::error::ApiError;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

const MIN_NICKNAME_CHARS: usize = 2;
const MAX_NICKNAME_CHARS: usize = 20;

static NICKNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[가-힣A-Za-z0-9_]+$").expect("nickname regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NicknameStatus {
    #[default]
    Unknown,
    Checking,
    Available,
    Taken,
    Invalid(String),
    Failed(String),
}

impl NicknameStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Unknown | Self::Checking)
    }
}

/// Local nickname rules. Runs before any availability request.
pub fn validate_nickname(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if !(MIN_NICKNAME_CHARS..=MAX_NICKNAME_CHARS).contains(&len) {
        return Err(ApiError::validation(format!(
            "Nicknames must be {MIN_NICKNAME_CHARS} to {MAX_NICKNAME_CHARS} characters."
        )));
    }
    if !NICKNAME_PATTERN.is_match(name) {
        return Err(ApiError::validation(
            "Nicknames may only contain Korean, English letters, digits and underscores.",
        ));
    }
    Ok(())
}

#[derive(Default)]
struct CheckerState {
    /// Bumped on every keystroke or manual check; older results are dropped.
    generation: u64,
    input: String,
    status: NicknameStatus,
}

/// Debounced nickname availability checks.
pub struct NicknameChecker {
    api: Arc<dyn ProfileApi>,
    debounce: Duration,
    state: Arc<Mutex<CheckerState>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

fn lock_state(state: &Mutex<CheckerState>) -> MutexGuard<'_, CheckerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NicknameChecker {
    pub fn new(api: Arc<dyn ProfileApi>, debounce: Duration) -> Self {
        Self {
            api,
            debounce,
            state: Arc::new(Mutex::new(CheckerState::default())),
            pending: Mutex::new(None),
        }
    }

    pub fn status(&self) -> NicknameStatus {
        lock_state(&self.state).status.clone()
    }

    /// Status of `name`, or `Unknown` when the last result was for other input.
    pub fn status_for(&self, name: &str) -> NicknameStatus {
        let state = lock_state(&self.state);
        if state.input == name {
            state.status.clone()
        } else {
            NicknameStatus::Unknown
        }
    }

    /// Record a keystroke and schedule a check once input goes quiet.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_input(&self, name: &str) {
        let generation = self.begin(name);
        let api = self.api.clone();
        let state = self.state.clone();
        let debounce = self.debounce;
        let name = name.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            run_check(api, state, generation, name).await;
        });
        self.replace_pending(Some(handle));
    }

    /// Check immediately, skipping the debounce window.
    pub async fn check_now(&self, name: &str) -> NicknameStatus {
        let generation = self.begin(name);
        self.replace_pending(None);
        run_check(self.api.clone(), self.state.clone(), generation, name.to_string()).await
    }

    fn begin(&self, name: &str) -> u64 {
        let mut state = lock_state(&self.state);
        state.generation += 1;
        state.input = name.to_string();
        state.status = NicknameStatus::Unknown;
        state.generation
    }

    fn replace_pending(&self, next: Option<JoinHandle<()>>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = next;
    }
}

impl Drop for NicknameChecker {
    fn drop(&mut self) {
        self.replace_pending(None);
    }
}

async fn run_check(
    api: Arc<dyn ProfileApi>,
    state: Arc<Mutex<CheckerState>>,
    generation: u64,
    name: String,
) -> NicknameStatus {
    let publish = |status: NicknameStatus| {
        let mut state = lock_state(&state);
        if state.generation == generation {
            state.status = status.clone();
        }
        status
    };

    if let Err(e) = validate_nickname(&name) {
        return publish(NicknameStatus::Invalid(e.message));
    }
    publish(NicknameStatus::Checking);

    let status = match api.check_nickname(&name).await {
        Ok(true) => NicknameStatus::Available,
        Ok(false) => NicknameStatus::Taken,
        Err(e) => {
            tracing::warn!(nickname = %name, error = %e, "nickname check failed");
            NicknameStatus::Failed(e.message)
        }
    };
    tracing::debug!(nickname = %name, ?status, "nickname checked");
    publish(status)
}
