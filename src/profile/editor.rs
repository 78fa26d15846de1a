use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::chat::Outcome;
use crate::core::api::ProfileApi;
use crate::core::error::ApiError;
use crate::core::profile::{ProfileUpdate, UserProfile};
use crate::profile::nickname::{validate_nickname, NicknameChecker, NicknameStatus};

#[derive(Debug, Clone, Default)]
pub struct ProfileState {
    pub profile: Option<UserProfile>,
    pub loading: bool,
    pub saving: bool,
    /// Set after a confirmed save until `clear_success`.
    pub saved: bool,
    pub last_error: Option<ApiError>,
}

/// Profile edits applied locally first, then confirmed or rolled back.
pub struct ProfileEditor {
    api: Arc<dyn ProfileApi>,
    nickname: NicknameChecker,
    state: Mutex<ProfileState>,
}

impl ProfileEditor {
    pub fn new(api: Arc<dyn ProfileApi>, debounce: Duration) -> Self {
        Self {
            nickname: NicknameChecker::new(api.clone(), debounce),
            api,
            state: Mutex::new(ProfileState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProfileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ProfileState {
        self.lock().clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.lock().profile.clone()
    }

    pub fn nickname(&self) -> &NicknameChecker {
        &self.nickname
    }

    /// `true` when `name` matches the loaded profile, so there is nothing to save.
    pub fn is_current_name(&self, name: &str) -> bool {
        self.lock()
            .profile
            .as_ref()
            .is_some_and(|p| p.name == name.trim())
    }

    pub fn clear_success(&self) {
        self.lock().saved = false;
    }

    pub async fn load(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        {
            let mut state = self.lock();
            state.loading = true;
            state.last_error = None;
        }

        let result = self.api.fetch_profile(user_id).await;
        let mut state = self.lock();
        state.loading = false;
        match result {
            Ok(profile) => {
                tracing::debug!(%user_id, "profile loaded");
                state.profile = Some(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "profile load failed");
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Rename the loaded profile.
    ///
    /// A changed name must have passed an availability check first.
    pub async fn save(&self, new_name: &str) -> Result<Outcome, ApiError> {
        let new_name = new_name.trim();

        let (user_id, snapshot) = {
            let mut state = self.lock();
            if state.saving {
                return Ok(Outcome::Skipped);
            }
            let Some(current) = state.profile.clone() else {
                let err = ApiError::validation("Load the profile before editing it.");
                state.last_error = Some(err.clone());
                return Err(err);
            };
            if current.name == new_name {
                tracing::debug!(nickname = %new_name, "profile name unchanged");
                return Ok(Outcome::Skipped);
            }

            let checked = validate_nickname(new_name).and_then(|()| {
                match self.nickname.status_for(new_name) {
                    NicknameStatus::Available => Ok(()),
                    NicknameStatus::Taken => {
                        Err(ApiError::validation("That nickname is already taken."))
                    }
                    _ => Err(ApiError::validation(
                        "Check that the nickname is available before saving.",
                    )),
                }
            });
            if let Err(e) = checked {
                state.last_error = Some(e.clone());
                return Err(e);
            }

            let mut optimistic = current.clone();
            optimistic.name = new_name.to_string();
            state.profile = Some(optimistic);
            state.saving = true;
            state.saved = false;
            state.last_error = None;
            (current.id.clone(), current)
        };

        let update = ProfileUpdate {
            name: Some(new_name.to_string()),
            profile_image_url: None,
        };
        let result = self.api.update_profile(&user_id, update).await;

        let mut state = self.lock();
        state.saving = false;
        match result {
            Ok(profile) => {
                tracing::info!(%user_id, nickname = %profile.name, "profile saved");
                state.profile = Some(profile);
                state.saved = true;
                Ok(Outcome::Applied)
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "profile save failed; rolling back");
                state.profile = Some(snapshot);
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }
}
