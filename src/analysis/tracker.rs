use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::analysis::poller::AnalysisPoller;
use crate::core::analysis::{extension, AnalysisStatusReport, ImageUpload};
use crate::core::api::AnalysisApi;
use crate::core::error::ApiError;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

const MAX_NOTE_CHARS: usize = 500;

/// Reject uploads that would fail server-side anyway.
pub fn validate_upload(upload: &ImageUpload) -> Result<(), ApiError> {
    if upload.bytes.is_empty() {
        return Err(ApiError::validation("Please choose a drawing to upload."));
    }
    let supported = extension(&upload.file_name)
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
    if !supported {
        return Err(ApiError::validation(
            "Only PNG, JPG or WEBP images are supported.",
        ));
    }
    if let Some(note) = &upload.note {
        if note.chars().count() > MAX_NOTE_CHARS {
            return Err(ApiError::validation(format!(
                "The note can be at most {MAX_NOTE_CHARS} characters."
            )));
        }
    }
    Ok(())
}

struct TrackedJob {
    generation: u64,
    test_id: Option<String>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TrackerState {
    generation: u64,
    current: Option<TrackedJob>,
}

/// Keeps at most one analysis job under observation.
///
/// Starting a job cancels polling of the one before it.
pub struct AnalysisTracker {
    api: Arc<dyn AnalysisApi>,
    poller: AnalysisPoller,
    state: Mutex<TrackerState>,
}

impl AnalysisTracker {
    pub fn new(api: Arc<dyn AnalysisApi>, poller: AnalysisPoller) -> Self {
        Self {
            api,
            poller,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_test_id(&self) -> Option<String> {
        self.lock().current.as_ref().and_then(|j| j.test_id.clone())
    }

    pub fn is_tracking(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Stop polling the tracked job, if any.
    pub fn cancel(&self) {
        if let Some(job) = self.lock().current.take() {
            tracing::info!(test_id = ?job.test_id, "analysis tracking cancelled");
            job.cancel.cancel();
        }
    }

    /// Upload a drawing and poll it to a terminal status.
    pub async fn start<F>(
        &self,
        upload: ImageUpload,
        on_progress: F,
    ) -> Result<AnalysisStatusReport, ApiError>
    where
        F: FnMut(&AnalysisStatusReport),
    {
        validate_upload(&upload)?;

        let cancel = CancellationToken::new();
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            let generation = state.generation;
            let previous = state.current.replace(TrackedJob {
                generation,
                test_id: None,
                cancel: cancel.clone(),
            });
            if let Some(previous) = previous {
                tracing::info!(test_id = ?previous.test_id, "superseding tracked analysis");
                previous.cancel.cancel();
            }
            generation
        };

        let file_name = upload.file_name.clone();
        let ticket = match self.api.submit_analysis(upload).await {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!(%file_name, error = %e, "analysis upload failed");
                self.release(generation);
                return Err(e);
            }
        };
        tracing::info!(test_id = %ticket.test_id, status = %ticket.status, "analysis submitted");

        {
            let mut state = self.lock();
            if let Some(job) = state.current.as_mut().filter(|j| j.generation == generation) {
                job.test_id = Some(ticket.test_id.clone());
            }
        }

        let result = self.poller.poll(&ticket.test_id, &cancel, on_progress).await;
        self.release(generation);
        result
    }

    fn release(&self, generation: u64) {
        let mut state = self.lock();
        if state
            .current
            .as_ref()
            .is_some_and(|j| j.generation == generation)
        {
            state.current = None;
        }
    }
}
