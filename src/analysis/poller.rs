use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::core::analysis::AnalysisStatusReport;
use crate::core::api::AnalysisApi;
use crate::core::error::ApiError;

/// Fixed spacing between status requests. No backoff.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

pub type StatusStream =
    Pin<Box<dyn futures_core::Stream<Item = Result<AnalysisStatusReport, ApiError>> + Send>>;

type PolledStream = Pin<Box<dyn futures_core::Stream<Item = Result<Polled, ApiError>> + Send>>;

enum Polled {
    Fetched(AnalysisStatusReport),
    Cancelled,
}

/// Drives one analysis job to a terminal status by repeated status checks.
#[derive(Clone)]
pub struct AnalysisPoller {
    api: Arc<dyn AnalysisApi>,
    interval: Duration,
}

impl AnalysisPoller {
    pub fn new(api: Arc<dyn AnalysisApi>, interval: Duration) -> Self {
        Self { api, interval }
    }

    /// Poll without progress reporting or cancellation.
    pub async fn wait(&self, test_id: &str) -> Result<AnalysisStatusReport, ApiError> {
        self.poll(test_id, &CancellationToken::new(), |_| {}).await
    }

    /// Poll until a terminal status.
    ///
    /// `on_progress` sees every fetched report, terminal or not. A fired
    /// `cancel` turns into a synthetic `cancelled` report; so does an error
    /// that arrives after cancellation. Requests are strictly sequential.
    pub async fn poll<F>(
        &self,
        test_id: &str,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<AnalysisStatusReport, ApiError>
    where
        F: FnMut(&AnalysisStatusReport),
    {
        let mut polled = self.polled(test_id.to_string(), cancel.clone());
        while let Some(item) = polled.next().await {
            match item? {
                Polled::Fetched(report) => {
                    on_progress(&report);
                    if report.is_terminal() {
                        return Ok(report);
                    }
                }
                Polled::Cancelled => break,
            }
        }
        Ok(AnalysisStatusReport::cancelled(test_id))
    }

    /// Every fetched report as a stream, ending after a terminal report, a
    /// cancelled report or the first error.
    pub fn status_stream(&self, test_id: String, cancel: CancellationToken) -> StatusStream {
        let cancelled_id = test_id.clone();
        let stream = self.polled(test_id, cancel).map(move |item| {
            item.map(|polled| match polled {
                Polled::Fetched(report) => report,
                Polled::Cancelled => AnalysisStatusReport::cancelled(cancelled_id.clone()),
            })
        });
        Box::pin(stream)
    }

    fn polled(&self, test_id: String, cancel: CancellationToken) -> PolledStream {
        let api = Arc::clone(&self.api);
        let interval = self.interval;

        Box::pin(async_stream::stream! {
            let mut attempt: u32 = 0;
            loop {
                if cancel.is_cancelled() {
                    tracing::info!(%test_id, attempt, "analysis polling cancelled before request");
                    yield Ok(Polled::Cancelled);
                    break;
                }

                attempt += 1;
                match api.analysis_status(&test_id).await {
                    Ok(report) => {
                        tracing::debug!(
                            %test_id,
                            attempt,
                            status = %report.status,
                            step = ?report.current_step,
                            "analysis status"
                        );
                        let terminal = report.is_terminal();
                        if terminal {
                            tracing::info!(%test_id, attempt, "analysis finished");
                        }
                        yield Ok(Polled::Fetched(report));
                        if terminal {
                            break;
                        }
                    }
                    Err(e) if cancel.is_cancelled() => {
                        tracing::debug!(%test_id, error = %e, "status error after cancel ignored");
                        yield Ok(Polled::Cancelled);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(%test_id, attempt, error = %e, "status request failed");
                        yield Err(e);
                        break;
                    }
                }

                let cancelled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = tokio::time::sleep(interval) => false,
                };
                if cancelled {
                    tracing::info!(%test_id, attempt, "analysis polling cancelled during wait");
                    yield Ok(Polled::Cancelled);
                    break;
                }
            }
        })
    }
}
