use super::*;
use crate::core::analysis::*;
use crate::core::api::AnalysisApi;
use crate::core::error::{ApiError, ErrorKind};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

fn report(test_id: &str, status: AnalysisStatus) -> AnalysisStatusReport {
    let result = (status == AnalysisStatus::Completed).then(|| AnalysisResult {
        predicted_category: Some("analyst".into()),
        probabilities: HashMap::from([
            ("analyst".to_string(), 70.0),
            ("dreamer".to_string(), 30.0),
        ]),
        summary: Some("Careful strokes.".into()),
        image_url: None,
    });
    AnalysisStatusReport {
        test_id: test_id.into(),
        status,
        current_step: Some(1),
        message: None,
        result,
    }
}

/// Replays a fixed status script; the last entry repeats forever.
#[derive(Default)]
struct ScriptedApi {
    script: Mutex<VecDeque<Result<AnalysisStatus, ApiError>>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    cancel_on_call: Option<CancellationToken>,
}

impl ScriptedApi {
    fn new(script: Vec<Result<AnalysisStatus, ApiError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AnalysisApi for ScriptedApi {
    async fn submit_analysis(&self, _upload: ImageUpload) -> Result<AnalysisTicket, ApiError> {
        Ok(AnalysisTicket {
            test_id: "t-1".into(),
            status: AnalysisStatus::Pending,
        })
    }

    async fn analysis_status(&self, test_id: &str) -> Result<AnalysisStatusReport, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        let next = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        match next {
            Some(Ok(status)) => Ok(report(test_id, status)),
            Some(Err(e)) => Err(e),
            None => Err(ApiError::server(500, "empty script")),
        }
    }
}

fn poller(api: Arc<dyn AnalysisApi>) -> AnalysisPoller {
    AnalysisPoller::new(api, DEFAULT_POLL_INTERVAL)
}

#[tokio::test(start_paused = true)]
async fn test_poller_converges_after_terminal_status() {
    let api = Arc::new(ScriptedApi::new(vec![
        Ok(AnalysisStatus::Pending),
        Ok(AnalysisStatus::Processing),
        Ok(AnalysisStatus::Processing),
        Ok(AnalysisStatus::Completed),
    ]));
    let mut seen = Vec::new();

    let result = poller(api.clone())
        .poll("t-1", &CancellationToken::new(), |r| seen.push(r.status))
        .await
        .unwrap();

    assert_eq!(result.status, AnalysisStatus::Completed);
    assert_eq!(result.result.unwrap().predicted_category.as_deref(), Some("analyst"));
    assert_eq!(api.calls.load(Ordering::SeqCst), 4);
    assert_eq!(
        seen,
        vec![
            AnalysisStatus::Pending,
            AnalysisStatus::Processing,
            AnalysisStatus::Processing,
            AnalysisStatus::Completed,
        ]
    );

    let times = api.call_times.lock().unwrap().clone();
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(2_000), "gap too short: {gap:?}");
        assert!(gap < Duration::from_millis(2_100), "gap too long: {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_wait_skips_further_requests() {
    let api = Arc::new(ScriptedApi::new(vec![Ok(AnalysisStatus::Processing)]));
    let cancel = CancellationToken::new();
    let mut progress_calls = 0;

    let poll = poller(api.clone());
    let (result, _) = tokio::join!(
        poll.poll("t-1", &cancel, |_| progress_calls += 1),
        async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        }
    );

    let result = result.unwrap();
    assert_eq!(result.status, AnalysisStatus::Cancelled);
    assert_eq!(result.test_id, "t-1");
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    assert_eq!(progress_calls, 1);
}

#[tokio::test]
async fn test_pre_cancelled_makes_no_request() {
    let api = Arc::new(ScriptedApi::new(vec![Ok(AnalysisStatus::Pending)]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = poller(api.clone()).poll("t-1", &cancel, |_| {}).await.unwrap();
    assert_eq!(result.status, AnalysisStatus::Cancelled);
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_polling_error_propagates() {
    let api = Arc::new(ScriptedApi::new(vec![
        Ok(AnalysisStatus::Processing),
        Err(ApiError::network("Could not reach the server.")),
    ]));

    let err = poller(api.clone()).wait("t-1").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(api.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_after_cancellation_is_a_cancelled_return() {
    let cancel = CancellationToken::new();
    let api = Arc::new(ScriptedApi {
        script: Mutex::new(VecDeque::from([Err(ApiError::server(500, "boom"))])),
        cancel_on_call: Some(cancel.clone()),
        ..Default::default()
    });

    let result = poller(api).poll("t-1", &cancel, |_| {}).await.unwrap();
    assert_eq!(result.status, AnalysisStatus::Cancelled);
}

#[tokio::test]
async fn test_failed_status_is_terminal() {
    let api = Arc::new(ScriptedApi::new(vec![Ok(AnalysisStatus::Failed)]));
    let result = poller(api.clone()).wait("t-1").await.unwrap();
    assert_eq!(result.status, AnalysisStatus::Failed);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_stream_yields_every_report() {
    let api = Arc::new(ScriptedApi::new(vec![
        Ok(AnalysisStatus::Pending),
        Ok(AnalysisStatus::Processing),
        Ok(AnalysisStatus::Completed),
    ]));

    let reports: Vec<_> = poller(api)
        .status_stream("t-1".into(), CancellationToken::new())
        .collect()
        .await;

    let statuses: Vec<_> = reports.into_iter().map(|r| r.unwrap().status).collect();
    assert_eq!(
        statuses,
        vec![
            AnalysisStatus::Pending,
            AnalysisStatus::Processing,
            AnalysisStatus::Completed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_stream_ends_on_cancel() {
    let api = Arc::new(ScriptedApi::new(vec![Ok(AnalysisStatus::Processing)]));
    let cancel = CancellationToken::new();
    let mut stream = poller(api.clone()).status_stream("t-1".into(), cancel.clone());

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.status, AnalysisStatus::Processing);

    cancel.cancel();
    let last = stream.next().await.unwrap().unwrap();
    assert_eq!(last.status, AnalysisStatus::Cancelled);
    assert!(stream.next().await.is_none());
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
}

/// `t-1` never finishes; later jobs complete on the first poll.
#[derive(Default)]
struct TrackerApi {
    submitted: AtomicUsize,
    status_calls: Mutex<Vec<String>>,
}

#[async_trait]
impl AnalysisApi for TrackerApi {
    async fn submit_analysis(&self, _upload: ImageUpload) -> Result<AnalysisTicket, ApiError> {
        let n = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AnalysisTicket {
            test_id: format!("t-{n}"),
            status: AnalysisStatus::Pending,
        })
    }

    async fn analysis_status(&self, test_id: &str) -> Result<AnalysisStatusReport, ApiError> {
        self.status_calls.lock().unwrap().push(test_id.to_string());
        if test_id == "t-1" {
            Ok(report(test_id, AnalysisStatus::Processing))
        } else {
            Ok(report(test_id, AnalysisStatus::Completed))
        }
    }
}

fn upload(name: &str) -> ImageUpload {
    ImageUpload {
        file_name: name.into(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
        note: Some("drawn in ten minutes".into()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_new_job_supersedes_tracked_one() {
    let api = Arc::new(TrackerApi::default());
    let tracker = AnalysisTracker::new(api.clone(), poller(api.clone()));

    let (first, second) = tokio::join!(tracker.start(upload("house.png"), |_| {}), async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(tracker.current_test_id().as_deref(), Some("t-1"));
        tracker.start(upload("tree.png"), |_| {}).await
    });

    let first = first.unwrap();
    assert_eq!(first.test_id, "t-1");
    assert_eq!(first.status, AnalysisStatus::Cancelled);

    let second = second.unwrap();
    assert_eq!(second.test_id, "t-2");
    assert_eq!(second.status, AnalysisStatus::Completed);

    // t-1 was polled once, then never again after being superseded.
    let calls = api.status_calls.lock().unwrap().clone();
    assert_eq!(calls.iter().filter(|id| *id == "t-1").count(), 1);
    assert!(!tracker.is_tracking());
}

#[tokio::test(start_paused = true)]
async fn test_tracker_cancel_stops_polling() {
    let api = Arc::new(TrackerApi::default());
    let tracker = AnalysisTracker::new(api.clone(), poller(api.clone()));

    let (result, _) = tokio::join!(tracker.start(upload("person.jpg"), |_| {}), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracker.cancel();
    });

    assert_eq!(result.unwrap().status, AnalysisStatus::Cancelled);
    assert!(!tracker.is_tracking());
}

#[tokio::test]
async fn test_upload_validation_happens_before_network() {
    let api = Arc::new(TrackerApi::default());
    let tracker = AnalysisTracker::new(api.clone(), poller(api.clone()));

    let empty = ImageUpload {
        file_name: "house.png".into(),
        bytes: vec![],
        note: None,
    };
    let err = tracker.start(empty, |_| {}).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = tracker.start(upload("house.gif"), |_| {}).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let mut long_note = upload("house.PNG");
    long_note.note = Some("x".repeat(501));
    let err = tracker.start(long_note, |_| {}).await.unwrap_err();
    assert!(err.message.contains("500"));

    assert_eq!(api.submitted.load(Ordering::SeqCst), 0);
}

#[test]
fn test_validate_upload_accepts_supported_types() {
    assert!(validate_upload(&upload("a.png")).is_ok());
    assert!(validate_upload(&upload("b.JPEG")).is_ok());
    assert!(validate_upload(&upload("c.webp")).is_ok());
}
