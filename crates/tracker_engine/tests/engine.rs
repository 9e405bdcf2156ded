use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use tracker_engine::{
    ApiError, ByteStream, EngineEvent, EngineHandle, FailureKind, MergeOutcome, MergeRequest,
    SubmitResponse, UploadApi, UploadRequest,
};

const WAIT: Duration = Duration::from_secs(2);

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(tracker_logging::initialize_for_tests);
}

/// Serves canned stream bodies per job; `hold_open` jobs never end.
#[derive(Default)]
struct FakeApi {
    bodies: Mutex<HashMap<String, Vec<&'static str>>>,
    hold_open: Vec<String>,
    opened: Mutex<Vec<String>>,
}

impl FakeApi {
    fn with_stream(self, job_id: &str, chunks: Vec<&'static str>) -> Self {
        self.bodies
            .lock()
            .unwrap()
            .insert(job_id.to_string(), chunks);
        self
    }

    fn held_open(mut self, job_id: &str) -> Self {
        self.hold_open.push(job_id.to_string());
        self
    }
}

#[async_trait::async_trait]
impl UploadApi for FakeApi {
    async fn submit_upload(&self, request: &UploadRequest) -> Result<SubmitResponse, ApiError> {
        Ok(SubmitResponse {
            job_id: "j-1".to_string(),
            total_files: request.target_files.len() as i64,
        })
    }

    async fn open_status_stream(&self, job_id: &str) -> Result<ByteStream, ApiError> {
        self.opened.lock().unwrap().push(job_id.to_string());
        let chunks = self
            .bodies
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_default();
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, ApiError>(Bytes::from_static(chunk.as_bytes()))),
        );
        if self.hold_open.iter().any(|held| held == job_id) {
            Ok(body.chain(stream::pending()).boxed())
        } else {
            Ok(body.boxed())
        }
    }

    async fn query_keep_local(&self, paths: &[String]) -> Result<BTreeMap<String, bool>, ApiError> {
        Ok(paths.iter().map(|path| (path.clone(), true)).collect())
    }

    async fn set_keep_local(&self, _paths: &[String], _designation: bool) -> Result<(), ApiError> {
        Ok(())
    }

    async fn merge_clips(&self, request: &MergeRequest) -> Result<MergeOutcome, ApiError> {
        Ok(MergeOutcome {
            merged_path: Some(format!("/out/{}.mp4", request.new_name)),
        })
    }
}

fn next_event(engine: &EngineHandle) -> EngineEvent {
    engine.recv_timeout(WAIT).expect("engine event")
}

fn state_of(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Frame { frame, .. } => frame
            .payload()
            .get("state")
            .and_then(|value| value.as_str())
            .map(str::to_string),
        _ => None,
    }
}

#[test]
fn malformed_frame_is_skipped_and_stream_continues() {
    init_logging();
    let api = FakeApi::default().with_stream(
        "a",
        vec![
            "data: {\"state\":\"queued\"}\n\n",
            "data: [1, 2\n\n",
            "data: {\"state\":\"complete\"}\n\n",
        ],
    );
    let engine = EngineHandle::with_api(Arc::new(api));
    engine.open_stream("a".to_string(), 1);

    assert_eq!(state_of(&next_event(&engine)).as_deref(), Some("queued"));
    assert_eq!(state_of(&next_event(&engine)).as_deref(), Some("complete"));
    assert_eq!(
        next_event(&engine),
        EngineEvent::StreamEnded {
            job_id: "a".to_string(),
            subscription: 1,
        }
    );
}

#[test]
fn oversized_frame_fails_the_stream() {
    init_logging();
    let api = FakeApi::default().with_stream(
        "a",
        vec![
            "data: {\"state\":\"queued\"}\n\n",
            "data: \"0123456789012345678901234567890123456789",
            "0123456789\"\n\n",
        ],
    );
    let engine = EngineHandle::with_api_and_frame_limit(Arc::new(api), 32);
    engine.open_stream("a".to_string(), 1);

    assert_eq!(state_of(&next_event(&engine)).as_deref(), Some("queued"));
    match next_event(&engine) {
        EngineEvent::StreamFailed {
            job_id,
            subscription,
            error,
        } => {
            assert_eq!(job_id, "a");
            assert_eq!(subscription, 1);
            assert_eq!(error.kind, FailureKind::TooLarge { max_bytes: 32 });
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(engine.recv_timeout(Duration::from_millis(200)).is_none());
}

#[test]
fn independent_jobs_deliver_under_their_own_ids() {
    let api = FakeApi::default()
        .with_stream("a", vec!["data: {\"state\":\"queued\"}\n\n"])
        .with_stream("b", vec!["data: {\"state\":\"uploading\"}\n\n"]);
    let engine = EngineHandle::with_api(Arc::new(api));
    engine.open_stream("a".to_string(), 1);
    engine.open_stream("b".to_string(), 2);

    let mut seen = Vec::new();
    for _ in 0..4 {
        match next_event(&engine) {
            EngineEvent::Frame {
                job_id,
                subscription,
                ..
            } => seen.push(format!("frame {job_id}/{subscription}")),
            EngineEvent::StreamEnded {
                job_id,
                subscription,
            } => seen.push(format!("end {job_id}/{subscription}")),
            other => panic!("unexpected event {other:?}"),
        }
    }
    seen.sort();
    assert_eq!(seen, vec!["end a/1", "end b/2", "frame a/1", "frame b/2"]);
}

#[test]
fn restarting_a_job_cancels_the_previous_subscription() {
    init_logging();
    let api = Arc::new(
        FakeApi::default()
            .with_stream("a", vec!["data: {\"state\":\"queued\"}\n\n"])
            .held_open("a"),
    );
    let engine = EngineHandle::with_api(api.clone());
    engine.open_stream("a".to_string(), 1);
    assert!(matches!(
        next_event(&engine),
        EngineEvent::Frame { subscription: 1, .. }
    ));

    engine.open_stream("a".to_string(), 2);
    assert!(matches!(
        next_event(&engine),
        EngineEvent::Frame { subscription: 2, .. }
    ));

    engine.close_all();
    assert!(engine.recv_timeout(Duration::from_millis(200)).is_none());
    assert_eq!(api.opened.lock().unwrap().len(), 2);
}

#[test]
fn unary_commands_report_results() {
    let engine = EngineHandle::with_api(Arc::new(FakeApi::default()));

    engine.query_keep_local(9, vec!["x".to_string()]);
    match next_event(&engine) {
        EngineEvent::KeepLocalResolved { epoch, result } => {
            assert_eq!(epoch, 9);
            assert_eq!(result.unwrap().get("x"), Some(&true));
        }
        other => panic!("unexpected event {other:?}"),
    }

    engine.merge_clips(MergeRequest {
        paths: vec!["a".to_string(), "b".to_string()],
        new_name: "cut".to_string(),
        archive_originals: false,
    });
    assert_eq!(
        next_event(&engine),
        EngineEvent::MergeFinished(Ok(MergeOutcome {
            merged_path: Some("/out/cut.mp4".to_string()),
        }))
    );
}
