use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracker_core::{Effect, Msg, StatusUpdate, UploadSubmission};
use tracker_engine::{ApiError, ApiSettings, EngineEvent, EngineHandle, MergeRequest, UploadRequest};
use tracker_logging::{tracker_info, tracker_warn};

const EVENT_POLL: Duration = Duration::from_millis(100);

/// Executes core effects on the engine and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(settings: ApiSettings, msg_tx: mpsc::Sender<Msg>) -> Result<Self, ApiError> {
        tracker_info!("Using server {}", settings.base_url);
        let engine = EngineHandle::new(settings)?;
        let runner = Self { engine };
        runner.spawn_event_loop(msg_tx);
        Ok(runner)
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SubmitUpload(submission) => {
                    tracker_info!(
                        "SubmitUpload files={} migrate={}",
                        submission.target_files.len(),
                        submission.migrate_files
                    );
                    self.engine.submit_upload(upload_request(submission));
                }
                Effect::OpenJobStream {
                    job_id,
                    subscription,
                } => self.engine.open_stream(job_id, subscription),
                Effect::CloseJobStream { job_id } => self.engine.close_stream(job_id),
                Effect::CloseAllStreams => self.engine.close_all(),
                Effect::QueryKeepLocal { epoch, paths } => {
                    self.engine.query_keep_local(epoch, paths)
                }
                Effect::SetKeepLocal { paths, designation } => {
                    self.engine.set_keep_local(paths, designation)
                }
                Effect::SubmitMerge {
                    paths,
                    new_name,
                    archive_originals,
                } => self.engine.merge_clips(MergeRequest {
                    paths,
                    new_name,
                    archive_originals,
                }),
            }
        }
    }

    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let engine = self.engine.clone();
        thread::spawn(move || loop {
            if let Some(event) = engine.recv_timeout(EVENT_POLL) {
                if msg_tx.send(event_to_msg(event, Utc::now())).is_err() {
                    break;
                }
            }
        });
    }
}

fn upload_request(submission: UploadSubmission) -> UploadRequest {
    UploadRequest {
        target_files: submission.target_files,
        migrate_files: submission.migrate_files,
        made_for_kids: submission.made_for_kids,
        visibility_setting: submission
            .visibility
            .map(|visibility| visibility.as_str().to_string()),
        upload_name: submission.upload_name,
    }
}

fn event_to_msg(event: EngineEvent, at: DateTime<Utc>) -> Msg {
    match event {
        EngineEvent::Submitted(Ok(response)) => Msg::UploadAccepted {
            job_id: response.job_id,
            total_files: response.total_files,
            at,
        },
        EngineEvent::Submitted(Err(err)) => Msg::UploadRejected(err.to_string()),
        EngineEvent::Frame {
            job_id,
            subscription,
            frame,
        } => Msg::JobFrame {
            job_id,
            subscription,
            update: StatusUpdate::from_json(frame.payload()),
            at,
        },
        EngineEvent::StreamEnded {
            job_id,
            subscription,
        } => Msg::JobStreamEnded {
            job_id,
            subscription,
            at,
        },
        EngineEvent::StreamFailed {
            job_id,
            subscription,
            error,
        } => {
            tracker_warn!("Job {} stream failed: {}", job_id, error);
            Msg::JobStreamFailed {
                job_id,
                subscription,
                message: error.to_string(),
                at,
            }
        }
        EngineEvent::KeepLocalResolved { epoch, result } => Msg::KeepLocalResolved {
            epoch,
            result: result.map_err(|err| err.to_string()),
        },
        EngineEvent::KeepLocalSet(result) => {
            Msg::KeepLocalDesignationFinished(result.map_err(|err| err.to_string()))
        }
        EngineEvent::MergeFinished(result) => Msg::MergeFinished(
            result
                .map(|outcome| {
                    outcome
                        .merged_path
                        .unwrap_or_else(|| "an unreported path".to_string())
                })
                .map_err(|err| err.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracker_core::{FileState, Visibility};
    use tracker_engine::{FailureKind, FrameParser, MergeOutcome, SubmitResponse};

    #[test]
    fn submission_maps_visibility_to_wire_name() {
        let request = upload_request(UploadSubmission {
            target_files: vec!["a".to_string()],
            migrate_files: false,
            made_for_kids: Some(true),
            visibility: Some(Visibility::Public),
            upload_name: None,
        });
        assert_eq!(request.visibility_setting.as_deref(), Some("public"));
        assert_eq!(request.made_for_kids, Some(true));
    }

    #[test]
    fn frames_become_status_updates() {
        let mut parser = FrameParser::new();
        let frame = parser
            .feed(b"data: {\"state\":\"error\",\"file_path\":\"a.mp4\",\"error\":\"quota\"}\n\n")
            .unwrap()
            .remove(0);
        let at = Utc::now();
        let msg = event_to_msg(
            EngineEvent::Frame {
                job_id: "5".to_string(),
                subscription: 3,
                frame,
            },
            at,
        );
        match msg {
            Msg::JobFrame {
                job_id,
                subscription,
                update,
                ..
            } => {
                assert_eq!(job_id, "5");
                assert_eq!(subscription, 3);
                assert_eq!(update.file_path, "a.mp4");
                assert_eq!(FileState::from_wire(&update.state), FileState::Error);
                assert_eq!(update.error.as_deref(), Some("quota"));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn results_carry_error_text() {
        let at = Utc::now();
        assert_eq!(
            event_to_msg(
                EngineEvent::Submitted(Ok(SubmitResponse {
                    job_id: "9".to_string(),
                    total_files: 2,
                })),
                at
            ),
            Msg::UploadAccepted {
                job_id: "9".to_string(),
                total_files: 2,
                at,
            }
        );
        let failure = ApiError {
            kind: FailureKind::HttpStatus(500),
            message: "boom".to_string(),
        };
        assert_eq!(
            event_to_msg(EngineEvent::KeepLocalSet(Err(failure)), at),
            Msg::KeepLocalDesignationFinished(Err("http status 500: boom".to_string()))
        );
        assert_eq!(
            event_to_msg(
                EngineEvent::MergeFinished(Ok(MergeOutcome {
                    merged_path: Some("/c/out.mp4".to_string()),
                })),
                at
            ),
            Msg::MergeFinished(Ok("/c/out.mp4".to_string()))
        );
    }
}
