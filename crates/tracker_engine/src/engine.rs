use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracker_logging::{tracker_debug, tracker_error};

use crate::client::{ApiSettings, ReqwestUploadApi, UploadApi};
use crate::frame::DEFAULT_MAX_FRAME_BYTES;
use crate::registry::JobRegistry;
use crate::{ApiError, EngineEvent, Epoch, JobId, MergeRequest, SubscriptionId, UploadRequest};

enum EngineCommand {
    Submit(UploadRequest),
    OpenStream {
        job_id: JobId,
        subscription: SubscriptionId,
    },
    CloseStream(JobId),
    CloseAll,
    QueryKeepLocal {
        epoch: Epoch,
        paths: Vec<String>,
    },
    SetKeepLocal {
        paths: Vec<String>,
        designation: bool,
    },
    Merge(MergeRequest),
}

/// Front door to the background IO thread.
///
/// Commands are fire-and-forget; every result comes back as an [`EngineEvent`].
/// Once every clone is dropped the thread closes all status streams and exits.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineHandle {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let max_frame_bytes = settings.max_frame_bytes;
        let api = ReqwestUploadApi::new(settings)?;
        Ok(Self::with_api_and_frame_limit(Arc::new(api), max_frame_bytes))
    }

    pub fn with_api(api: Arc<dyn UploadApi>) -> Self {
        Self::with_api_and_frame_limit(api, DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn with_api_and_frame_limit(api: Arc<dyn UploadApi>, max_frame_bytes: usize) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracker_error!("Failed to start engine runtime: {}", err);
                    return;
                }
            };
            let mut registry =
                JobRegistry::new(runtime.handle().clone(), api.clone(), event_tx.clone())
                    .with_frame_limit(max_frame_bytes);
            while let Ok(command) = cmd_rx.recv() {
                registry.prune_finished();
                match command {
                    EngineCommand::OpenStream {
                        job_id,
                        subscription,
                    } => registry.start(job_id, subscription),
                    EngineCommand::CloseStream(job_id) => {
                        if !registry.stop(&job_id) {
                            tracker_debug!("No open stream for job {}", job_id);
                        }
                    }
                    EngineCommand::CloseAll => registry.stop_all(),
                    unary => {
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let event = handle_unary(api.as_ref(), unary).await;
                            if let Some(event) = event {
                                let _ = event_tx.send(event);
                            }
                        });
                    }
                }
            }
            registry.stop_all();
            tracker_debug!("Engine command channel closed");
        });

        Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    pub fn submit_upload(&self, request: UploadRequest) {
        let _ = self.cmd_tx.send(EngineCommand::Submit(request));
    }

    /// Opens (or reopens) the status stream of a job under a new subscription id.
    pub fn open_stream(&self, job_id: JobId, subscription: SubscriptionId) {
        let _ = self.cmd_tx.send(EngineCommand::OpenStream {
            job_id,
            subscription,
        });
    }

    pub fn close_stream(&self, job_id: JobId) {
        let _ = self.cmd_tx.send(EngineCommand::CloseStream(job_id));
    }

    pub fn close_all(&self) {
        let _ = self.cmd_tx.send(EngineCommand::CloseAll);
    }

    pub fn query_keep_local(&self, epoch: Epoch, paths: Vec<String>) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::QueryKeepLocal { epoch, paths });
    }

    pub fn set_keep_local(&self, paths: Vec<String>, designation: bool) {
        let _ = self.cmd_tx.send(EngineCommand::SetKeepLocal { paths, designation });
    }

    pub fn merge_clips(&self, request: MergeRequest) {
        let _ = self.cmd_tx.send(EngineCommand::Merge(request));
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.recv_timeout(timeout).ok()
    }
}

async fn handle_unary(api: &dyn UploadApi, command: EngineCommand) -> Option<EngineEvent> {
    let event = match command {
        EngineCommand::Submit(request) => {
            EngineEvent::Submitted(api.submit_upload(&request).await)
        }
        EngineCommand::QueryKeepLocal { epoch, paths } => EngineEvent::KeepLocalResolved {
            epoch,
            result: api.query_keep_local(&paths).await,
        },
        EngineCommand::SetKeepLocal { paths, designation } => {
            EngineEvent::KeepLocalSet(api.set_keep_local(&paths, designation).await)
        }
        EngineCommand::Merge(request) => EngineEvent::MergeFinished(api.merge_clips(&request).await),
        EngineCommand::OpenStream { .. } | EngineCommand::CloseStream(_) | EngineCommand::CloseAll => {
            return None
        }
    };
    Some(event)
}
