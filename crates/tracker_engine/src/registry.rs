//! Live status subscriptions, one background task per tracked job.
use std::collections::HashMap;
use std::sync::{mpsc, Arc};

use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracker_logging::{tracker_debug, tracker_info, tracker_warn};

use crate::client::UploadApi;
use crate::frame::{frame_stream, DEFAULT_MAX_FRAME_BYTES};
use crate::{EngineEvent, JobId, SubscriptionId};

struct Subscription {
    id: SubscriptionId,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the stream task of every watched job.
///
/// Starting a job that already has a subscription cancels the old one first,
/// so at most one stream per job is ever delivering events. Every event a
/// task sends carries its subscription id; consumers drop ids they no longer
/// expect.
pub struct JobRegistry {
    runtime: Handle,
    api: Arc<dyn UploadApi>,
    events: mpsc::Sender<EngineEvent>,
    subscriptions: HashMap<JobId, Subscription>,
    max_frame_bytes: usize,
}

impl JobRegistry {
    pub fn new(runtime: Handle, api: Arc<dyn UploadApi>, events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            runtime,
            api,
            events,
            subscriptions: HashMap::new(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Caps the size of a single status frame on every stream started afterwards.
    pub fn with_frame_limit(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn start(&mut self, job_id: JobId, subscription: SubscriptionId) {
        if let Some(previous) = self.subscriptions.remove(&job_id) {
            tracker_debug!(
                "Replacing subscription {} of job {} with {}",
                previous.id,
                job_id,
                subscription
            );
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let task = self.runtime.spawn(run_subscription(
            self.api.clone(),
            job_id.clone(),
            subscription,
            token.clone(),
            self.events.clone(),
            self.max_frame_bytes,
        ));
        self.subscriptions.insert(
            job_id,
            Subscription {
                id: subscription,
                token,
                task,
            },
        );
    }

    /// Cancels the job's subscription. Returns false when none was active.
    pub fn stop(&mut self, job_id: &str) -> bool {
        match self.subscriptions.remove(job_id) {
            Some(subscription) => {
                subscription.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        if !self.subscriptions.is_empty() {
            tracker_info!("Closing {} status stream(s)", self.subscriptions.len());
        }
        for (_, subscription) in self.subscriptions.drain() {
            subscription.token.cancel();
        }
    }

    /// Subscription currently registered for the job, if any.
    pub fn active(&self, job_id: &str) -> Option<SubscriptionId> {
        self.subscriptions.get(job_id).map(|sub| sub.id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Forgets subscriptions whose task has already run to completion.
    pub fn prune_finished(&mut self) {
        self.subscriptions.retain(|_, sub| !sub.task.is_finished());
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn run_subscription(
    api: Arc<dyn UploadApi>,
    job_id: JobId,
    subscription: SubscriptionId,
    token: CancellationToken,
    events: mpsc::Sender<EngineEvent>,
    max_frame_bytes: usize,
) {
    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        opened = api.open_status_stream(&job_id) => opened,
    };
    let bytes = match opened {
        Ok(bytes) => bytes,
        Err(error) => {
            tracker_warn!("Status stream for job {} failed to open: {}", job_id, error);
            let _ = events.send(EngineEvent::StreamFailed {
                job_id,
                subscription,
                error,
            });
            return;
        }
    };

    tracker_debug!("Status stream open for job {} (subscription {})", job_id, subscription);
    let mut frames = frame_stream(bytes, max_frame_bytes);
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracker_debug!("Subscription {} of job {} cancelled", subscription, job_id);
                return;
            }
            next = frames.next() => next,
        };
        let event = match next {
            Some(Ok(frame)) => EngineEvent::Frame {
                job_id: job_id.clone(),
                subscription,
                frame,
            },
            Some(Err(error)) => {
                tracker_warn!("Status stream for job {} failed: {}", job_id, error);
                let _ = events.send(EngineEvent::StreamFailed {
                    job_id,
                    subscription,
                    error,
                });
                return;
            }
            None => {
                let _ = events.send(EngineEvent::StreamEnded {
                    job_id,
                    subscription,
                });
                return;
            }
        };
        if events.send(event).is_err() {
            return;
        }
    }
}
