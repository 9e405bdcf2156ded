use chrono::{DateTime, Utc};

use crate::job::{self, JobId, StatusUpdate, UploadJob};

/// Identifies one stream subscription. A job that is restarted gets a new one,
/// so frames still in flight from the old stream can be told apart.
pub type SubscriptionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TrackedJob {
    job: UploadJob,
    subscription: Option<SubscriptionId>,
}

/// Ordered, most-recent-first list of job snapshots for the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobBoard {
    entries: Vec<TrackedJob>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a job under a new subscription. Starting a job id that is
    /// already tracked replaces its snapshot and moves it to the front.
    ///
    /// Returns the subscription the job replaced, if any, so the caller can
    /// cancel it.
    pub fn start(
        &mut self,
        job_id: &str,
        total_files_hint: i64,
        subscription: SubscriptionId,
        at: DateTime<Utc>,
    ) -> Option<SubscriptionId> {
        let previous = self
            .entries
            .iter()
            .position(|entry| entry.job.job_id == job_id)
            .map(|index| self.entries.remove(index))
            .and_then(|entry| entry.subscription);
        self.entries.insert(
            0,
            TrackedJob {
                job: UploadJob::new(job_id, total_files_hint, at),
                subscription: Some(subscription),
            },
        );
        previous
    }

    /// Applies an update if it belongs to the job's current subscription.
    /// Returns whether the snapshot was replaced.
    pub fn apply(
        &mut self,
        job_id: &str,
        subscription: SubscriptionId,
        update: &StatusUpdate,
        at: DateTime<Utc>,
    ) -> bool {
        self.replace_with(job_id, subscription, |job| job::apply(job, update, at))
    }

    pub fn stream_ended(&mut self, job_id: &str, subscription: SubscriptionId, at: DateTime<Utc>) -> bool {
        let replaced = self.replace_with(job_id, subscription, |job| job::reconcile_stream_end(job, at));
        if replaced {
            self.detach(job_id);
        }
        replaced
    }

    pub fn stream_failed(
        &mut self,
        job_id: &str,
        subscription: SubscriptionId,
        message: &str,
        at: DateTime<Utc>,
    ) -> bool {
        let replaced = self.replace_with(job_id, subscription, |job| {
            job::apply_stream_error(job, message, at)
        });
        if replaced {
            self.detach(job_id);
        }
        replaced
    }

    /// Forgets the job's subscription; later frames for it are ignored.
    pub fn detach(&mut self, job_id: &str) -> Option<SubscriptionId> {
        self.entries
            .iter_mut()
            .find(|entry| entry.job.job_id == job_id)
            .and_then(|entry| entry.subscription.take())
    }

    pub fn detach_all(&mut self) -> Vec<JobId> {
        self.entries
            .iter_mut()
            .filter_map(|entry| entry.subscription.take().map(|_| entry.job.job_id.clone()))
            .collect()
    }

    pub fn get(&self, job_id: &str) -> Option<&UploadJob> {
        self.entries
            .iter()
            .find(|entry| entry.job.job_id == job_id)
            .map(|entry| &entry.job)
    }

    pub fn subscription(&self, job_id: &str) -> Option<SubscriptionId> {
        self.entries
            .iter()
            .find(|entry| entry.job.job_id == job_id)
            .and_then(|entry| entry.subscription)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &UploadJob> {
        self.entries.iter().map(|entry| &entry.job)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any unfinished job still has a stream that can move it forward.
    pub fn has_active_jobs(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.subscription.is_some() && !entry.job.is_complete)
    }

    fn replace_with(
        &mut self,
        job_id: &str,
        subscription: SubscriptionId,
        fold: impl FnOnce(UploadJob) -> UploadJob,
    ) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.job.job_id == job_id)
        else {
            return false;
        };
        if entry.subscription != Some(subscription) {
            return false;
        }
        let placeholder = UploadJob::new(job_id, 0, entry.job.created_at);
        let current = std::mem::replace(&mut entry.job, placeholder);
        entry.job = fold(current);
        true
    }
}
