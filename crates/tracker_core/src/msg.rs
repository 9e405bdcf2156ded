use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{Epoch, JobId, StatusUpdate, SubscriptionId, Visibility};

/// Options the user picked for an upload submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadOptions {
    pub migrate_files: bool,
    pub made_for_kids: Option<bool>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Directory listing refreshed; selections drop paths that disappeared.
    FilesListed(Vec<String>),
    /// User appended a clip to the merge selection.
    MergeClipAdded(String),
    MergeClipRemoved(usize),
    MergeClipMovedLeft(usize),
    MergeClipMovedRight(usize),
    /// User typed into the merge output name field.
    MergeNameEdited(String),
    /// User asked to merge the selected clips.
    MergeRequested { archive_originals: bool },
    /// Merge endpoint answered with the merged path or an error message.
    MergeFinished(Result<String, String>),
    /// User toggled a file in the migration selection.
    MigrationToggled(String),
    /// User typed into the upload name field.
    UploadNameEdited(String),
    /// User asked to upload the migration selection.
    UploadRequested(UploadOptions),
    /// Upload endpoint created a job.
    UploadAccepted {
        job_id: JobId,
        total_files: i64,
        at: DateTime<Utc>,
    },
    /// Upload endpoint failed.
    UploadRejected(String),
    /// Track an already running job by id.
    WatchRequested {
        job_id: JobId,
        total_files_hint: i64,
        at: DateTime<Utc>,
    },
    /// User stopped following a job.
    StopWatching(JobId),
    /// One decoded frame from a job's status stream.
    JobFrame {
        job_id: JobId,
        subscription: SubscriptionId,
        update: StatusUpdate,
        at: DateTime<Utc>,
    },
    /// A job's status stream closed cleanly.
    JobStreamEnded {
        job_id: JobId,
        subscription: SubscriptionId,
        at: DateTime<Utc>,
    },
    /// A job's status stream failed.
    JobStreamFailed {
        job_id: JobId,
        subscription: SubscriptionId,
        message: String,
        at: DateTime<Utc>,
    },
    /// Re-check whether the migration selection shares one keep-local value.
    KeepLocalRefreshRequested { force: bool },
    /// Answer to a keep-local query.
    KeepLocalResolved {
        epoch: Epoch,
        result: Result<BTreeMap<String, bool>, String>,
    },
    /// User set keep-local on the whole migration selection.
    KeepLocalDesignated(bool),
    KeepLocalDesignationFinished(Result<(), String>),
    /// Owner is going away: close every stream, drop in-flight queries.
    Shutdown,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
