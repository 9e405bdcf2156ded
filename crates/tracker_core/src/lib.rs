//! Upload tracker core: pure state machine and view-model helpers.
mod board;
mod consistency;
mod effect;
mod job;
mod msg;
mod selection;
mod state;
mod update;
mod view_model;

pub use board::{JobBoard, SubscriptionId};
pub use consistency::{
    ConsistencyGuard, ConsistencyQuery, Epoch, KeepLocalView, RefreshDecision, RefreshOutcome,
};
pub use effect::{Effect, UploadSubmission, Visibility};
pub use job::{
    apply, apply_stream_error, reconcile_stream_end, FileState, JobId, StatusUpdate, UploadFile,
    UploadJob, COMPLETE_STATE, QUEUED_SUMMARY,
};
pub use msg::{Msg, UploadOptions};
pub use selection::{
    default_merge_name, derive_title, selection_key, AutoNamedField, MergePlan, MergeSelection,
    MergeValidationError, MigrationSelection, SelectionError, MERGE_LIMIT, MERGE_MINIMUM,
};
pub use state::AppState;
pub use update::update;
pub use view_model::{AppViewModel, FileRowView, JobRowView};
