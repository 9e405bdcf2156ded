use crate::view_model::{AppViewModel, JobRowView};
use crate::{ConsistencyGuard, JobBoard, MergeSelection, MigrationSelection, SubscriptionId};

/// In-flight requests that make the state busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Pending {
    pub(crate) upload: bool,
    pub(crate) merge: bool,
    pub(crate) designation: bool,
}

impl Pending {
    fn any(self) -> bool {
        self.upload || self.merge || self.designation
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub(crate) board: JobBoard,
    pub(crate) merge: MergeSelection,
    pub(crate) migration: MigrationSelection,
    pub(crate) keep_local: ConsistencyGuard,
    pub(crate) pending: Pending,
    next_subscription: SubscriptionId,
    notice: Option<String>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            jobs: self.board.jobs().map(JobRowView::from).collect(),
            job_count: self.board.len(),
            active_jobs: self.board.jobs().filter(|job| !job.is_complete).count(),
            merge_paths: self.merge.paths().to_vec(),
            merge_name: self.merge.output_name().to_string(),
            migration_paths: self.migration.to_vec(),
            upload_name: self.migration.upload_name().to_string(),
            upload_name_editable: self.migration.upload_name_editable(),
            keep_local: self.keep_local.view(),
            busy: self.is_busy(),
            notice: self.notice.clone(),
            dirty: self.dirty,
        }
    }

    pub fn jobs(&self) -> &JobBoard {
        &self.board
    }

    pub fn merge_selection(&self) -> &MergeSelection {
        &self.merge
    }

    pub fn migration_selection(&self) -> &MigrationSelection {
        &self.migration
    }

    pub fn keep_local(&self) -> &ConsistencyGuard {
        &self.keep_local
    }

    pub fn is_busy(&self) -> bool {
        self.pending.any()
    }

    /// Nothing left to wait for: no submissions in flight, no unfinished job
    /// with an open stream, no keep-local query loading.
    pub fn is_settled(&self) -> bool {
        !self.is_busy() && !self.board.has_active_jobs() && !self.keep_local.view().loading
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Returns whether anything changed since the last call and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
        self.dirty = true;
    }

    pub(crate) fn allocate_subscription(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        self.next_subscription
    }
}
