use chrono::{DateTime, Utc};

use crate::{FileState, JobId, KeepLocalView, UploadJob};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub jobs: Vec<JobRowView>,
    pub job_count: usize,
    pub active_jobs: usize,
    pub merge_paths: Vec<String>,
    pub merge_name: String,
    pub migration_paths: Vec<String>,
    pub upload_name: String,
    pub upload_name_editable: bool,
    pub keep_local: KeepLocalView,
    pub busy: bool,
    pub notice: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub summary: String,
    pub overall_percent: u8,
    pub is_complete: bool,
    pub total_files: i64,
    pub finished_files: i64,
    pub succeeded: usize,
    pub failed: usize,
    pub completed_at: Option<DateTime<Utc>>,
    pub files: Vec<FileRowView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRowView {
    pub file_path: String,
    pub state: FileState,
    pub percent: u8,
    pub message: String,
    pub error: Option<String>,
}

impl From<&UploadJob> for JobRowView {
    fn from(job: &UploadJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            summary: job.summary_message.clone(),
            overall_percent: job.overall_percent,
            is_complete: job.is_complete,
            total_files: job.total_files,
            finished_files: job.finished_files,
            succeeded: job.count_in_state(FileState::Success),
            failed: job.count_in_state(FileState::Error),
            completed_at: job.completed_at,
            files: job
                .files()
                .iter()
                .map(|file| FileRowView {
                    file_path: file.file_path.clone(),
                    state: file.state,
                    percent: file.percent,
                    message: file.message.clone(),
                    error: file.error.clone(),
                })
                .collect(),
        }
    }
}
