//! Upload job snapshots and the pure fold that turns status updates into them.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub type JobId = String;

/// Summary a freshly started job shows until its first update arrives.
pub const QUEUED_SUMMARY: &str = "Queued";

/// Job-level state that marks the whole job as finished.
pub const COMPLETE_STATE: &str = "complete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileState {
    #[default]
    Queued,
    Uploading,
    Success,
    Error,
}

impl FileState {
    /// Maps a wire state onto a file state. Intermediate server phases
    /// (`playlist_updating`, `migrating`, ...) count as still uploading.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "queued" => FileState::Queued,
            "success" | COMPLETE_STATE => FileState::Success,
            "error" => FileState::Error,
            _ => FileState::Uploading,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Success | FileState::Error)
    }

    pub fn label(self) -> &'static str {
        match self {
            FileState::Queued => "queued",
            FileState::Uploading => "uploading",
            FileState::Success => "success",
            FileState::Error => "error",
        }
    }
}

/// One decoded status payload from a job's event stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusUpdate {
    pub state: String,
    pub message: String,
    pub total_files: Option<i64>,
    pub finished_files: Option<i64>,
    pub file_path: String,
    pub percent: Option<i64>,
    pub error: Option<String>,
}

impl StatusUpdate {
    /// Reads the known fields out of a frame payload. Unknown keys are ignored
    /// and fields of the wrong type are treated as absent.
    pub fn from_json(payload: &Map<String, Value>) -> Self {
        Self {
            state: string_field(payload, "state").unwrap_or_default(),
            message: string_field(payload, "message").unwrap_or_default(),
            total_files: int_field(payload, "total_files"),
            finished_files: int_field(payload, "finished_files"),
            file_path: string_field(payload, "file_path").unwrap_or_default(),
            percent: int_field(payload, "percent"),
            error: string_field(payload, "error"),
        }
    }

    pub fn is_complete_signal(&self) -> bool {
        self.state.trim().eq_ignore_ascii_case(COMPLETE_STATE)
    }
}

fn string_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn int_field(payload: &Map<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.round() as i64)),
        Value::String(text) => text.trim().parse::<f64>().ok().map(|value| value.round() as i64),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_path: String,
    pub state: FileState,
    pub percent: u8,
    pub message: String,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UploadFile {
    fn new(file_path: String, at: DateTime<Utc>) -> Self {
        Self {
            file_path,
            state: FileState::Queued,
            percent: 0,
            message: String::new(),
            error: None,
            updated_at: at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
    pub is_complete: bool,
    pub total_files: i64,
    pub finished_files: i64,
    pub overall_percent: u8,
    pub summary_message: String,
    pub completed_at: Option<DateTime<Utc>>,
    files: Vec<UploadFile>,
    file_index: HashMap<String, usize>,
}

impl UploadJob {
    pub fn new(job_id: impl Into<JobId>, total_files_hint: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            created_at,
            is_complete: false,
            total_files: total_files_hint.max(0),
            finished_files: 0,
            overall_percent: 0,
            summary_message: QUEUED_SUMMARY.to_string(),
            completed_at: None,
            files: Vec::new(),
            file_index: HashMap::new(),
        }
    }

    /// Files in the order their first update arrived.
    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn file(&self, file_path: &str) -> Option<&UploadFile> {
        self.file_index
            .get(file_path)
            .and_then(|&index| self.files.get(index))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn terminal_count(&self) -> usize {
        self.files.iter().filter(|file| file.is_terminal()).count()
    }

    pub fn count_in_state(&self, state: FileState) -> usize {
        self.files.iter().filter(|file| file.state == state).count()
    }

    pub fn all_files_terminal(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(UploadFile::is_terminal)
    }

    fn file_mut_or_insert(&mut self, file_path: &str, at: DateTime<Utc>) -> &mut UploadFile {
        let index = match self.file_index.get(file_path) {
            Some(&index) => index,
            None => {
                let index = self.files.len();
                self.files.push(UploadFile::new(file_path.to_string(), at));
                self.file_index.insert(file_path.to_string(), index);
                index
            }
        };
        &mut self.files[index]
    }

    fn mark_complete(&mut self, at: DateTime<Utc>) {
        self.is_complete = true;
        self.overall_percent = 100;
        if self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
    }
}

/// Folds one status update into a job snapshot.
pub fn apply(mut job: UploadJob, update: &StatusUpdate, at: DateTime<Utc>) -> UploadJob {
    let file_path = update.file_path.trim();
    if !file_path.is_empty() {
        let file = job.file_mut_or_insert(file_path, at);
        file.state = FileState::from_wire(&update.state);
        if let Some(percent) = update.percent {
            file.percent = clamp_percent(percent);
        }
        if !update.message.is_empty() {
            file.message = update.message.clone();
        }
        file.error = update
            .error
            .as_ref()
            .filter(|error| !error.trim().is_empty())
            .cloned();
        file.updated_at = at;
    }

    if let Some(total) = update.total_files {
        job.total_files = total;
    }
    job.finished_files = update
        .finished_files
        .unwrap_or(job.terminal_count() as i64);

    let reached_total = job.total_files > 0 && job.finished_files >= job.total_files;
    if !update.message.is_empty() {
        job.summary_message = update.message.clone();
    }

    if job.is_complete || update.is_complete_signal() || reached_total {
        job.mark_complete(at);
    } else {
        job.overall_percent = job.overall_percent.max(estimate_percent(&job));
    }
    job
}

/// Reconciles a job whose stream ended without an explicit completion signal.
///
/// The job is completed only when every tracked file is terminal; otherwise it
/// is returned untouched and stays visibly unfinished.
pub fn reconcile_stream_end(mut job: UploadJob, at: DateTime<Utc>) -> UploadJob {
    if job.is_complete || !job.all_files_terminal() {
        return job;
    }
    job.finished_files = job.total_files.max(job.file_count() as i64);
    job.mark_complete(at);
    job
}

/// Folds a transport failure into the job as a terminal state.
pub fn apply_stream_error(mut job: UploadJob, message: &str, at: DateTime<Utc>) -> UploadJob {
    if job.is_complete {
        return job;
    }
    job.summary_message = format!("stream error: {message}");
    job.mark_complete(at);
    job
}

fn estimate_percent(job: &UploadJob) -> u8 {
    let file_count = job.file_count() as i64;
    let denominator = job.total_files.max(file_count);
    let average = if denominator > 0 {
        let sum: i64 = job.files.iter().map(|file| i64::from(file.percent)).sum();
        (sum as f64 / denominator as f64).round() as i64
    } else {
        0
    };
    let finished_ratio = if job.total_files > 0 {
        (100.0 * job.finished_files as f64 / job.total_files as f64).round() as i64
    } else {
        0
    };
    clamp_percent(average.max(finished_ratio))
}

fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}
