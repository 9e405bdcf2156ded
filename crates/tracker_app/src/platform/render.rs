//! Plain-text rendering of the view model for the terminal.
use std::collections::HashMap;

use tracker_core::{AppViewModel, JobRowView, KeepLocalView};

/// Remembers what was last printed so only changed blocks are printed again.
#[derive(Debug, Default)]
pub struct Renderer {
    jobs: HashMap<String, String>,
    notice: Option<String>,
    keep_local: Option<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &AppViewModel) -> Vec<String> {
        let mut out = Vec::new();

        if view.notice != self.notice {
            if let Some(notice) = &view.notice {
                out.push(format!("note: {notice}"));
            }
            self.notice = view.notice.clone();
        }

        // Oldest first, so the newest job ends up at the bottom of the terminal.
        for row in view.jobs.iter().rev() {
            let block = job_block(row);
            if self.jobs.get(&row.job_id) != Some(&block) {
                out.push(block.clone());
                self.jobs.insert(row.job_id.clone(), block);
            }
        }

        let keep_local = keep_local_line(&view.keep_local, &view.migration_paths);
        if keep_local != self.keep_local {
            if let Some(line) = &keep_local {
                out.push(line.clone());
            }
            self.keep_local = keep_local;
        }

        out
    }
}

pub fn job_block(row: &JobRowView) -> String {
    let status = if row.is_complete { "complete" } else { "active" };
    let mut block = format!(
        "[job {}] {} {:>3}% ({}/{} finished, {} ok, {} failed) {}",
        row.job_id,
        status,
        row.overall_percent,
        row.finished_files,
        row.total_files,
        row.succeeded,
        row.failed,
        row.summary
    );
    if let Some(done) = row.completed_at {
        block.push_str(&format!(" at {}", done.to_rfc3339()));
    }
    for file in &row.files {
        block.push_str(&format!(
            "\n    {:<9} {:>3}%  {}",
            file.state.label(),
            file.percent,
            file.file_path
        ));
        if !file.message.is_empty() {
            block.push_str(&format!("  {}", file.message));
        }
        if let Some(error) = &file.error {
            block.push_str(&format!("  error: {error}"));
        }
    }
    block.trim_end().to_string()
}

fn keep_local_line(view: &KeepLocalView, paths: &[String]) -> Option<String> {
    if paths.is_empty() || view.loading {
        return None;
    }
    let value = match view.shared_value {
        Some(true) => "on",
        Some(false) => "off",
        None => "mixed",
    };
    Some(format!("keep-local for {} file(s): {value}", paths.len()))
}
