use std::fmt::Display;

use chrono::{DateTime, Utc};
use tracker_logging::{tracker_debug, tracker_info, tracker_warn};

use crate::{
    AppState, Effect, JobId, Msg, RefreshDecision, RefreshOutcome, SelectionError,
    UploadSubmission,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FilesListed(available) => {
            state.merge.retain_existing(&available);
            state.migration.retain_existing(&available);
            state.mark_dirty();
            refresh_keep_local(&mut state, false)
        }
        Msg::MergeClipAdded(path) => {
            match state.merge.add(path) {
                Ok(()) => state.mark_dirty(),
                Err(err) => reject(&mut state, err),
            }
            Vec::new()
        }
        Msg::MergeClipRemoved(index) => {
            match state.merge.remove_at(index) {
                Ok(_) => state.mark_dirty(),
                Err(err) => reject(&mut state, err),
            }
            Vec::new()
        }
        Msg::MergeClipMovedLeft(index) => {
            state.merge.move_left(index);
            state.mark_dirty();
            Vec::new()
        }
        Msg::MergeClipMovedRight(index) => {
            state.merge.move_right(index);
            state.mark_dirty();
            Vec::new()
        }
        Msg::MergeNameEdited(name) => {
            state.merge.set_output_name(name);
            state.mark_dirty();
            Vec::new()
        }
        Msg::MergeRequested { archive_originals } => {
            if state.is_busy() {
                reject(&mut state, SelectionError::Busy);
                return (state, Vec::new());
            }
            match state.merge.validate_for_submit() {
                Ok(plan) => {
                    state.pending.merge = true;
                    state.mark_dirty();
                    vec![Effect::SubmitMerge {
                        paths: plan.paths,
                        new_name: plan.new_name,
                        archive_originals,
                    }]
                }
                Err(err) => {
                    reject(&mut state, err);
                    Vec::new()
                }
            }
        }
        Msg::MergeFinished(result) => {
            state.pending.merge = false;
            match result {
                Ok(merged_path) => {
                    state.merge.clear();
                    state.set_notice(format!("merged into {merged_path}"));
                }
                Err(message) => state.set_notice(format!("merge failed: {message}")),
            }
            Vec::new()
        }
        Msg::MigrationToggled(path) => {
            state.migration.toggle(path);
            state.mark_dirty();
            refresh_keep_local(&mut state, false)
        }
        Msg::UploadNameEdited(name) => {
            match state.migration.set_upload_name(name) {
                Ok(()) => state.mark_dirty(),
                Err(err) => reject(&mut state, err),
            }
            Vec::new()
        }
        Msg::UploadRequested(options) => {
            if state.is_busy() {
                reject(&mut state, SelectionError::Busy);
                return (state, Vec::new());
            }
            if state.migration.is_empty() {
                reject(&mut state, SelectionError::EmptySelection);
                return (state, Vec::new());
            }
            state.pending.upload = true;
            state.mark_dirty();
            vec![Effect::SubmitUpload(UploadSubmission {
                target_files: state.migration.to_vec(),
                migrate_files: options.migrate_files,
                made_for_kids: options.made_for_kids,
                visibility: options.visibility,
                upload_name: state.migration.effective_upload_name(),
            })]
        }
        Msg::UploadAccepted {
            job_id,
            total_files,
            at,
        } => {
            state.pending.upload = false;
            state.set_notice(format!("upload job {job_id} started"));
            start_job(&mut state, job_id, total_files, at)
        }
        Msg::UploadRejected(message) => {
            state.pending.upload = false;
            state.set_notice(format!("upload failed: {message}"));
            Vec::new()
        }
        Msg::WatchRequested {
            job_id,
            total_files_hint,
            at,
        } => start_job(&mut state, job_id, total_files_hint, at),
        Msg::StopWatching(job_id) => {
            if state.board.detach(&job_id).is_some() {
                state.mark_dirty();
                vec![Effect::CloseJobStream { job_id }]
            } else {
                Vec::new()
            }
        }
        Msg::JobFrame {
            job_id,
            subscription,
            update: status,
            at,
        } => {
            let was_complete = is_complete(&state, &job_id);
            if state.board.apply(&job_id, subscription, &status, at) {
                state.mark_dirty();
                if !was_complete && is_complete(&state, &job_id) {
                    tracker_info!("Job {} complete", job_id);
                }
            } else {
                tracker_debug!(
                    "Ignoring frame for job {} from subscription {}",
                    job_id,
                    subscription
                );
            }
            Vec::new()
        }
        Msg::JobStreamEnded {
            job_id,
            subscription,
            at,
        } => {
            if state.board.stream_ended(&job_id, subscription, at) {
                state.mark_dirty();
                if !is_complete(&state, &job_id) {
                    tracker_warn!("Stream for job {} ended with unfinished files", job_id);
                }
            }
            Vec::new()
        }
        Msg::JobStreamFailed {
            job_id,
            subscription,
            message,
            at,
        } => {
            if state.board.stream_failed(&job_id, subscription, &message, at) {
                tracker_warn!("Stream for job {} failed: {}", job_id, message);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::KeepLocalRefreshRequested { force } => refresh_keep_local(&mut state, force),
        Msg::KeepLocalResolved { epoch, result } => {
            match state.keep_local.resolve(epoch, result) {
                RefreshOutcome::Stale => {
                    tracker_debug!("Discarding superseded keep-local response (epoch {})", epoch);
                }
                RefreshOutcome::Applied(_) => state.mark_dirty(),
                RefreshOutcome::Failed(message) => {
                    state.set_notice(format!("keep-local lookup failed: {message}"));
                }
            }
            Vec::new()
        }
        Msg::KeepLocalDesignated(designation) => {
            if state.is_busy() {
                reject(&mut state, SelectionError::Busy);
                return (state, Vec::new());
            }
            if state.migration.is_empty() {
                reject(&mut state, SelectionError::EmptySelection);
                return (state, Vec::new());
            }
            state.pending.designation = true;
            state.mark_dirty();
            vec![Effect::SetKeepLocal {
                paths: state.migration.to_vec(),
                designation,
            }]
        }
        Msg::KeepLocalDesignationFinished(result) => {
            state.pending.designation = false;
            match result {
                Ok(()) => {
                    state.mark_dirty();
                    refresh_keep_local(&mut state, true)
                }
                Err(message) => {
                    state.set_notice(format!("keep-local update failed: {message}"));
                    Vec::new()
                }
            }
        }
        Msg::Shutdown => {
            let detached = state.board.detach_all();
            tracker_debug!("Shutting down with {} open streams", detached.len());
            state.keep_local.invalidate();
            state.mark_dirty();
            vec![Effect::CloseAllStreams]
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_job(state: &mut AppState, job_id: JobId, total_files: i64, at: DateTime<Utc>) -> Vec<Effect> {
    let subscription = state.allocate_subscription();
    let mut effects = Vec::with_capacity(2);
    if state.board.start(&job_id, total_files, subscription, at).is_some() {
        effects.push(Effect::CloseJobStream {
            job_id: job_id.clone(),
        });
    }
    effects.push(Effect::OpenJobStream {
        job_id,
        subscription,
    });
    state.mark_dirty();
    effects
}

fn refresh_keep_local(state: &mut AppState, force: bool) -> Vec<Effect> {
    match state.keep_local.refresh(state.migration.paths(), force) {
        RefreshDecision::Cleared => {
            state.mark_dirty();
            Vec::new()
        }
        RefreshDecision::Unchanged => Vec::new(),
        RefreshDecision::Issue(query) => {
            state.mark_dirty();
            vec![Effect::QueryKeepLocal {
                epoch: query.epoch,
                paths: query.paths,
            }]
        }
    }
}

fn is_complete(state: &AppState, job_id: &str) -> bool {
    state
        .board
        .get(job_id)
        .is_some_and(|job| job.is_complete)
}

fn reject(state: &mut AppState, err: impl Display) {
    tracker_debug!("Rejected: {}", err);
    state.set_notice(err.to_string());
}
