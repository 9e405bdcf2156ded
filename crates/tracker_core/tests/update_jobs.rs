use std::sync::Once;

use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use tracker_core::{
    update, AppState, Effect, FileState, Msg, StatusUpdate, SubscriptionId, QUEUED_SUMMARY,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tracker_logging::initialize_for_tests);
}

fn at(offset_secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::seconds(offset_secs)
}

fn accept(state: AppState, job_id: &str, total_files: i64) -> (AppState, SubscriptionId) {
    let (state, effects) = update(
        state,
        Msg::UploadAccepted {
            job_id: job_id.to_string(),
            total_files,
            at: at(0),
        },
    );
    let subscription = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::OpenJobStream { subscription, .. } => Some(*subscription),
            _ => None,
        })
        .expect("open stream effect");
    (state, subscription)
}

fn frame(
    state: AppState,
    job_id: &str,
    subscription: SubscriptionId,
    update_fields: StatusUpdate,
) -> AppState {
    let (state, effects) = update(
        state,
        Msg::JobFrame {
            job_id: job_id.to_string(),
            subscription,
            update: update_fields,
            at: at(1),
        },
    );
    assert!(effects.is_empty());
    state
}

fn file(path: &str, state: &str, percent: Option<i64>) -> StatusUpdate {
    StatusUpdate {
        state: state.to_string(),
        file_path: path.to_string(),
        percent,
        ..StatusUpdate::default()
    }
}

#[test]
fn two_file_upload_completes_with_one_success_and_one_error() {
    init_logging();
    let (state, subscription) = accept(AppState::new(), "job-1", 2);
    let job = state.jobs().get("job-1").unwrap();
    assert_eq!(job.total_files, 2);
    assert_eq!(job.summary_message, QUEUED_SUMMARY);
    assert!(!job.is_complete);

    let state = frame(state, "job-1", subscription, file("a", "success", Some(100)));
    let job = state.jobs().get("job-1").unwrap();
    assert_eq!(job.finished_files, 1);
    assert!(!job.is_complete);

    let mut failed = file("b", "error", None);
    failed.error = Some("disk full".to_string());
    let state = frame(state, "job-1", subscription, failed);

    let view = state.view();
    let row = &view.jobs[0];
    assert_eq!(row.finished_files, 2);
    assert!(row.is_complete);
    assert_eq!(row.overall_percent, 100);
    assert_eq!(row.succeeded, 1);
    assert_eq!(row.failed, 1);
    assert_eq!(row.files[1].error.as_deref(), Some("disk full"));
    assert_eq!(row.completed_at, Some(at(1)));
}

#[test]
fn all_terminal_files_matching_total_complete_the_job() {
    let (mut state, subscription) = accept(AppState::new(), "job", 3);
    for (path, outcome) in [("x", "success"), ("y", "error"), ("z", "success")] {
        state = frame(state, "job", subscription, file(path, "uploading", Some(30)));
        state = frame(state, "job", subscription, file(path, outcome, Some(100)));
    }
    let job = state.jobs().get("job").unwrap();
    assert!(job.is_complete);
    assert_eq!(job.overall_percent, 100);
    assert!(state.is_settled());
}

#[test]
fn overall_percent_never_regresses() {
    let (mut state, subscription) = accept(AppState::new(), "job", 2);
    let sequence = vec![
        file("a", "uploading", Some(80)),
        file("b", "uploading", Some(10)),
        // A late "queued" echo for a file already past the midpoint.
        file("a", "queued", Some(0)),
        StatusUpdate {
            total_files: Some(5),
            ..StatusUpdate::default()
        },
        file("c", "uploading", Some(5)),
        file("a", "success", Some(100)),
        StatusUpdate {
            finished_files: Some(0),
            ..StatusUpdate::default()
        },
        file("b", "success", Some(100)),
    ];

    let mut previous = 0;
    for update_fields in sequence {
        state = frame(state, "job", subscription, update_fields);
        let percent = state.jobs().get("job").unwrap().overall_percent;
        assert!(
            percent >= previous,
            "percent regressed from {previous} to {percent}"
        );
        previous = percent;
    }
}

#[test]
fn explicit_complete_state_finishes_the_job() {
    let (state, subscription) = accept(AppState::new(), "job", 4);
    let state = frame(state, "job", subscription, file("a", "uploading", Some(50)));
    let state = frame(
        state,
        "job",
        subscription,
        StatusUpdate {
            state: "complete".to_string(),
            message: "All done".to_string(),
            ..StatusUpdate::default()
        },
    );
    let job = state.jobs().get("job").unwrap();
    assert!(job.is_complete);
    assert_eq!(job.overall_percent, 100);
    assert_eq!(job.summary_message, "All done");
    assert_eq!(job.file("a").unwrap().state, FileState::Uploading);
}

#[test]
fn stream_end_completes_only_when_every_file_is_terminal() {
    let (state, subscription) = accept(AppState::new(), "done", 0);
    let state = frame(state, "done", subscription, file("a", "success", Some(100)));
    let state = frame(state, "done", subscription, file("b", "error", Some(20)));
    let (state, _) = update(
        state,
        Msg::JobStreamEnded {
            job_id: "done".to_string(),
            subscription,
            at: at(5),
        },
    );
    let job = state.jobs().get("done").unwrap();
    assert!(job.is_complete);
    assert_eq!(job.finished_files, 2);
    assert_eq!(job.overall_percent, 100);

    let (state, subscription) = accept(state, "stuck", 2);
    let state = frame(state, "stuck", subscription, file("a", "uploading", Some(60)));
    let (state, _) = update(
        state,
        Msg::JobStreamEnded {
            job_id: "stuck".to_string(),
            subscription,
            at: at(5),
        },
    );
    let job = state.jobs().get("stuck").unwrap();
    assert!(!job.is_complete);
    assert_eq!(job.overall_percent, 30);
    assert_eq!(state.view().active_jobs, 1);
    // Stuck, but no stream is left that could finish it.
    assert!(state.is_settled());

    // Stream end with no files at all also leaves the job open.
    let (state, subscription) = accept(state, "empty", 1);
    let (state, _) = update(
        state,
        Msg::JobStreamEnded {
            job_id: "empty".to_string(),
            subscription,
            at: at(5),
        },
    );
    assert!(!state.jobs().get("empty").unwrap().is_complete);
}

#[test]
fn stream_error_folds_into_terminal_state_for_that_job_only() {
    let (state, first) = accept(AppState::new(), "one", 1);
    let (state, second) = accept(state, "two", 1);
    let state = frame(state, "two", second, file("b", "uploading", Some(40)));

    let (state, _) = update(
        state,
        Msg::JobStreamFailed {
            job_id: "one".to_string(),
            subscription: first,
            message: "connection reset".to_string(),
            at: at(3),
        },
    );

    let one = state.jobs().get("one").unwrap();
    assert!(one.is_complete);
    assert_eq!(one.overall_percent, 100);
    assert_eq!(one.summary_message, "stream error: connection reset");

    let two = state.jobs().get("two").unwrap();
    assert!(!two.is_complete);
    assert_eq!(two.overall_percent, 40);
}

#[test]
fn jobs_are_listed_most_recent_first_and_updated_in_place() {
    let (state, first) = accept(AppState::new(), "first", 1);
    let (state, _second) = accept(state, "second", 1);
    let (state, _third) = accept(state, "third", 1);
    let state = frame(state, "first", first, file("a", "uploading", Some(10)));

    let ids: Vec<_> = state.view().jobs.iter().map(|j| j.job_id.clone()).collect();
    assert_eq!(ids, vec!["third", "second", "first"]);
    assert_eq!(state.view().jobs[2].overall_percent, 10);
}

#[test]
fn restarting_a_job_cancels_the_previous_subscription() {
    let (state, old) = accept(AppState::new(), "job", 1);
    let state = frame(state, "job", old, file("a", "uploading", Some(70)));

    let (state, effects) = update(
        state,
        Msg::WatchRequested {
            job_id: "job".to_string(),
            total_files_hint: 1,
            at: at(10),
        },
    );
    let new = match effects.as_slice() {
        [Effect::CloseJobStream { job_id }, Effect::OpenJobStream {
            job_id: reopened,
            subscription,
        }] => {
            assert_eq!(job_id, "job");
            assert_eq!(reopened, "job");
            *subscription
        }
        other => panic!("unexpected effects: {other:?}"),
    };
    assert_ne!(old, new);
    assert_eq!(state.view().job_count, 1);

    // A frame already in flight from the cancelled stream is ignored.
    let (mut state, _) = update(
        state,
        Msg::JobFrame {
            job_id: "job".to_string(),
            subscription: old,
            update: file("a", "success", Some(100)),
            at: at(11),
        },
    );
    assert!(state.consume_dirty());
    let (mut state, _) = update(
        state,
        Msg::JobFrame {
            job_id: "job".to_string(),
            subscription: old,
            update: file("a", "success", Some(100)),
            at: at(12),
        },
    );
    assert!(!state.consume_dirty());
    assert_eq!(state.jobs().get("job").unwrap().file_count(), 0);
}

#[test]
fn shutdown_closes_every_stream_and_ignores_late_frames() {
    let (state, first) = accept(AppState::new(), "a", 1);
    let (state, _) = accept(state, "b", 1);

    let (state, effects) = update(state, Msg::Shutdown);
    assert_eq!(effects, vec![Effect::CloseAllStreams]);
    assert_eq!(state.jobs().subscription("a"), None);

    let state = frame(state, "a", first, file("x", "success", Some(100)));
    assert_eq!(state.jobs().get("a").unwrap().file_count(), 0);
}

#[test]
fn stop_watching_closes_only_that_stream() {
    let (state, _) = accept(AppState::new(), "a", 1);
    let (state, _) = accept(state, "b", 1);

    let (state, effects) = update(state, Msg::StopWatching("a".to_string()));
    assert_eq!(
        effects,
        vec![Effect::CloseJobStream {
            job_id: "a".to_string()
        }]
    );
    assert!(state.jobs().subscription("b").is_some());

    let (_state, effects) = update(state, Msg::StopWatching("a".to_string()));
    assert!(effects.is_empty());
}
