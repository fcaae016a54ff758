use chrono::Utc;

use crate::core::jobs::{JobError, JobStatus, can_transition};

use super::job_at;

#[test]
fn happy_path_transitions_are_allowed() {
    let path = [
        (JobStatus::Pending, JobStatus::InProgress),
        (JobStatus::InProgress, JobStatus::InProgress),
        (JobStatus::InProgress, JobStatus::Completed),
    ];
    for (from, to) in path {
        assert!(
            can_transition(from, to),
            "expected transition {:?} -> {:?} to be allowed",
            from,
            to
        );
    }
}

#[test]
fn cancel_and_failure_are_allowed_from_live_states() {
    for from in [JobStatus::Pending, JobStatus::InProgress] {
        assert!(can_transition(from, JobStatus::Cancelled));
        assert!(can_transition(from, JobStatus::Failed));
    }
    assert!(!can_transition(JobStatus::Pending, JobStatus::Completed));
}

#[test]
fn terminal_states_are_final() {
    let terminal = [
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];
    let all = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];
    for from in terminal {
        assert!(from.is_terminal());
        for to in all {
            assert!(
                !can_transition(from, to),
                "terminal {:?} must not move to {:?}",
                from,
                to
            );
        }
    }
}

#[test]
fn transition_stamps_terminal_time_once() {
    let now = Utc::now();
    let mut job = job_at("resp_1", now);
    job.transition(JobStatus::InProgress, now).unwrap();
    job.transition(JobStatus::Completed, now).unwrap();
    assert_eq!(job.completed_time, Some(now));
    assert!(job.failed_time.is_none());
    assert!(job.cancelled_time.is_none());

    let err = job.transition(JobStatus::Cancelled, now).unwrap_err();
    assert!(matches!(
        err,
        JobError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Cancelled
        }
    ));
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.cancelled_time.is_none());
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_value(JobStatus::InProgress).unwrap(),
        serde_json::json!("in_progress")
    );
    assert_eq!(JobStatus::Cancelled.as_str(), "cancelled");
}
