mod state_machine;
mod store;

use chrono::{DateTime, Utc};

use crate::core::jobs::{Job, JobSettings};

pub(super) fn settings() -> JobSettings {
    JobSettings {
        default_model: "o4-mini-deep-research".to_string(),
        default_max_tool_calls: 30,
        query_preview_chars: 100,
        stale_after: None,
    }
}

pub(super) fn job_at(id: &str, start: DateTime<Utc>) -> Job {
    Job::new(
        id.to_string(),
        format!("query for {}", id),
        "o4-mini-deep-research".to_string(),
        30,
        start,
    )
}
