use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{JobError, can_transition};
use crate::core::citations::ResearchResult;
use crate::core::progress::ProgressSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_time: Option<DateTime<Utc>>,
    pub query: String,
    pub model: String,
    pub max_tool_calls: u32,
    pub progress: ProgressSnapshot,
    /// Last time `progress` counters advanced.
    pub last_progress_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResearchResult>,
}

impl Job {
    pub fn new(
        id: String,
        query: String,
        model: String,
        max_tool_calls: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            start_time: now,
            completed_time: None,
            failed_time: None,
            cancelled_time: None,
            query,
            model,
            max_tool_calls,
            progress: ProgressSnapshot::placeholder(),
            last_progress_at: now,
            error: None,
            result: None,
        }
    }

    pub fn transition(&mut self, to: JobStatus, at: DateTime<Utc>) -> Result<(), JobError> {
        if !can_transition(self.status, to) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        match to {
            JobStatus::Completed => self.completed_time = Some(at),
            JobStatus::Failed => self.failed_time = Some(at),
            JobStatus::Cancelled => self.cancelled_time = Some(at),
            JobStatus::Pending | JobStatus::InProgress => {}
        }
        self.status = to;
        Ok(())
    }

    /// Replace the cached snapshot. A snapshot whose tool-call count is
    /// lower than the stored one is ignored. Returns whether counters advanced.
    pub fn apply_progress(&mut self, snapshot: ProgressSnapshot, at: DateTime<Utc>) -> bool {
        if snapshot.tool_calls_count < self.progress.tool_calls_count {
            return false;
        }
        let advanced = snapshot.tool_calls_count > self.progress.tool_calls_count
            || snapshot.details != self.progress.details;
        if advanced {
            self.last_progress_at = at;
        }
        self.progress = snapshot;
        advanced
    }

    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Option<Duration>) -> bool {
        match stale_after {
            Some(threshold) => {
                self.status == JobStatus::InProgress && now - self.last_progress_at > threshold
            }
            None => false,
        }
    }

    pub fn summary(&self, now: DateTime<Utc>, stale_after: Option<Duration>) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            status: self.status,
            start_time: self.start_time,
            query: self.query.clone(),
            progress: self.progress.clone(),
            stale: self.is_stale(now, stale_after),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub query: String,
    pub progress: ProgressSnapshot,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}
