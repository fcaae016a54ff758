mod cleanup;
mod error;
mod manager;
mod request;
mod store;
pub mod types;

pub use cleanup::{CleanupPolicy, CleanupScheduler, sweep_expired};
pub use error::JobError;
pub use manager::{JobSettings, ResearchManager, SyncReply};
pub use request::{ClarificationValue, CustomSource, ResearchRequest, preview_query};
pub use store::JobStore;
pub use types::{Job, JobStatus, JobSummary};

pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    match from {
        JobStatus::Pending => matches!(
            to,
            JobStatus::InProgress | JobStatus::Failed | JobStatus::Cancelled
        ),
        JobStatus::InProgress => matches!(
            to,
            JobStatus::InProgress
                | JobStatus::Completed
                | JobStatus::Failed
                | JobStatus::Cancelled
        ),
        JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => false,
    }
}

#[cfg(test)]
mod tests;
