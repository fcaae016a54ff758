use thiserror::Error;

use super::JobStatus;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid job state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl JobError {
    pub fn upstream(err: anyhow::Error) -> Self {
        JobError::Upstream(err.to_string())
    }
}
