use thiserror::Error;

use crate::job::{JobId, JobStatus};

#[derive(Error, Debug)]
pub enum LocusError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job {0} not found")]
    JobNotFound(JobId),

    #[error("Job is not ready yet (status: {status})")]
    NotReady { status: JobStatus },

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Illegal job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl LocusError {
    /// Whether the caller should poll again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocusError::NotReady { .. })
    }
}

pub type Result<T> = std::result::Result<T, LocusError>;
