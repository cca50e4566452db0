//! Error types for background job operations.

use std::time::Duration;
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Errors that can occur while submitting or draining jobs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The runner no longer accepts jobs.
    #[error("background runner is shut down")]
    ShutDown,

    /// No Tokio runtime is available to run the jobs.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    /// In-flight jobs did not finish in time.
    #[error("background jobs still running after {0:?}")]
    DrainTimeout(Duration),
}

impl JobError {
    /// Create a no-runtime error.
    pub fn no_runtime(reason: impl Into<String>) -> Self {
        Self::NoRuntime(reason.into())
    }
}
