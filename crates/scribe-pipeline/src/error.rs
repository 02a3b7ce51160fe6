//! Pipeline error types.

use thiserror::Error;

use scribe_worker::WorkerError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors returned to callers of the orchestrator.
///
/// Step failures are not errors here; they are recorded in the execution
/// result or on the background job.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job error: {0}")]
    Worker(#[from] WorkerError),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<validator::ValidationErrors> for PipelineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
