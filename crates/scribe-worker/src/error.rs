//! Worker error types.

use thiserror::Error;

use scribe_adapters::AdapterError;
use scribe_models::{JobType, PipelineStep};
use scribe_queue::QueueError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("{step} failed: {message}")]
    StepFailed { step: PipelineStep, message: String },

    #[error("No processor registered for job type {0}")]
    NoProcessor(JobType),

    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("Processor panicked: {0}")]
    Panicked(String),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn step_failed(step: PipelineStep, msg: impl Into<String>) -> Self {
        Self::StepFailed {
            step,
            message: msg.into(),
        }
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Adapter(e) => e.is_retryable(),
            WorkerError::StepFailed { .. } => true,
            _ => false,
        }
    }
}
