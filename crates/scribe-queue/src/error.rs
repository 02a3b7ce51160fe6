//! Queue error types.

use thiserror::Error;

use scribe_models::{JobId, JobStatus};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job already queued: {0}")]
    DuplicateJob(JobId),

    #[error("Job {id} is {status}, only pending jobs can be enqueued")]
    NotPending { id: JobId, status: JobStatus },

    #[error("Queue is full ({0} jobs)")]
    QueueFull(usize),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job update rejected: {0}")]
    UpdateRejected(String),
}

impl QueueError {
    pub fn update_rejected(msg: impl Into<String>) -> Self {
        Self::UpdateRejected(msg.into())
    }
}
