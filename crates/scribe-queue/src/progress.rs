//! Per-job progress reporting.

use std::sync::Arc;

use tracing::debug;

use scribe_models::{BackgroundJob, JobId, JobPayload, JobStatus, JobUpdate};

use crate::queue::JobQueue;

/// Writer handle for one claimed job.
///
/// Processors report through this handle instead of touching the queue
/// directly. Every method returns whether the queue accepted the update.
#[derive(Clone)]
pub struct JobProgress {
    queue: Arc<JobQueue>,
    job_id: JobId,
}

impl JobProgress {
    pub fn new(queue: Arc<JobQueue>, job_id: JobId) -> Self {
        Self { queue, job_id }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Record a progress checkpoint and the step label.
    pub fn progress(&self, value: u8, step: impl Into<String>) -> bool {
        let step = step.into();
        debug!(job_id = %self.job_id, progress = value, step = %step, "Job progress");
        self.queue
            .update_job(&self.job_id, JobUpdate::progress(value).with_step(step))
    }

    /// Replace the job's payload with updated step state.
    pub fn update_payload(&self, payload: JobPayload) -> bool {
        self.queue.update_job(
            &self.job_id,
            JobUpdate {
                payload: Some(payload),
                ..Default::default()
            },
        )
    }

    pub fn set_video_url(&self, url: impl Into<String>) -> bool {
        self.queue.update_job(
            &self.job_id,
            JobUpdate {
                video_url: Some(url.into()),
                ..Default::default()
            },
        )
    }

    /// Mark the job completed at 100%.
    pub fn complete(&self) -> bool {
        self.queue.update_job(
            &self.job_id,
            JobUpdate::status(JobStatus::Completed)
                .with_progress(100)
                .with_step("completed"),
        )
    }

    /// Mark the job failed, leaving progress at the last checkpoint.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        self.queue.update_job(
            &self.job_id,
            JobUpdate::status(JobStatus::Failed).with_error(error),
        )
    }

    /// Current view of the job.
    pub fn snapshot(&self) -> Option<BackgroundJob> {
        self.queue.get_job(&self.job_id)
    }

    /// Whether the job already reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.snapshot().map_or(true, |job| job.is_terminal())
    }
}
