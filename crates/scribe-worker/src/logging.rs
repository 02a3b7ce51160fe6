//! Structured logging for background jobs.

use std::time::Instant;

use tracing::{error, info, info_span, warn, Span};

use scribe_models::{BackgroundJob, JobType};

/// Logger bound to one claimed job.
///
/// Events carry the job id and video id; terminal events add the time spent
/// since the logger was created. [`span`](Self::span) gives the same context
/// to events raised by adapters while the job runs.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    job_type: JobType,
    video_id: String,
    started: Instant,
}

impl JobLogger {
    pub fn for_job(job: &BackgroundJob) -> Self {
        Self {
            job_id: job.id.to_string(),
            job_type: job.job_type,
            video_id: job.video_id.to_string(),
            started: Instant::now(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            video_id = %self.video_id,
            "{}", message
        );
    }

    /// A checkpoint inside the job, tagged with the stage it belongs to.
    pub fn log_step(&self, step: &str, message: &str) {
        info!(job_id = %self.job_id, video_id = %self.video_id, step, "{}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, video_id = %self.video_id, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            video_id = %self.video_id,
            elapsed_ms = self.elapsed_ms(),
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            job_type = %self.job_type,
            video_id = %self.video_id,
            elapsed_ms = self.elapsed_ms(),
            "{}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn span(&self) -> Span {
        info_span!(
            "job",
            job_id = %self.job_id,
            job_type = %self.job_type,
            video_id = %self.video_id
        )
    }
}
