//! Pipeline and job metrics.
//!
//! - Step counters by step and outcome, with duration histograms
//! - Retry counters per step
//! - Pipeline run counters by outcome
//! - Job counters by type and terminal status, with duration histograms

use metrics::{counter, histogram};

use scribe_models::{JobStatus, JobType, PipelineStep};

/// Metric name constants for consistency.
pub mod names {
    /// Executed pipeline steps by step and status.
    pub const STEPS_TOTAL: &str = "scribe_pipeline_steps_total";

    /// Step duration in seconds (all attempts) by step.
    pub const STEP_DURATION_SECONDS: &str = "scribe_pipeline_step_duration_seconds";

    /// Retried attempts by step.
    pub const STEP_RETRIES_TOTAL: &str = "scribe_pipeline_step_retries_total";

    /// Synchronous pipeline runs by status.
    pub const RUNS_TOTAL: &str = "scribe_pipeline_runs_total";

    /// Synchronous pipeline run duration in seconds.
    pub const RUN_DURATION_SECONDS: &str = "scribe_pipeline_run_duration_seconds";

    /// Finished background jobs by type and status.
    pub const JOBS_TOTAL: &str = "scribe_jobs_total";

    /// Background job duration in seconds by type.
    pub const JOB_DURATION_SECONDS: &str = "scribe_job_duration_seconds";
}

/// Record a finished step.
pub fn record_step(step: PipelineStep, success: bool, duration_ms: u64, retries: u32) {
    let status = if success { "success" } else { "failure" };

    counter!(
        names::STEPS_TOTAL,
        "step" => step.as_str(),
        "status" => status
    )
    .increment(1);

    histogram!(
        names::STEP_DURATION_SECONDS,
        "step" => step.as_str()
    )
    .record(duration_ms as f64 / 1000.0);

    if retries > 0 {
        counter!(names::STEP_RETRIES_TOTAL, "step" => step.as_str()).increment(u64::from(retries));
    }
}

/// Record a finished synchronous run.
pub fn record_run(success: bool, duration_ms: u64) {
    let status = if success { "success" } else { "failure" };
    counter!(names::RUNS_TOTAL, "status" => status).increment(1);
    histogram!(names::RUN_DURATION_SECONDS).record(duration_ms as f64 / 1000.0);
}

/// Record a job that reached a terminal status.
pub fn record_job(job_type: JobType, status: JobStatus, duration_secs: f64) {
    counter!(
        names::JOBS_TOTAL,
        "job_type" => job_type.as_str(),
        "status" => status.as_str()
    )
    .increment(1);

    histogram!(
        names::JOB_DURATION_SECONDS,
        "job_type" => job_type.as_str()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::STEPS_TOTAL.starts_with("scribe_"));
        assert!(names::JOBS_TOTAL.ends_with("_total"));
        assert!(names::STEP_DURATION_SECONDS.contains("seconds"));
    }
}
