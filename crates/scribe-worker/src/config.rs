//! Worker configuration.

use std::time::Duration;

use crate::retry::{BackoffPolicy, StepPolicy};

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

/// Per-attempt timeouts for the external calls a run makes.
#[derive(Debug, Clone)]
pub struct StepTimeouts {
    pub download: Duration,
    pub cdn_upload: Duration,
    pub transcription: Duration,
    pub analysis: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            download: Duration::from_secs(120),
            cdn_upload: Duration::from_secs(300),
            transcription: Duration::from_secs(600),
            analysis: Duration::from_secs(120),
        }
    }
}

impl StepTimeouts {
    /// Create timeouts from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            download: env_secs("STEP_TIMEOUT_DOWNLOAD_SECS", defaults.download.as_secs()),
            cdn_upload: env_secs("STEP_TIMEOUT_CDN_UPLOAD_SECS", defaults.cdn_upload.as_secs()),
            transcription: env_secs(
                "STEP_TIMEOUT_TRANSCRIPTION_SECS",
                defaults.transcription.as_secs(),
            ),
            analysis: env_secs("STEP_TIMEOUT_ANALYSIS_SECS", defaults.analysis.as_secs()),
        }
    }

    /// Same timeout for every step.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            download: timeout,
            cdn_upload: timeout,
            transcription: timeout,
            analysis: timeout,
        }
    }
}

/// Retry budgets and backoff applied to background job steps.
#[derive(Debug, Clone)]
pub struct JobStepPolicies {
    pub timeouts: StepTimeouts,
    pub backoff: BackoffPolicy,
}

impl Default for JobStepPolicies {
    fn default() -> Self {
        Self {
            timeouts: StepTimeouts::default(),
            backoff: BackoffPolicy::long(),
        }
    }
}

impl JobStepPolicies {
    pub fn download(&self, max_retries: u32) -> StepPolicy {
        StepPolicy::new(max_retries, self.timeouts.download, self.backoff.clone())
    }

    pub fn cdn_upload(&self, max_retries: u32) -> StepPolicy {
        StepPolicy::new(max_retries, self.timeouts.cdn_upload, self.backoff.clone())
    }

    pub fn transcription(&self, max_retries: u32) -> StepPolicy {
        StepPolicy::new(max_retries, self.timeouts.transcription, self.backoff.clone())
    }

    pub fn analysis(&self, max_retries: u32) -> StepPolicy {
        StepPolicy::new(max_retries, self.timeouts.analysis, self.backoff.clone())
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent workers claiming jobs
    pub worker_count: usize,
    /// Upper bound on how long an idle worker waits before re-checking the queue
    pub poll_interval: Duration,
    /// Retries per external call for jobs created by the service
    pub job_max_retries: u32,
    /// Step policies used by the processors
    pub policies: JobStepPolicies,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            poll_interval: Duration::from_secs(5),
            job_max_retries: 2,
            policies: JobStepPolicies::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            worker_count: std::env::var("WORKER_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(1),
            poll_interval: env_secs("WORKER_POLL_INTERVAL_SECS", 5),
            job_max_retries: std::env::var("WORKER_JOB_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            policies: JobStepPolicies {
                timeouts: StepTimeouts::from_env(),
                backoff: BackoffPolicy::long(),
            },
        }
    }
}
