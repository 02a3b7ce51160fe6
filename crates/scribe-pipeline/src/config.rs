//! Pipeline configuration.

use std::time::Duration;

use scribe_models::FallbackBehavior;
use scribe_worker::{StepPolicy, StepTimeouts};

/// Retry policies for the synchronous steps of a run.
#[derive(Debug, Clone)]
pub struct StepPolicies {
    pub download: StepPolicy,
    pub cdn_upload: StepPolicy,
    pub transcription: StepPolicy,
    pub analysis: StepPolicy,
}

impl StepPolicies {
    /// Short backoff with the same retry budget for every step.
    pub fn short(max_retries: u32, timeouts: &StepTimeouts) -> Self {
        Self {
            download: StepPolicy::short(max_retries, timeouts.download),
            cdn_upload: StepPolicy::short(max_retries, timeouts.cdn_upload),
            transcription: StepPolicy::short(max_retries, timeouts.transcription),
            analysis: StepPolicy::short(max_retries, timeouts.analysis),
        }
    }
}

impl Default for StepPolicies {
    fn default() -> Self {
        Self::short(2, &StepTimeouts::default())
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// What a failed step does to the rest of the run
    pub fallback: FallbackBehavior,
    /// Hand transcription and analysis to the job service
    pub background_enabled: bool,
    pub policies: StepPolicies,
    /// Interval between drain checks during shutdown
    pub drain_interval: Duration,
    /// Upper bound on the shutdown drain
    pub shutdown_timeout: Duration,
    /// Pending jobs above which the queue reports degraded
    pub queue_backlog_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackBehavior::Partial,
            background_enabled: false,
            policies: StepPolicies::default(),
            drain_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(30),
            queue_backlog_threshold: 1_000,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_retries = std::env::var("PIPELINE_STEP_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        Self {
            fallback: std::env::var("PIPELINE_FALLBACK")
                .ok()
                .and_then(|s| FallbackBehavior::parse(&s))
                .unwrap_or(defaults.fallback),
            background_enabled: std::env::var("PIPELINE_BACKGROUND")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.background_enabled),
            policies: StepPolicies::short(max_retries, &StepTimeouts::from_env()),
            drain_interval: defaults.drain_interval,
            shutdown_timeout: std::env::var("PIPELINE_SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            queue_backlog_threshold: std::env::var("PIPELINE_QUEUE_BACKLOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.queue_backlog_threshold),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackBehavior) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_background(mut self, enabled: bool) -> Self {
        self.background_enabled = enabled;
        self
    }

    pub fn with_policies(mut self, policies: StepPolicies) -> Self {
        self.policies = policies;
        self
    }
}
