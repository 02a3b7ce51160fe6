//! Step execution with per-attempt timeouts and exponential backoff.
//!
//! Every external call a run makes goes through [`execute_step`], which turns
//! the call into an immutable [`PipelineStepResult`]. Failures never escape as
//! errors or panics; they are recorded in the result.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use scribe_adapters::{AdapterError, AdapterResult};
use scribe_models::{PipelineStep, PipelineStepResult};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Exponential backoff: `min(cap, base * 2^(attempt - 1))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Backoff for synchronous pipeline steps (1s doubling, capped at 30s).
    pub fn short() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }

    /// Backoff for background jobs (5s doubling, capped at 300s).
    pub fn long() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(2u32.pow(exponent)).min(self.cap)
    }
}

/// Retry budget, per-attempt timeout and backoff for one step.
#[derive(Debug, Clone)]
pub struct StepPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Limit for a single attempt
    pub timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl StepPolicy {
    pub fn new(max_retries: u32, timeout: Duration, backoff: BackoffPolicy) -> Self {
        Self {
            max_retries,
            timeout,
            backoff,
        }
    }

    pub fn short(max_retries: u32, timeout: Duration) -> Self {
        Self::new(max_retries, timeout, BackoffPolicy::short())
    }

    pub fn long(max_retries: u32, timeout: Duration) -> Self {
        Self::new(max_retries, timeout, BackoffPolicy::long())
    }
}

/// Result of [`execute_step`]: the step record plus the value on success.
#[derive(Debug)]
pub struct StepOutcome<T> {
    pub result: PipelineStepResult,
    pub value: Option<T>,
}

impl<T> StepOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.success
    }

    pub fn error(&self) -> Option<&str> {
        self.result.error.as_deref()
    }

    /// Attach a JSON summary of the value to the step record.
    pub fn summarize(mut self, summary: impl FnOnce(&T) -> serde_json::Value) -> Self {
        if let Some(value) = &self.value {
            self.result.output = Some(summary(value));
        }
        self
    }

    /// Error message for a failed step, formatted for job errors.
    pub fn failure_message(&self) -> String {
        format!(
            "{} failed: {}",
            self.result.step,
            self.error().unwrap_or("unknown error")
        )
    }

    /// The value, or the step failure as a [`WorkerError::StepFailed`].
    pub fn into_value(self) -> WorkerResult<T> {
        let step = self.result.step;
        match self.value {
            Some(value) => Ok(value),
            None => Err(WorkerError::step_failed(
                step,
                self.result.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

/// Run `operation` under `policy`.
///
/// Each attempt is raced against `policy.timeout`; a timed-out attempt is
/// dropped, which cancels the in-flight call, and counts as a failure with
/// the message `"Operation timeout"`. Failures are retried up to
/// `policy.max_retries` times unless the error is not retryable.
pub async fn execute_step<T, F, Fut>(
    step: PipelineStep,
    policy: &StepPolicy,
    mut operation: F,
) -> StepOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AdapterResult<T>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout),
        };

        match result {
            Ok(value) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                debug!(%step, attempt, duration_ms, "Step succeeded");
                metrics::record_step(step, true, duration_ms, attempt - 1);
                return StepOutcome {
                    result: PipelineStepResult {
                        step,
                        success: true,
                        duration_ms,
                        error: None,
                        output: None,
                        retry_count: attempt - 1,
                        attempts: attempt,
                    },
                    value: Some(value),
                };
            }
            Err(e) if e.is_retryable() && attempt <= policy.max_retries => {
                let delay = policy.backoff.delay_for_attempt(attempt);
                warn!(
                    %step,
                    attempt,
                    max_attempts = policy.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Step attempt failed, retrying: {}", e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                warn!(%step, attempts = attempt, "Step failed: {}", e);
                metrics::record_step(step, false, duration_ms, attempt - 1);
                return StepOutcome {
                    result: PipelineStepResult {
                        step,
                        success: false,
                        duration_ms,
                        error: Some(e.to_string()),
                        output: None,
                        retry_count: attempt - 1,
                        attempts: attempt,
                    },
                    value: None,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> StepPolicy {
        StepPolicy::new(
            max_retries,
            Duration::from_secs(5),
            BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(4)),
        )
    }

    #[test]
    fn test_backoff_delays() {
        let short = BackoffPolicy::short();
        assert_eq!(short.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(short.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(short.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(short.delay_for_attempt(6), Duration::from_secs(30));

        let long = BackoffPolicy::long();
        assert_eq!(long.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(long.delay_for_attempt(4), Duration::from_secs(40));
        assert_eq!(long.delay_for_attempt(100), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_always_failing_uses_every_attempt() {
        let calls = AtomicU32::new(0);
        let outcome: StepOutcome<()> = execute_step(PipelineStep::Download, &fast(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::request_failed("connection reset")) }
        })
        .await;

        assert!(!outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.result.attempts, 4);
        assert_eq!(outcome.result.retry_count, 3);
        assert_eq!(outcome.error(), Some("Request failed: connection reset"));
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let outcome = execute_step(PipelineStep::CdnUpload, &fast(5), || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call < 3 {
                    Err(AdapterError::storage("busy"))
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.value, Some(3));
        assert_eq!(outcome.result.attempts, 3);
        assert_eq!(outcome.result.retry_count, 2);
        assert!(outcome.result.error.is_none());
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let outcome: StepOutcome<()> = execute_step(PipelineStep::Download, &fast(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::invalid_input("not a video")) }
        })
        .await;

        assert!(!outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.result.attempts, 1);
    }

    #[tokio::test]
    async fn test_timeout_cancels_attempt() {
        let finished = std::sync::Arc::new(AtomicU32::new(0));
        let policy = StepPolicy::new(
            1,
            Duration::from_millis(50),
            BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(1)),
        );

        let outcome: StepOutcome<()> = execute_step(PipelineStep::Transcription, &policy, || {
            let finished = finished.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.error(), Some("Operation timeout"));
        assert_eq!(outcome.result.attempts, 2);

        // dropped attempts never run to completion
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_summarize_only_on_success() {
        let ok = execute_step(PipelineStep::Download, &fast(0), || async { Ok(7u32) })
            .await
            .summarize(|v| serde_json::json!({ "value": v }));
        assert_eq!(ok.result.output, Some(serde_json::json!({ "value": 7 })));

        let failed: StepOutcome<u32> = execute_step(PipelineStep::Download, &fast(0), || async {
            Err(AdapterError::request_failed("nope"))
        })
        .await
        .summarize(|v| serde_json::json!({ "value": v }));
        assert!(failed.result.output.is_none());
        assert_eq!(failed.failure_message(), "download failed: Request failed: nope");
    }
}
