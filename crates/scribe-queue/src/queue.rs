//! In-memory job queue.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use scribe_models::{BackgroundJob, JobId, JobStats, JobStatus, JobUpdate};

use crate::error::{QueueError, QueueResult};

/// Order in which pending jobs are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DequeueStrategy {
    /// Insertion order
    #[default]
    Fifo,
    /// Highest priority first, insertion order among equals
    Priority,
}

impl DequeueStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fifo" => Some(Self::Fifo),
            "priority" => Some(Self::Priority),
            _ => None,
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of jobs held; cancelled jobs do not count
    pub max_jobs: usize,
    /// Dequeue order
    pub strategy: DequeueStrategy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_jobs: 10_000,
            strategy: DequeueStrategy::Fifo,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_jobs: std::env::var("QUEUE_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_jobs),
            strategy: std::env::var("QUEUE_STRATEGY")
                .ok()
                .and_then(|s| DequeueStrategy::parse(&s))
                .unwrap_or(defaults.strategy),
        }
    }

    pub fn with_strategy(mut self, strategy: DequeueStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, BackgroundJob>,
    /// Insertion order of `jobs`
    order: Vec<JobId>,
}

impl QueueState {
    fn next_pending(&self, strategy: DequeueStrategy) -> Option<&JobId> {
        let mut pending = self
            .order
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .filter(|job| job.status == JobStatus::Pending);

        match strategy {
            DequeueStrategy::Fifo => pending.next().map(|job| &job.id),
            DequeueStrategy::Priority => {
                let mut best: Option<&BackgroundJob> = None;
                for job in pending {
                    if best.map_or(true, |b| job.priority > b.priority) {
                        best = Some(job);
                    }
                }
                best.map(|job| &job.id)
            }
        }
    }
}

/// Thread-safe in-memory job queue.
///
/// Every operation takes the state lock once, so each call is atomic with
/// respect to the others.
pub struct JobQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a pending job.
    pub fn enqueue(&self, job: BackgroundJob) -> QueueResult<JobId> {
        let mut state = self.state();

        if state.jobs.contains_key(&job.id) {
            warn!(job_id = %job.id, "Rejected duplicate job");
            return Err(QueueError::DuplicateJob(job.id));
        }
        if job.status != JobStatus::Pending {
            return Err(QueueError::NotPending {
                id: job.id,
                status: job.status,
            });
        }
        let held = state
            .jobs
            .values()
            .filter(|held| held.status != JobStatus::Cancelled)
            .count();
        if held >= self.config.max_jobs {
            warn!(max_jobs = self.config.max_jobs, "Queue is full");
            return Err(QueueError::QueueFull(self.config.max_jobs));
        }

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            priority = %job.priority,
            "Enqueued job"
        );
        let id = job.id.clone();
        state.order.push(id.clone());
        state.jobs.insert(id.clone(), job);
        drop(state);

        self.notify.notify_one();
        Ok(id)
    }

    /// Peek the next pending job without changing its status.
    pub fn dequeue(&self) -> Option<BackgroundJob> {
        let state = self.state();
        let id = state.next_pending(self.config.strategy)?;
        state.jobs.get(id).cloned()
    }

    /// Take the next pending job and mark it running in one step.
    pub fn claim_next(&self) -> Option<BackgroundJob> {
        let mut state = self.state();
        let id = state.next_pending(self.config.strategy)?.clone();
        let job = state.jobs.get_mut(&id)?;

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        job.progress = 0;
        debug!(job_id = %id, "Claimed job");
        Some(job.clone())
    }

    /// Merge an update into a job.
    ///
    /// Returns `false` for unknown ids, terminal jobs and illegal status
    /// transitions. Progress never decreases.
    pub fn update_job(&self, id: &JobId, update: JobUpdate) -> bool {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(id) else {
            debug!(job_id = %id, "Update for unknown job");
            return false;
        };

        if job.status.is_terminal() {
            debug!(job_id = %id, status = %job.status, "Update for terminal job rejected");
            return false;
        }

        if let Some(next) = update.status {
            if !job.status.can_transition_to(next) {
                warn!(
                    job_id = %id,
                    from = %job.status,
                    to = %next,
                    "Illegal job status transition rejected"
                );
                return false;
            }
            if next == JobStatus::Running && job.started_at.is_none() {
                job.started_at = Some(update.started_at.unwrap_or_else(Utc::now));
            }
            if next.is_terminal() {
                job.completed_at = Some(update.completed_at.unwrap_or_else(Utc::now));
            }
            job.status = next;
        }

        if let Some(progress) = update.progress {
            job.progress = job.progress.max(progress.min(100));
        }
        if let Some(step) = update.current_step {
            job.current_step = Some(step);
        }
        if let Some(error) = update.error {
            job.error = Some(error);
        }
        if let Some(started_at) = update.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = update.completed_at {
            job.completed_at = Some(completed_at);
        }
        if let Some(url) = update.video_url {
            job.video_url = Some(url);
        }
        if let Some(payload) = update.payload {
            if payload.job_type() == job.job_type {
                job.payload = payload;
            } else {
                warn!(job_id = %id, "Ignored payload of a different job type");
            }
        }

        true
    }

    /// Cancel a pending job. Running and terminal jobs are left unchanged.
    pub fn cancel_job(&self, id: &JobId) -> bool {
        let mut state = self.state();
        match state.jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                info!(job_id = %id, "Cancelled job");
                true
            }
            Some(job) => {
                debug!(job_id = %id, status = %job.status, "Job not cancellable");
                false
            }
            None => false,
        }
    }

    pub fn get_job(&self, id: &JobId) -> Option<BackgroundJob> {
        self.state().jobs.get(id).cloned()
    }

    /// Jobs with the given status, in insertion order.
    pub fn get_jobs_by_status(&self, status: JobStatus) -> Vec<BackgroundJob> {
        let state = self.state();
        state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .filter(|job| job.status == status)
            .cloned()
            .collect()
    }

    /// Live counts per status.
    pub fn stats(&self) -> JobStats {
        let state = self.state();
        let mut stats = JobStats::default();
        for job in state.jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.total = state.jobs.len();
        stats
    }

    pub fn len(&self) -> usize {
        self.state().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove completed and failed jobs finished more than `older_than_hours` ago.
    pub fn cleanup(&self, older_than_hours: u64) -> usize {
        // clamp to keep the chrono duration in range
        let hours = older_than_hours.min(24 * 365 * 100) as i64;
        let cutoff = Utc::now() - chrono::Duration::hours(hours);

        let mut state = self.state();
        let before = state.jobs.len();
        state.jobs.retain(|_, job| {
            let removable = matches!(job.status, JobStatus::Completed | JobStatus::Failed)
                && job.completed_at.is_some_and(|at| at < cutoff);
            !removable
        });

        let QueueState { jobs, order } = &mut *state;
        order.retain(|id| jobs.contains_key(id));

        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, older_than_hours, "Cleaned up finished jobs");
        }
        removed
    }

    /// Wait until a pending job may be available.
    ///
    /// Returns immediately when one is already pending; otherwise waits for
    /// an enqueue notification, bounded by `timeout`. Returns whether a
    /// pending job exists afterwards.
    pub async fn wait_for_job(&self, timeout: Duration) -> bool {
        if self.has_pending() {
            return true;
        }
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
        self.has_pending()
    }

    fn has_pending(&self) -> bool {
        self.state()
            .jobs
            .values()
            .any(|job| job.status == JobStatus::Pending)
    }
}
