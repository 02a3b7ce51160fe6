//! Background job service.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use scribe_adapters::Adapters;
use scribe_models::{
    BackgroundJob, CdnUpload, DownloadOutcome, JobId, JobPayload, JobStats, JobStatus, JobType,
    PipelineOptions, Priority, VideoDocument,
};
use scribe_queue::{JobProgress, JobQueue};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::processors::{
    default_processors, ingested_transcription_job, job_for_payload, JobProcessor,
    ProcessorContext,
};

/// Runs queued jobs through their processors.
///
/// Workers claim jobs atomically, so each job is driven by exactly one
/// processor invocation. The service never dies from a processor failure:
/// errors and panics are recorded on the job.
pub struct JobService {
    queue: Arc<JobQueue>,
    processors: RwLock<HashMap<JobType, Arc<dyn JobProcessor>>>,
    config: WorkerConfig,
    running: AtomicBool,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobService {
    /// Create a service without processors.
    pub fn new(queue: Arc<JobQueue>, config: WorkerConfig) -> Self {
        Self {
            queue,
            processors: RwLock::new(HashMap::new()),
            config,
            running: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Create a service with the default processor for every job type.
    pub fn with_adapters(adapters: Adapters, queue: Arc<JobQueue>, config: WorkerConfig) -> Self {
        let ctx = Arc::new(ProcessorContext::new(
            adapters,
            Arc::clone(&queue),
            config.policies.clone(),
        ));
        let service = Self::new(queue, config);
        for processor in default_processors(ctx) {
            service.register(processor);
        }
        service
    }

    /// Register a processor for each job type it declares, replacing any
    /// previous registration.
    pub fn register(&self, processor: Arc<dyn JobProcessor>) {
        let mut processors = self
            .processors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for job_type in processor.job_types() {
            debug!(processor = processor.name(), job_type = %job_type, "Registered processor");
            processors.insert(*job_type, Arc::clone(&processor));
        }
    }

    fn processor_for(&self, job: &BackgroundJob) -> Option<Arc<dyn JobProcessor>> {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job.job_type)
            .filter(|processor| processor.can_process(job))
            .cloned()
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the workers. Calling `start` on a running service does nothing.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = watch::channel(false);
        *self.shutdown.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        workers.retain(|handle| !handle.is_finished());
        for index in 0..self.config.worker_count {
            let service = Arc::clone(self);
            let shutdown = rx.clone();
            workers.push(tokio::spawn(async move {
                service.worker_loop(index, shutdown).await;
            }));
        }

        info!(
            workers = self.config.worker_count,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Job service started"
        );
    }

    /// Signal the workers to stop. Jobs already running finish; no new job is
    /// claimed.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = tx.send(true);
        }
        info!("Job service stopping");
    }

    /// Wait until every worker spawned by [`start`](Self::start) has exited.
    pub async fn join_workers(&self) {
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task ended abnormally: {}", e);
            }
        }
    }

    async fn worker_loop(self: Arc<Self>, index: usize, mut shutdown: watch::Receiver<bool>) {
        debug!(worker = index, "Worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            if self.process_next_job().await {
                continue;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = self.queue.wait_for_job(self.config.poll_interval) => {}
            }
        }
        debug!(worker = index, "Worker stopped");
    }

    /// Claim and run one pending job. Returns `false` when nothing was pending.
    pub async fn process_next_job(&self) -> bool {
        let Some(job) = self.queue.claim_next() else {
            return false;
        };
        let started = Instant::now();
        let job_type = job.job_type;
        let progress = JobProgress::new(Arc::clone(&self.queue), job.id.clone());

        let Some(processor) = self.processor_for(&job) else {
            let err = WorkerError::NoProcessor(job_type);
            warn!(job_id = %job.id, "{}", err);
            progress.fail(err.to_string());
            metrics::record_job(job_type, JobStatus::Failed, started.elapsed().as_secs_f64());
            return true;
        };

        info!(
            job_id = %job.id,
            job_type = %job_type,
            processor = processor.name(),
            "Processing job"
        );

        let span = JobLogger::for_job(&job).span();
        let task_progress = progress.clone();
        let handle = tokio::spawn(
            async move { processor.process(&job, &task_progress).await }.instrument(span),
        );

        match handle.await {
            Ok(Ok(())) => {
                if !progress.is_finished() {
                    progress.complete();
                }
            }
            Ok(Err(e)) => {
                if !progress.is_finished() {
                    progress.fail(e.to_string());
                }
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "task cancelled".to_string()
                };
                let err = WorkerError::Panicked(message);
                error!(job_id = %progress.job_id(), "{}", err);
                if !progress.is_finished() {
                    progress.fail(err.to_string());
                }
            }
        }

        let status = progress
            .snapshot()
            .map(|job| job.status)
            .unwrap_or(JobStatus::Failed);
        metrics::record_job(job_type, status, started.elapsed().as_secs_f64());
        info!(job_id = %progress.job_id(), status = %status, "Job finished");
        true
    }

    /// Queue transcription of a video that was already downloaded and uploaded.
    pub fn start_background_transcription(
        &self,
        video: VideoDocument,
        download: Option<DownloadOutcome>,
        upload: Option<CdnUpload>,
        options: PipelineOptions,
    ) -> WorkerResult<JobId> {
        let job = ingested_transcription_job(
            video,
            download,
            upload,
            options,
            self.config.job_max_retries,
        );
        self.enqueue_job(job)
    }

    /// Queue a job for any payload.
    pub fn enqueue(&self, payload: JobPayload, priority: Priority) -> WorkerResult<JobId> {
        self.enqueue_job(job_for_payload(payload, priority))
    }

    pub fn enqueue_job(&self, job: BackgroundJob) -> WorkerResult<JobId> {
        let (job_type, video_id) = (job.job_type, job.video_id.clone());
        let job_id = self.queue.enqueue(job)?;
        info!(job_id = %job_id, job_type = %job_type, video_id = %video_id, "Job queued");
        Ok(job_id)
    }

    pub fn get_job_status(&self, id: &JobId) -> Option<BackgroundJob> {
        self.queue.get_job(id)
    }

    /// Cancel a pending job.
    pub fn cancel_job(&self, id: &JobId) -> bool {
        let cancelled = self.queue.cancel_job(id);
        if cancelled {
            info!(job_id = %id, "Job cancelled");
        }
        cancelled
    }

    pub fn get_stats(&self) -> JobStats {
        self.queue.stats()
    }

    /// Remove completed and failed jobs older than `older_than_hours`.
    pub fn cleanup(&self, older_than_hours: u64) -> usize {
        self.queue.cleanup(older_than_hours)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
