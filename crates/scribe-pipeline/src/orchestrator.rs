//! Pipeline orchestrator.
//!
//! Sequences download, CDN upload, transcription and analysis for one source
//! URL, either synchronously or by handing the work to the job service.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use validator::Validate;

use scribe_adapters::Adapters;
use scribe_models::{
    BackgroundExecution, CdnUpload, DependencyHealth, DownloadOutcome, ExecutionStatus,
    FallbackBehavior, FinalResult, HealthReport, JobId, JobPayload, PipelineContext,
    PipelineExecutionResult, PipelineOptions, PipelineStep, PipelineStepResult, ScriptComponents,
    TranscriptionJobPayload, TranscriptionSource, TranscriptionStatus, VideoDocument, VideoId,
};
use scribe_worker::steps::{
    analysis_step, components_or_heuristic, download_step, first_url, transcribe_step,
    upload_step,
};
use scribe_worker::{metrics, JobService};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Check a context before any work is done for it.
///
/// The source URL must be a non-empty `http(s)` URL and the options must pass
/// their own validation.
pub fn validate_context(context: &PipelineContext) -> PipelineResult<()> {
    let source = context.source_url.trim();
    if source.is_empty() {
        return Err(PipelineError::validation("Source URL is required"));
    }
    let parsed = url::Url::parse(source)
        .map_err(|e| PipelineError::validation(format!("Invalid source URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PipelineError::validation(format!(
            "Unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }
    context.validate()?;
    Ok(())
}

/// Advisory duration of a background run, in seconds.
pub fn estimate_duration_secs(options: &PipelineOptions) -> u64 {
    let mut estimate = 10;
    if !options.skip_transcription {
        estimate += 30;
    }
    if !options.skip_analysis {
        estimate += 15;
    }
    estimate + 20
}

/// Accumulates step results for one run and applies the fallback behavior.
struct RunState {
    fallback: FallbackBehavior,
    steps: Vec<PipelineStepResult>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl RunState {
    fn new(fallback: FallbackBehavior) -> Self {
        Self {
            fallback,
            steps: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Append a step. Returns `false` when the run must stop here.
    fn record(&mut self, result: PipelineStepResult) -> bool {
        let proceed = match (result.success, self.fallback) {
            (true, _) => true,
            (false, FallbackBehavior::Fail) => {
                self.errors.push(step_message(&result));
                false
            }
            (false, FallbackBehavior::Partial) => {
                self.errors.push(step_message(&result));
                true
            }
            (false, FallbackBehavior::Continue) => {
                self.warnings.push(step_message(&result));
                true
            }
        };
        self.steps.push(result);
        proceed
    }

    /// Append a step whose failure never affects the run.
    fn record_soft(&mut self, result: PipelineStepResult) {
        if !result.success {
            self.warnings.push(step_message(&result));
        }
        self.steps.push(result);
    }

    fn finish(
        self,
        video_id: Option<VideoId>,
        final_result: Option<FinalResult>,
        started: Instant,
    ) -> PipelineExecutionResult {
        let success = self.errors.is_empty() || self.fallback != FallbackBehavior::Fail;
        self.into_result(success, video_id, final_result, started)
    }

    fn into_result(
        self,
        success: bool,
        video_id: Option<VideoId>,
        final_result: Option<FinalResult>,
        started: Instant,
    ) -> PipelineExecutionResult {
        let total_duration_ms = started.elapsed().as_millis() as u64;
        metrics::record_run(success, total_duration_ms);
        PipelineExecutionResult {
            success,
            video_id,
            total_duration_ms,
            steps: self.steps,
            final_result,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

fn step_message(result: &PipelineStepResult) -> String {
    format!(
        "{} failed: {}",
        result.step,
        result.error.as_deref().unwrap_or("unknown error")
    )
}

/// What the transcription stage of a synchronous run produced.
struct TranscriptOutcome {
    status: TranscriptionStatus,
    transcript: Option<String>,
    components: Option<ScriptComponents>,
    background_job_id: Option<JobId>,
}

impl TranscriptOutcome {
    fn with_status(status: TranscriptionStatus) -> Self {
        Self {
            status,
            transcript: None,
            components: None,
            background_job_id: None,
        }
    }
}

/// Coordinates pipeline runs against explicitly provided adapters and job
/// service.
pub struct PipelineOrchestrator {
    adapters: Adapters,
    jobs: Arc<JobService>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(adapters: Adapters, jobs: Arc<JobService>, config: PipelineConfig) -> Self {
        Self {
            adapters,
            jobs,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn jobs(&self) -> &Arc<JobService> {
        &self.jobs
    }

    /// Run the pipeline for one source URL and wait for the result.
    ///
    /// Step failures are reported in the result, never as an error. A context
    /// that fails validation produces a failed result without calling any
    /// adapter.
    pub async fn execute(&self, context: PipelineContext) -> PipelineExecutionResult {
        let started = Instant::now();
        let mut run = RunState::new(self.config.fallback);

        if let Err(e) = validate_context(&context) {
            warn!(source_url = %context.source_url, "Rejected pipeline context: {}", e);
            run.errors.push(e.to_string());
            run.steps
                .push(PipelineStepResult::skipped_failure(PipelineStep::Download, e.to_string()));
            return run.into_result(false, None, None, started);
        }

        info!(
            source_url = %context.source_url,
            fallback = ?self.config.fallback,
            background = self.config.background_enabled,
            "Starting pipeline run"
        );
        let policies = &self.config.policies;

        let downloaded = download_step(
            self.adapters.downloader.as_ref(),
            &context.source_url,
            &policies.download,
        )
        .await;
        let download = downloaded.value;
        if !run.record(downloaded.result) {
            return run.finish(None, None, started);
        }

        let upload = match &download {
            Some(download) => {
                let uploaded = upload_step(
                    self.adapters.cdn.as_ref(),
                    download,
                    download.filename(),
                    &policies.cdn_upload,
                )
                .await;
                let upload = uploaded.value;
                if !run.record(uploaded.result) {
                    return run.finish(None, None, started);
                }
                upload
            }
            None => {
                let skipped = PipelineStepResult::skipped_failure(
                    PipelineStep::CdnUpload,
                    "No downloaded media to upload",
                );
                if !run.record(skipped) {
                    return run.finish(None, None, started);
                }
                None
            }
        };

        let video_id = VideoId::new();
        let mut video = VideoDocument::from_ingest(
            video_id.clone(),
            &context,
            download.as_ref(),
            upload.as_ref(),
        );

        let handed_off = self.config.background_enabled && !context.options.skip_transcription;
        let outcome = if context.options.skip_transcription {
            TranscriptOutcome::with_status(TranscriptionStatus::Skipped)
        } else if handed_off {
            self.hand_off(&mut run, &video, download.as_ref(), upload.as_ref(), &context)
                .await
        } else {
            match self
                .transcribe(&mut run, &mut video, download.as_ref(), upload.as_ref(), &context)
                .await
            {
                Some(outcome) => outcome,
                None => return run.finish(Some(video_id), None, started),
            }
        };

        // A hand-off has already stored the document.
        if upload.is_some() && !handed_off {
            self.persist(&mut run, video.clone()).await;
        }

        let final_result = upload.map(|upload| FinalResult {
            platform: video.platform,
            iframe_url: upload.iframe_url,
            direct_url: upload.direct_url,
            thumbnail_url: video.thumbnail_url.clone(),
            media_id: upload.media_id,
            transcription_status: outcome.status,
            transcript: outcome.transcript,
            components: outcome.components,
            background_job_id: outcome.background_job_id,
        });

        let result = run.finish(Some(video_id), final_result, started);
        info!(
            video_id = ?result.video_id,
            success = result.success,
            steps = result.steps.len(),
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            duration_ms = result.total_duration_ms,
            "Pipeline run finished"
        );
        result
    }

    /// Queue transcription for the ingested video.
    async fn hand_off(
        &self,
        run: &mut RunState,
        video: &VideoDocument,
        download: Option<&DownloadOutcome>,
        upload: Option<&CdnUpload>,
        context: &PipelineContext,
    ) -> TranscriptOutcome {
        let started = Instant::now();
        if upload.is_some() {
            self.persist(run, video.clone()).await;
        }

        match self.jobs.start_background_transcription(
            video.clone(),
            download.cloned(),
            upload.cloned(),
            context.options.clone(),
        ) {
            Ok(job_id) => {
                run.record(PipelineStepResult {
                    step: PipelineStep::BackgroundProcessing,
                    success: true,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: None,
                    output: Some(serde_json::json!({ "job_id": job_id })),
                    retry_count: 0,
                    attempts: 1,
                });
                TranscriptOutcome {
                    background_job_id: Some(job_id),
                    ..TranscriptOutcome::with_status(TranscriptionStatus::Processing)
                }
            }
            Err(e) => {
                run.record(PipelineStepResult {
                    step: PipelineStep::BackgroundProcessing,
                    success: false,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                    output: None,
                    retry_count: 0,
                    attempts: 1,
                });
                TranscriptOutcome::with_status(TranscriptionStatus::Failed)
            }
        }
    }

    /// Transcribe and analyze in-line. Returns `None` when the run must stop.
    async fn transcribe(
        &self,
        run: &mut RunState,
        video: &mut VideoDocument,
        download: Option<&DownloadOutcome>,
        upload: Option<&CdnUpload>,
        context: &PipelineContext,
    ) -> Option<TranscriptOutcome> {
        let policies = &self.config.policies;
        let url = first_url([
            upload.and_then(CdnUpload::playable_url),
            download.and_then(DownloadOutcome::stream_url),
            Some(context.source_url.as_str()),
        ])
        .unwrap_or_default();

        let transcribed = transcribe_step(
            self.adapters.transcriber.as_ref(),
            &url,
            video.platform,
            &policies.transcription,
        )
        .await;
        let error = transcribed.result.error.clone();
        let transcription = transcribed.value;
        if !run.record(transcribed.result) {
            return None;
        }

        let Some(transcription) = transcription else {
            video.mark_transcription(TranscriptionStatus::Failed, error);
            return Some(TranscriptOutcome::with_status(TranscriptionStatus::Failed));
        };

        let analyzed =
            if transcription.usable_components().is_none() && !context.options.skip_analysis {
                let outcome = analysis_step(
                    self.adapters.analyzer.as_ref(),
                    &transcription.transcript,
                    &policies.analysis,
                )
                .await;
                run.record_soft(outcome.result);
                outcome.value
            } else {
                None
            };

        let (components, source) = components_or_heuristic(&transcription, analyzed);
        info!(video_id = %video.id, components = ?source, "Transcript ready");
        video.apply_transcript(
            transcription.transcript.clone(),
            components.clone(),
            transcription.content_metadata.as_ref(),
        );

        Some(TranscriptOutcome {
            status: TranscriptionStatus::Completed,
            transcript: Some(transcription.transcript),
            components: Some(components),
            background_job_id: None,
        })
    }

    /// Store the document. A store failure is a warning; the media is already
    /// on the CDN.
    async fn persist(&self, run: &mut RunState, video: VideoDocument) {
        let video_id = video.id.clone();
        if let Err(e) = self.adapters.documents.put(video).await {
            warn!(video_id = %video_id, "Failed to store video document: {}", e);
            run.warnings
                .push(format!("Failed to store video document {video_id}: {e}"));
        }
    }

    /// Queue the whole pipeline as a background job.
    ///
    /// Validation happens before the queue is touched; an invalid context is
    /// returned as [`PipelineError::Validation`].
    pub fn execute_background(
        &self,
        context: PipelineContext,
    ) -> PipelineResult<BackgroundExecution> {
        validate_context(&context)?;

        let estimated_duration_secs = estimate_duration_secs(&context.options);
        let options = context.options.clone();
        let priority = options.priority;
        let source_url = context.source_url.clone();
        let payload = JobPayload::Transcription(TranscriptionJobPayload {
            source: TranscriptionSource::SourceUrl {
                context: Box::new(context),
            },
            options,
            max_retries: self.jobs.config().job_max_retries,
        });

        let job_id = self.jobs.enqueue(payload, priority)?;
        info!(
            job_id = %job_id,
            source_url = %source_url,
            estimated_duration_secs,
            "Queued background pipeline run"
        );
        Ok(BackgroundExecution {
            job_id,
            estimated_duration_secs,
        })
    }

    pub fn get_execution_status(&self, job_id: &JobId) -> Option<ExecutionStatus> {
        self.jobs.get_job_status(job_id).map(|job| ExecutionStatus {
            status: job.status,
            progress: job.progress,
            current_step: job.current_step,
            error: job.error,
        })
    }

    /// Cancel a background run that has not started yet.
    pub fn cancel_execution(&self, job_id: &JobId) -> bool {
        self.jobs.cancel_job(job_id)
    }

    /// Health of every dependency plus live job counts.
    pub async fn get_health_status(&self) -> HealthReport {
        let adapters = &self.adapters;
        let (downloader, cdn, transcriber, analyzer, documents) = futures::join!(
            adapters.downloader.health(),
            adapters.cdn.health(),
            adapters.transcriber.health(),
            adapters.analyzer.health(),
            adapters.documents.health(),
        );

        let stats = self.jobs.get_stats();
        let job_queue = if self.config.background_enabled && !self.jobs.is_running() {
            DependencyHealth::unhealthy("Job service is not running")
        } else if stats.pending > self.config.queue_backlog_threshold {
            DependencyHealth::degraded(format!("{} jobs pending", stats.pending))
        } else {
            DependencyHealth::healthy()
        };

        let dependencies = BTreeMap::from([
            ("downloader".to_string(), downloader),
            ("cdn".to_string(), cdn),
            ("transcriber".to_string(), transcriber),
            ("analyzer".to_string(), analyzer),
            ("document_store".to_string(), documents),
            ("job_queue".to_string(), job_queue),
        ]);
        HealthReport::new(dependencies, stats)
    }

    /// Stop the job service and wait for running jobs to drain.
    ///
    /// Running jobs are never cancelled; the wait ends after
    /// `shutdown_timeout` even if some are still running.
    pub async fn shutdown(&self) {
        info!("Shutting down pipeline");
        self.jobs.stop();

        let deadline = Instant::now() + self.config.shutdown_timeout;
        loop {
            let running = self.jobs.get_stats().running;
            if running == 0 {
                info!("All running jobs finished");
                break;
            }
            if Instant::now() >= deadline {
                warn!(running, "Shutdown timeout reached with jobs still running");
                break;
            }
            info!(running, "Waiting for running jobs to finish");
            tokio::time::sleep(self.config.drain_interval).await;
        }
    }
}
