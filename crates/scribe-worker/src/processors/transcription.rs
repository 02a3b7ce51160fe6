//! Transcription job processor.

use std::sync::Arc;

use async_trait::async_trait;

use scribe_adapters::AdapterError;
use scribe_models::{
    BackgroundJob, CdnUpload, DownloadOutcome, JobPayload, JobType, TranscriptionJobPayload,
    TranscriptionSource, TranscriptionStatus, VideoDocument,
};
use scribe_queue::JobProgress;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::processors::{ingest, JobProcessor, ProcessorContext};
use crate::steps::{analysis_step, components_or_heuristic, first_url, transcribe_step};

/// Transcribes a video and stores transcript and script components.
///
/// Jobs with a `SourceUrl` source ingest the video first.
pub struct TranscriptionProcessor {
    ctx: Arc<ProcessorContext>,
}

/// Media the transcription works from once ingest is done.
struct Prepared {
    video: VideoDocument,
    download: Option<DownloadOutcome>,
    upload: Option<CdnUpload>,
}

impl TranscriptionProcessor {
    pub fn new(ctx: Arc<ProcessorContext>) -> Self {
        Self { ctx }
    }

    /// Returns `None` when the job finished during preparation.
    async fn prepare(
        &self,
        job: &BackgroundJob,
        payload: &TranscriptionJobPayload,
        progress: &JobProgress,
        logger: &JobLogger,
    ) -> WorkerResult<Option<Prepared>> {
        let documents = &self.ctx.adapters.documents;

        match &payload.source {
            TranscriptionSource::SourceUrl { context } => {
                let ingested =
                    ingest(&self.ctx, &context.source_url, payload.max_retries, progress, 5)
                        .await?;
                let mut context = context.as_ref().clone();
                context.options = payload.options.clone();

                let video = VideoDocument::from_ingest(
                    job.video_id.clone(),
                    &context,
                    Some(&ingested.download),
                    Some(&ingested.upload),
                );
                documents.put(video.clone()).await?;
                logger.log_step("ingest", &format!("Ingested video {}", video.id));

                if let Some(url) = ingested.upload.playable_url() {
                    progress.set_video_url(url);
                }
                progress.update_payload(JobPayload::Transcription(TranscriptionJobPayload {
                    source: TranscriptionSource::Ingested {
                        video: Box::new(video.clone()),
                        download: Some(ingested.download.clone()),
                        upload: Some(ingested.upload.clone()),
                    },
                    options: payload.options.clone(),
                    max_retries: payload.max_retries,
                }));
                progress.progress(25, "ingested");

                if payload.options.skip_transcription {
                    logger.log_step("ingest", "Transcription skipped");
                    return Ok(None);
                }

                Ok(Some(Prepared {
                    video,
                    download: Some(ingested.download),
                    upload: Some(ingested.upload),
                }))
            }
            TranscriptionSource::Ingested {
                video,
                download,
                upload,
            } => {
                let video = match documents.get(&video.id).await? {
                    Some(stored) => stored,
                    None => {
                        documents.put(video.as_ref().clone()).await?;
                        video.as_ref().clone()
                    }
                };
                progress.progress(10, "validating");

                Ok(Some(Prepared {
                    video,
                    download: download.clone(),
                    upload: upload.clone(),
                }))
            }
        }
    }

    async fn run(
        &self,
        job: &BackgroundJob,
        payload: &TranscriptionJobPayload,
        progress: &JobProgress,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        let Some(prepared) = self.prepare(job, payload, progress, logger).await? else {
            return Ok(());
        };
        let Prepared {
            video,
            download,
            upload,
        } = prepared;
        let documents = &self.ctx.adapters.documents;

        let url = first_url([
            upload.as_ref().and_then(|u| u.playable_url()),
            video.playable_url(),
            job.video_url.as_deref(),
            download.as_ref().and_then(|d| d.stream_url()),
            Some(video.source_url.as_str()),
        ])
        .ok_or_else(|| WorkerError::job_failed("No usable video URL for transcription"))?;

        documents
            .update_with(
                &video.id,
                Box::new(|doc: &mut VideoDocument| {
                    doc.mark_transcription(TranscriptionStatus::Processing, None)
                }),
            )
            .await?;

        progress.progress(25, "transcribing");
        let transcription = transcribe_step(
            self.ctx.adapters.transcriber.as_ref(),
            &url,
            video.platform,
            &self.ctx.policies.transcription(payload.max_retries),
        )
        .await
        .into_value()?;
        progress.progress(60, "transcribed");

        let analyzed = if transcription.usable_components().is_none()
            && !payload.options.skip_analysis
        {
            progress.progress(75, "analyzing");
            let outcome = analysis_step(
                self.ctx.adapters.analyzer.as_ref(),
                &transcription.transcript,
                &self.ctx.policies.analysis(payload.max_retries),
            )
            .await;
            if !outcome.is_success() {
                logger.log_warning(&format!(
                    "{}, using heuristic split",
                    outcome.failure_message()
                ));
            }
            progress.progress(90, "analyzed");
            outcome.value
        } else {
            None
        };

        let (components, source) = components_or_heuristic(&transcription, analyzed);
        logger.log_step("components", &format!("Components from {source:?}"));

        let transcript = transcription.transcript.clone();
        let content_metadata = transcription.content_metadata.clone();
        documents
            .update_with(
                &video.id,
                Box::new(move |doc: &mut VideoDocument| {
                    doc.apply_transcript(transcript, components, content_metadata.as_ref())
                }),
            )
            .await?;
        Ok(())
    }

    async fn mark_document_failed(&self, job: &BackgroundJob, error: &str, logger: &JobLogger) {
        let error = error.to_string();
        let result = self
            .ctx
            .adapters
            .documents
            .update_with(
                &job.video_id,
                Box::new(move |doc: &mut VideoDocument| {
                    doc.mark_transcription(TranscriptionStatus::Failed, Some(error))
                }),
            )
            .await;
        match result {
            Ok(_) | Err(AdapterError::NotFound(_)) => {}
            Err(e) => logger.log_warning(&format!("Could not mark document failed: {e}")),
        }
    }
}

#[async_trait]
impl JobProcessor for TranscriptionProcessor {
    fn name(&self) -> &'static str {
        "transcription"
    }

    fn job_types(&self) -> &'static [JobType] {
        &[JobType::Transcription]
    }

    async fn process(&self, job: &BackgroundJob, progress: &JobProgress) -> WorkerResult<()> {
        let logger = JobLogger::for_job(job);
        let JobPayload::Transcription(payload) = &job.payload else {
            let err = WorkerError::invalid_payload("expected a transcription payload");
            progress.fail(err.to_string());
            return Err(err);
        };

        logger.log_start(&format!("Transcribing video {}", job.video_id));
        match self.run(job, payload, progress, &logger).await {
            Ok(()) => {
                progress.complete();
                logger.log_completion(&format!("Video {} transcribed", job.video_id));
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                logger.log_error(&message);
                self.mark_document_failed(job, &message, &logger).await;
                progress.fail(message);
                Err(e)
            }
        }
    }
}
