//! Processing (ingest) job processor.

use std::sync::Arc;

use async_trait::async_trait;

use scribe_models::{BackgroundJob, JobPayload, JobType, ProcessingJobPayload, VideoDocument};
use scribe_queue::JobProgress;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::processors::{ingest, ingested_transcription_job, JobProcessor, ProcessorContext};

/// Downloads and uploads a source URL, stores the video document, then
/// hands transcription to a follow-up job.
pub struct ProcessingProcessor {
    ctx: Arc<ProcessorContext>,
}

impl ProcessingProcessor {
    pub fn new(ctx: Arc<ProcessorContext>) -> Self {
        Self { ctx }
    }

    async fn run(
        &self,
        payload: &ProcessingJobPayload,
        progress: &JobProgress,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        let context = &payload.context;
        let ingested = ingest(
            &self.ctx,
            &context.source_url,
            payload.max_retries,
            progress,
            10,
        )
        .await?;

        progress.progress(60, "saving");
        let video = VideoDocument::from_ingest(
            payload.video_id.clone(),
            context,
            Some(&ingested.download),
            Some(&ingested.upload),
        );
        self.ctx.adapters.documents.put(video.clone()).await?;
        if let Some(url) = ingested.upload.playable_url() {
            progress.set_video_url(url);
        }

        if context.options.skip_transcription {
            logger.log_step("ingest", "Transcription skipped");
            return Ok(());
        }

        progress.progress(90, "queueing transcription");
        let follow_up = ingested_transcription_job(
            video,
            Some(ingested.download),
            Some(ingested.upload),
            context.options.clone(),
            payload.max_retries,
        );
        let job_id = self.ctx.queue.enqueue(follow_up)?;
        logger.log_step("queue", &format!("Queued transcription job {job_id}"));
        Ok(())
    }
}

#[async_trait]
impl JobProcessor for ProcessingProcessor {
    fn name(&self) -> &'static str {
        "processing"
    }

    fn job_types(&self) -> &'static [JobType] {
        &[JobType::Processing]
    }

    async fn process(&self, job: &BackgroundJob, progress: &JobProgress) -> WorkerResult<()> {
        let logger = JobLogger::for_job(job);
        let JobPayload::Processing(payload) = &job.payload else {
            let err = WorkerError::invalid_payload("expected a processing payload");
            progress.fail(err.to_string());
            return Err(err);
        };

        logger.log_start(&format!("Processing {}", payload.context.source_url));
        match self.run(payload, progress, &logger).await {
            Ok(()) => {
                progress.complete();
                logger.log_completion(&format!("Video {} ingested", payload.video_id));
                Ok(())
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                progress.fail(e.to_string());
                Err(e)
            }
        }
    }
}
