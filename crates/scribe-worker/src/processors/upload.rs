//! Upload job processor.

use std::sync::Arc;

use async_trait::async_trait;

use scribe_models::{BackgroundJob, JobPayload, JobType, UploadJobPayload, VideoDocument};
use scribe_queue::JobProgress;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::processors::{JobProcessor, ProcessorContext};
use crate::steps::upload_step;

/// Uploads downloaded media to the CDN and records its locations.
pub struct UploadProcessor {
    ctx: Arc<ProcessorContext>,
}

impl UploadProcessor {
    pub fn new(ctx: Arc<ProcessorContext>) -> Self {
        Self { ctx }
    }

    async fn run(&self, payload: &UploadJobPayload, progress: &JobProgress) -> WorkerResult<()> {
        let documents = &self.ctx.adapters.documents;
        if documents.get(&payload.video_id).await?.is_none() {
            return Err(WorkerError::job_failed(format!(
                "Video document {} does not exist",
                payload.video_id
            )));
        }

        progress.progress(10, "uploading");
        let cdn = self.ctx.adapters.cdn.as_ref();
        let filename = if payload.filename.trim().is_empty() {
            payload.download.filename()
        } else {
            payload.filename.as_str()
        };
        let upload = upload_step(
            cdn,
            &payload.download,
            filename,
            &self.ctx.policies.cdn_upload(payload.max_retries),
        )
        .await
        .into_value()?;

        progress.progress(80, "saving");
        if let Some(url) = upload.playable_url() {
            progress.set_video_url(url);
        }
        documents
            .update_with(
                &payload.video_id,
                Box::new(move |doc: &mut VideoDocument| doc.apply_upload(&upload)),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobProcessor for UploadProcessor {
    fn name(&self) -> &'static str {
        "upload"
    }

    fn job_types(&self) -> &'static [JobType] {
        &[JobType::Upload]
    }

    async fn process(&self, job: &BackgroundJob, progress: &JobProgress) -> WorkerResult<()> {
        let logger = JobLogger::for_job(job);
        let JobPayload::Upload(payload) = &job.payload else {
            let err = WorkerError::invalid_payload("expected an upload payload");
            progress.fail(err.to_string());
            return Err(err);
        };

        logger.log_start(&format!("Uploading media for video {}", payload.video_id));
        match self.run(payload, progress).await {
            Ok(()) => {
                progress.complete();
                logger.log_completion(&format!("Media for video {} uploaded", payload.video_id));
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
