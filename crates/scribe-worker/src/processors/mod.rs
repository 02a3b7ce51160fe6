//! Job processors, one per job type.

mod analysis;
mod processing;
mod transcription;
mod upload;

use std::sync::Arc;

use async_trait::async_trait;

use scribe_adapters::Adapters;
use scribe_models::{
    BackgroundJob, CdnUpload, DownloadOutcome, JobPayload, JobType, PipelineOptions, Priority,
    TranscriptionJobPayload, TranscriptionSource, VideoDocument, VideoId,
};
use scribe_queue::{JobProgress, JobQueue};

use crate::config::JobStepPolicies;
use crate::error::WorkerResult;
use crate::steps::{download_step, upload_step};

pub use analysis::AnalysisProcessor;
pub use processing::ProcessingProcessor;
pub use transcription::TranscriptionProcessor;
pub use upload::UploadProcessor;

/// Advances a claimed job to a terminal status.
///
/// Processors report through the [`JobProgress`] handle and decide the
/// terminal status themselves. An `Err` return must already have been recorded
/// with [`JobProgress::fail`]; the service only fills in a terminal status
/// when the processor left the job running.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn job_types(&self) -> &'static [JobType];

    fn can_process(&self, job: &BackgroundJob) -> bool {
        self.job_types().contains(&job.job_type)
    }

    async fn process(&self, job: &BackgroundJob, progress: &JobProgress) -> WorkerResult<()>;
}

/// Everything a processor needs to do its work.
#[derive(Clone)]
pub struct ProcessorContext {
    pub adapters: Adapters,
    pub queue: Arc<JobQueue>,
    pub policies: JobStepPolicies,
}

impl ProcessorContext {
    pub fn new(adapters: Adapters, queue: Arc<JobQueue>, policies: JobStepPolicies) -> Self {
        Self {
            adapters,
            queue,
            policies,
        }
    }
}

/// The processors for every job type.
pub fn default_processors(ctx: Arc<ProcessorContext>) -> Vec<Arc<dyn JobProcessor>> {
    vec![
        Arc::new(TranscriptionProcessor::new(Arc::clone(&ctx))),
        Arc::new(AnalysisProcessor::new(Arc::clone(&ctx))),
        Arc::new(UploadProcessor::new(Arc::clone(&ctx))),
        Arc::new(ProcessingProcessor::new(ctx)),
    ]
}

/// Transcription job for a video that was already downloaded and uploaded.
pub fn ingested_transcription_job(
    video: VideoDocument,
    download: Option<DownloadOutcome>,
    upload: Option<CdnUpload>,
    options: PipelineOptions,
    max_retries: u32,
) -> BackgroundJob {
    let video_id = video.id.clone();
    let video_url = upload
        .as_ref()
        .and_then(|u| u.playable_url())
        .or_else(|| video.playable_url())
        .or_else(|| download.as_ref().and_then(|d| d.stream_url()))
        .map(str::to_string);
    let priority = options.priority;

    BackgroundJob::new(
        video_id,
        video_url,
        priority,
        JobPayload::Transcription(TranscriptionJobPayload {
            source: TranscriptionSource::Ingested {
                video: Box::new(video),
                download,
                upload,
            },
            options,
            max_retries,
        }),
    )
}

/// Job for an arbitrary payload, deriving the video id and URL from it.
pub fn job_for_payload(payload: JobPayload, priority: Priority) -> BackgroundJob {
    let (video_id, video_url) = match &payload {
        JobPayload::Transcription(p) => match &p.source {
            TranscriptionSource::Ingested { video, upload, .. } => (
                video.id.clone(),
                upload
                    .as_ref()
                    .and_then(|u| u.playable_url())
                    .or_else(|| video.playable_url())
                    .map(str::to_string),
            ),
            TranscriptionSource::SourceUrl { context } => {
                (VideoId::new(), Some(context.source_url.clone()))
            }
        },
        JobPayload::Analysis(p) => (p.video_id.clone(), None),
        JobPayload::Upload(p) => (p.video_id.clone(), p.download.stream_url().map(str::to_string)),
        JobPayload::Processing(p) => (p.video_id.clone(), Some(p.context.source_url.clone())),
    };
    BackgroundJob::new(video_id, video_url, priority, payload)
}

/// Download and CDN upload of a source URL.
pub(crate) struct Ingested {
    pub download: DownloadOutcome,
    pub upload: CdnUpload,
}

/// Run download then CDN upload, reporting progress at `start` and `start + 10`.
pub(crate) async fn ingest(
    ctx: &ProcessorContext,
    source_url: &str,
    max_retries: u32,
    progress: &JobProgress,
    start: u8,
) -> WorkerResult<Ingested> {
    progress.progress(start, "downloading");
    let download = download_step(
        ctx.adapters.downloader.as_ref(),
        source_url,
        &ctx.policies.download(max_retries),
    )
    .await
    .into_value()?;

    progress.progress(start.saturating_add(10), "uploading");
    let upload = upload_step(
        ctx.adapters.cdn.as_ref(),
        &download,
        download.filename(),
        &ctx.policies.cdn_upload(max_retries),
    )
    .await
    .into_value()?;

    Ok(Ingested { download, upload })
}
