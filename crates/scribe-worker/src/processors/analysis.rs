//! Analysis job processor.

use std::sync::Arc;

use async_trait::async_trait;

use scribe_models::{BackgroundJob, JobPayload, JobType, VideoDocument};
use scribe_queue::JobProgress;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::processors::{JobProcessor, ProcessorContext};
use crate::split::heuristic_components;
use crate::steps::analysis_step;

/// Runs AI analysis over an existing transcript.
///
/// Component extraction falls back to the heuristic split; general content
/// insights are stored only when the analyzer produced them.
pub struct AnalysisProcessor {
    ctx: Arc<ProcessorContext>,
}

impl AnalysisProcessor {
    pub fn new(ctx: Arc<ProcessorContext>) -> Self {
        Self { ctx }
    }

    async fn run(
        &self,
        job: &BackgroundJob,
        transcript: &str,
        progress: &JobProgress,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        if transcript.trim().is_empty() {
            return Err(WorkerError::invalid_payload("transcript is empty"));
        }
        let analyzer = self.ctx.adapters.analyzer.as_ref();

        progress.progress(20, "extracting components");
        let outcome = analysis_step(
            analyzer,
            transcript,
            &self.ctx.policies.analysis(0),
        )
        .await;
        let components = match outcome.value {
            Some(components) => components,
            None => {
                logger.log_warning(&format!(
                    "Component extraction failed, using heuristic split: {}",
                    outcome.result.error.as_deref().unwrap_or("unknown error")
                ));
                heuristic_components(transcript)
            }
        };

        progress.progress(60, "analyzing content");
        let insights = match analyzer.analyze_content(transcript).await {
            Ok(insights) => insights,
            Err(e) => {
                logger.log_warning(&format!("Content analysis failed: {e}"));
                None
            }
        };

        progress.progress(90, "saving");
        self.ctx
            .adapters
            .documents
            .update_with(
                &job.video_id,
                Box::new(move |doc: &mut VideoDocument| {
                    doc.components = Some(components);
                    if insights.is_some() {
                        doc.insights = insights;
                    }
                }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobProcessor for AnalysisProcessor {
    fn name(&self) -> &'static str {
        "analysis"
    }

    fn job_types(&self) -> &'static [JobType] {
        &[JobType::Analysis]
    }

    async fn process(&self, job: &BackgroundJob, progress: &JobProgress) -> WorkerResult<()> {
        let logger = JobLogger::for_job(job);
        let JobPayload::Analysis(payload) = &job.payload else {
            let err = WorkerError::invalid_payload("expected an analysis payload");
            progress.fail(err.to_string());
            return Err(err);
        };

        logger.log_start(&format!("Analyzing video {}", payload.video_id));
        match self.run(job, &payload.transcript, progress, &logger).await {
            Ok(()) => {
                progress.complete();
                logger.log_completion(&format!("Video {} analyzed", payload.video_id));
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
