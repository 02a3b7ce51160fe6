//! Adapter calls wrapped as pipeline steps.
//!
//! Shared by the pipeline orchestrator and the job processors so both record
//! identical step results.

use scribe_adapters::{AdapterError, CdnUploader, ContentAnalyzer, Downloader, Transcriber};
use scribe_models::{
    CdnUpload, DownloadOutcome, Platform, PipelineStep, ScriptComponents, Transcription,
};

use crate::retry::{execute_step, StepOutcome, StepPolicy};
use crate::split::heuristic_components;

/// Download the source media.
pub async fn download_step(
    downloader: &dyn Downloader,
    url: &str,
    policy: &StepPolicy,
) -> StepOutcome<DownloadOutcome> {
    execute_step(PipelineStep::Download, policy, move || downloader.download(url))
        .await
        .summarize(DownloadOutcome::summary)
}

/// Upload downloaded media, preferring a streamable URL over bytes.
pub async fn upload_step(
    cdn: &dyn CdnUploader,
    download: &DownloadOutcome,
    filename: &str,
    policy: &StepPolicy,
) -> StepOutcome<CdnUpload> {
    execute_step(PipelineStep::CdnUpload, policy, move || {
        cdn.upload(download.upload_source(), filename)
    })
    .await
    .summarize(|upload| {
        serde_json::json!({
            "media_id": upload.media_id,
            "direct_url": upload.direct_url,
            "iframe_url": upload.iframe_url,
        })
    })
}

/// Transcribe a playable URL. An empty transcript counts as a failure.
pub async fn transcribe_step(
    transcriber: &dyn Transcriber,
    url: &str,
    platform: Platform,
    policy: &StepPolicy,
) -> StepOutcome<Transcription> {
    execute_step(PipelineStep::Transcription, policy, move || async move {
        let transcription = transcriber.transcribe(url, platform).await?;
        if transcription.transcript.trim().is_empty() {
            return Err(AdapterError::empty_result("Transcript is empty"));
        }
        Ok(transcription)
    })
    .await
    .summarize(|t| {
        serde_json::json!({
            "chars": t.transcript.len(),
            "method": t.method,
            "has_components": t.usable_components().is_some(),
            "is_fallback": t.is_fallback,
        })
    })
}

/// Extract components with the analyzer. `None` from the provider is a failure.
pub async fn analysis_step(
    analyzer: &dyn ContentAnalyzer,
    transcript: &str,
    policy: &StepPolicy,
) -> StepOutcome<ScriptComponents> {
    execute_step(PipelineStep::AiAnalysis, policy, move || async move {
        analyzer
            .extract_components(transcript)
            .await?
            .ok_or_else(|| AdapterError::empty_result("Analyzer returned no components"))
    })
    .await
    .summarize(|c| serde_json::json!({ "components": c }))
}

/// First non-blank URL among the candidates.
pub fn first_url<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

/// Where a run's components came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentSource {
    Transcriber,
    Analyzer,
    Heuristic,
}

/// Components the transcriber produced, or the heuristic split.
///
/// Callers run the analyzer in between when the transcriber gave nothing
/// usable; this is the last resort.
pub fn components_or_heuristic(
    transcription: &Transcription,
    analyzed: Option<ScriptComponents>,
) -> (ScriptComponents, ComponentSource) {
    if let Some(components) = transcription.usable_components() {
        return (components.clone(), ComponentSource::Transcriber);
    }
    match analyzed.filter(|c| !c.is_empty()) {
        Some(components) => (components, ComponentSource::Analyzer),
        None => (
            heuristic_components(&transcription.transcript),
            ComponentSource::Heuristic,
        ),
    }
}
