//! Orchestrator tests against fake adapters.

use std::sync::Arc;
use std::time::Duration;

use scribe_adapters::testing::{
    FakeAdapters, FakeAnalyzer, FakeDownloader, FakeTranscriber, FakeUploader,
};
use scribe_adapters::DocumentStore;
use scribe_models::{
    DependencyHealth, FallbackBehavior, HealthState, JobStatus, PipelineContext, PipelineOptions,
    PipelineStep, ScriptComponents, TranscriptionStatus,
};
use scribe_pipeline::{
    estimate_duration_secs, PipelineConfig, PipelineError, PipelineOrchestrator, StepPolicies,
};
use scribe_queue::JobQueue;
use scribe_worker::{
    BackoffPolicy, JobService, JobStepPolicies, StepPolicy, StepTimeouts, WorkerConfig,
};
use tokio_test::{assert_err, assert_ok};

const SOURCE_URL: &str = "https://www.tiktok.com/@creator/video/1";

fn fast_policy() -> StepPolicy {
    StepPolicy::new(
        1,
        Duration::from_secs(5),
        BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(2)),
    )
}

fn fast_config(fallback: FallbackBehavior) -> PipelineConfig {
    let mut config = PipelineConfig::default()
        .with_fallback(fallback)
        .with_policies(StepPolicies {
            download: fast_policy(),
            cdn_upload: fast_policy(),
            transcription: fast_policy(),
            analysis: fast_policy(),
        });
    config.drain_interval = Duration::from_millis(20);
    config.shutdown_timeout = Duration::from_secs(5);
    config
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        worker_count: 1,
        poll_interval: Duration::from_millis(20),
        job_max_retries: 1,
        policies: JobStepPolicies {
            timeouts: StepTimeouts::uniform(Duration::from_secs(5)),
            backoff: BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(2)),
        },
    }
}

fn orchestrator(fakes: &FakeAdapters, config: PipelineConfig) -> PipelineOrchestrator {
    let jobs = Arc::new(JobService::with_adapters(
        fakes.adapters(),
        Arc::new(JobQueue::default()),
        worker_config(),
    ));
    PipelineOrchestrator::new(fakes.adapters(), jobs, config)
}

fn context_with(options: PipelineOptions) -> PipelineContext {
    PipelineContext::new(SOURCE_URL).with_options(options)
}

fn skip_analysis() -> PipelineOptions {
    PipelineOptions {
        skip_analysis: true,
        ..Default::default()
    }
}

fn steps(result: &scribe_models::PipelineExecutionResult) -> Vec<PipelineStep> {
    result.steps.iter().map(|s| s.step).collect()
}

#[tokio::test]
async fn sync_run_executes_every_step_in_order() {
    let analyzed = ScriptComponents::new("Hook", "Bridge", "Nugget", "Follow up");
    let fakes = FakeAdapters::happy("Some transcript")
        .with_analyzer(FakeAnalyzer::returning(analyzed.clone()));
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let result = orchestrator.execute(PipelineContext::new(SOURCE_URL)).await;

    assert!(result.success);
    assert!(result.errors.is_empty());
    assert_eq!(
        steps(&result),
        vec![
            PipelineStep::Download,
            PipelineStep::CdnUpload,
            PipelineStep::Transcription,
            PipelineStep::AiAnalysis,
        ]
    );

    let final_result = result.final_result.unwrap();
    assert_eq!(final_result.transcription_status, TranscriptionStatus::Completed);
    assert_eq!(final_result.transcript.as_deref(), Some("Some transcript"));
    assert_eq!(final_result.components, Some(analyzed.clone()));
    assert!(final_result.background_job_id.is_none());

    let video_id = result.video_id.unwrap();
    let doc = fakes.documents.get(&video_id).await.unwrap().unwrap();
    assert_eq!(doc.transcription_status, TranscriptionStatus::Completed);
    assert_eq!(doc.components, Some(analyzed));
}

#[tokio::test]
async fn skipped_analysis_splits_transcript_into_components() {
    let fakes = FakeAdapters::happy("A. B. C. D.");
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let result = orchestrator.execute(context_with(skip_analysis())).await;

    assert!(result.success);
    assert_eq!(
        steps(&result),
        vec![
            PipelineStep::Download,
            PipelineStep::CdnUpload,
            PipelineStep::Transcription,
        ]
    );
    let final_result = result.final_result.unwrap();
    assert_eq!(final_result.transcription_status, TranscriptionStatus::Completed);
    assert_eq!(
        final_result.components,
        Some(ScriptComponents::new("A.", "B.", "C.", "D."))
    );
    assert_eq!(fakes.analyzer.calls(), 0);
}

#[tokio::test]
async fn analyzer_failure_is_a_warning() {
    let fakes = FakeAdapters::happy("A. B. C. D.").with_analyzer(FakeAnalyzer::failing("quota"));
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Fail));

    let result = orchestrator.execute(PipelineContext::new(SOURCE_URL)).await;

    assert!(result.success);
    assert!(result.errors.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("ai_analysis"));
    assert_eq!(
        result.final_result.unwrap().components,
        Some(ScriptComponents::new("A.", "B.", "C.", "D."))
    );
}

#[tokio::test]
async fn fail_behavior_stops_after_failed_download() {
    let fakes = FakeAdapters::happy("unused").with_downloader(FakeDownloader::failing("gone"));
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Fail));

    let result = orchestrator.execute(PipelineContext::new(SOURCE_URL)).await;

    assert!(!result.success);
    assert_eq!(steps(&result), vec![PipelineStep::Download]);
    assert_eq!(result.steps[0].attempts, 2);
    assert_eq!(result.steps[0].retry_count, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.final_result.is_none());
    assert!(result.video_id.is_none());
    assert_eq!(fakes.cdn.calls(), 0);
    assert_eq!(fakes.transcriber.calls(), 0);
}

#[tokio::test]
async fn partial_behavior_keeps_going_and_reports_errors() {
    let fakes = FakeAdapters::happy("A. B. C. D.").with_downloader(FakeDownloader::failing("gone"));
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let result = orchestrator.execute(context_with(skip_analysis())).await;

    assert!(result.success);
    assert_eq!(
        steps(&result),
        vec![
            PipelineStep::Download,
            PipelineStep::CdnUpload,
            PipelineStep::Transcription,
        ]
    );
    assert_eq!(result.errors.len(), 2);
    assert!(!result.steps[1].success);
    assert_eq!(result.steps[1].attempts, 0);
    assert!(result.steps[2].success);
    assert_eq!(fakes.transcriber.urls(), vec![SOURCE_URL.to_string()]);
    // Nothing reached the CDN, so there is no final result to report.
    assert!(result.final_result.is_none());
}

#[tokio::test]
async fn continue_behavior_records_warnings() {
    let fakes =
        FakeAdapters::happy("A. B. C. D.").with_cdn(FakeUploader::failing("bucket missing"));
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Continue));

    let result = orchestrator.execute(context_with(skip_analysis())).await;

    assert!(result.success);
    assert!(result.errors.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("cdn_upload"));
    assert_eq!(result.steps.len(), 3);
    assert!(fakes.documents.is_empty().await);
}

#[tokio::test]
async fn fail_behavior_stops_after_failed_transcription() {
    let fakes = FakeAdapters::happy("unused")
        .with_transcriber(FakeTranscriber::failing("provider down"));
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Fail));

    let result = orchestrator.execute(PipelineContext::new(SOURCE_URL)).await;

    assert!(!result.success);
    assert_eq!(
        steps(&result),
        vec![
            PipelineStep::Download,
            PipelineStep::CdnUpload,
            PipelineStep::Transcription,
        ]
    );
    assert!(result.video_id.is_some());
    assert!(result.final_result.is_none());
    assert_eq!(fakes.analyzer.calls(), 0);
}

#[tokio::test]
async fn skipped_transcription_reports_skipped_status() {
    let fakes = FakeAdapters::happy("unused");
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));
    let options = PipelineOptions {
        skip_transcription: true,
        ..Default::default()
    };

    let result = orchestrator.execute(context_with(options)).await;

    assert!(result.success);
    assert_eq!(result.steps.len(), 2);
    let final_result = result.final_result.unwrap();
    assert_eq!(final_result.transcription_status, TranscriptionStatus::Skipped);
    assert!(final_result.transcript.is_none());
    assert_eq!(fakes.transcriber.calls(), 0);
}

#[tokio::test]
async fn background_mode_stores_document_when_transcription_skipped() {
    let fakes = FakeAdapters::happy("unused");
    let orchestrator = orchestrator(
        &fakes,
        fast_config(FallbackBehavior::Partial).with_background(true),
    );
    let options = PipelineOptions {
        skip_transcription: true,
        ..Default::default()
    };

    let result = orchestrator.execute(context_with(options)).await;

    assert!(result.success);
    assert_eq!(
        steps(&result),
        vec![PipelineStep::Download, PipelineStep::CdnUpload]
    );
    let final_result = result.final_result.unwrap();
    assert_eq!(final_result.transcription_status, TranscriptionStatus::Skipped);
    assert!(final_result.background_job_id.is_none());
    assert_eq!(orchestrator.jobs().get_stats().total, 0);

    let video_id = result.video_id.unwrap();
    let doc = fakes.documents.get(&video_id).await.unwrap().unwrap();
    assert_eq!(doc.transcription_status, TranscriptionStatus::Skipped);
    assert_eq!(doc.direct_url, Some(final_result.direct_url));
}

#[tokio::test]
async fn invalid_context_fails_without_calling_adapters() {
    let fakes = FakeAdapters::happy("unused");
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let result = orchestrator.execute(PipelineContext::new("ftp://example.com/video")).await;

    assert!(!result.success);
    assert_eq!(steps(&result), vec![PipelineStep::Download]);
    assert_eq!(result.steps[0].attempts, 0);
    assert!(result.errors[0].contains("Unsupported URL scheme"));
    assert_eq!(fakes.downloader.calls(), 0);
}

#[tokio::test]
async fn background_mode_hands_off_transcription() {
    let fakes = FakeAdapters::happy("A. B. C. D.");
    let orchestrator = orchestrator(
        &fakes,
        fast_config(FallbackBehavior::Partial).with_background(true),
    );

    let result = orchestrator.execute(context_with(skip_analysis())).await;

    assert!(result.success);
    assert_eq!(
        steps(&result),
        vec![
            PipelineStep::Download,
            PipelineStep::CdnUpload,
            PipelineStep::BackgroundProcessing,
        ]
    );
    let final_result = result.final_result.unwrap();
    assert_eq!(final_result.transcription_status, TranscriptionStatus::Processing);
    let job_id = final_result.background_job_id.unwrap();
    assert_eq!(
        result.steps[2].output.as_ref().unwrap()["job_id"],
        serde_json::json!(job_id)
    );
    assert_eq!(fakes.transcriber.calls(), 0);

    let video_id = result.video_id.unwrap();
    let doc = fakes.documents.get(&video_id).await.unwrap().unwrap();
    assert_eq!(doc.transcription_status, TranscriptionStatus::Pending);

    let status = orchestrator.get_execution_status(&job_id).unwrap();
    assert_eq!(status.status, JobStatus::Pending);

    assert!(orchestrator.jobs().process_next_job().await);

    let status = orchestrator.get_execution_status(&job_id).unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.progress, 100);
    let doc = fakes.documents.get(&video_id).await.unwrap().unwrap();
    assert_eq!(doc.transcription_status, TranscriptionStatus::Completed);
    assert_eq!(
        doc.components,
        Some(ScriptComponents::new("A.", "B.", "C.", "D."))
    );
}

#[tokio::test]
async fn execute_background_rejects_invalid_url_before_queueing() {
    let fakes = FakeAdapters::happy("unused");
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let err = assert_err!(orchestrator.execute_background(PipelineContext::new("not a url")));

    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(orchestrator.jobs().get_stats().total, 0);
}

#[tokio::test]
async fn execute_background_queues_and_cancels() {
    let fakes = FakeAdapters::happy("unused");
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let execution = assert_ok!(orchestrator.execute_background(context_with(skip_analysis())));
    assert_eq!(
        execution.estimated_duration_secs,
        estimate_duration_secs(&skip_analysis())
    );

    let status = orchestrator.get_execution_status(&execution.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Pending);
    assert_eq!(status.progress, 0);

    assert!(orchestrator.cancel_execution(&execution.job_id));
    assert!(!orchestrator.cancel_execution(&execution.job_id));
    let status = orchestrator.get_execution_status(&execution.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Cancelled);

    // A cancelled job is never claimed.
    assert!(!orchestrator.jobs().process_next_job().await);
    assert_eq!(fakes.downloader.calls(), 0);
}

#[tokio::test]
async fn execute_background_runs_whole_pipeline_in_job() {
    let fakes = FakeAdapters::happy("A. B. C. D.");
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let execution = assert_ok!(orchestrator.execute_background(context_with(skip_analysis())));
    assert!(orchestrator.jobs().process_next_job().await);

    let status = orchestrator.get_execution_status(&execution.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(fakes.downloader.urls(), vec![SOURCE_URL.to_string()]);
    assert_eq!(fakes.cdn.calls(), 1);
    assert_eq!(fakes.transcriber.calls(), 1);
    assert_eq!(fakes.documents.len().await, 1);
}

#[tokio::test]
async fn unknown_execution_has_no_status() {
    let fakes = FakeAdapters::happy("unused");
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let unknown = scribe_models::JobId::new();
    assert!(orchestrator.get_execution_status(&unknown).is_none());
    assert!(!orchestrator.cancel_execution(&unknown));
}

#[tokio::test]
async fn health_reflects_worst_dependency() {
    let fakes = FakeAdapters::happy("unused");
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));

    let report = orchestrator.get_health_status().await;
    assert_eq!(report.status, HealthState::Healthy);
    assert_eq!(report.dependencies.len(), 6);

    fakes
        .cdn
        .set_health(DependencyHealth::unhealthy("R2 credentials rejected"));
    let report = orchestrator.get_health_status().await;
    assert_eq!(report.status, HealthState::Unhealthy);
    assert_eq!(
        report.dependency("cdn").unwrap().state,
        HealthState::Unhealthy
    );
    assert_eq!(
        report.dependency("downloader").unwrap().state,
        HealthState::Healthy
    );
}

#[tokio::test]
async fn stopped_job_service_is_unhealthy_in_background_mode() {
    let fakes = FakeAdapters::happy("unused");
    let orchestrator = orchestrator(
        &fakes,
        fast_config(FallbackBehavior::Partial).with_background(true),
    );

    let report = orchestrator.get_health_status().await;
    assert_eq!(report.status, HealthState::Unhealthy);
    assert_eq!(
        report.dependency("job_queue").unwrap().state,
        HealthState::Unhealthy
    );

    orchestrator.jobs().start();
    let report = orchestrator.get_health_status().await;
    assert_eq!(report.status, HealthState::Healthy);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn shutdown_waits_for_running_job() {
    let fakes = FakeAdapters::happy("A. B. C. D.").with_transcriber(
        FakeTranscriber::returning("A. B. C. D.").with_delay(Duration::from_millis(300)),
    );
    let orchestrator = orchestrator(&fakes, fast_config(FallbackBehavior::Partial));
    orchestrator.jobs().start();

    let execution = assert_ok!(orchestrator.execute_background(context_with(skip_analysis())));

    let mut waited = Duration::ZERO;
    while orchestrator.get_execution_status(&execution.job_id).unwrap().status
        != JobStatus::Running
    {
        assert!(waited < Duration::from_secs(5), "job never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }

    orchestrator.shutdown().await;

    assert!(!orchestrator.jobs().is_running());
    assert_eq!(orchestrator.jobs().get_stats().running, 0);
    let status = orchestrator.get_execution_status(&execution.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Completed);
}

#[test]
fn estimate_depends_on_skipped_stages() {
    assert_eq!(estimate_duration_secs(&PipelineOptions::default()), 75);
    assert_eq!(estimate_duration_secs(&skip_analysis()), 60);
    let nothing = PipelineOptions {
        skip_transcription: true,
        skip_analysis: true,
        ..Default::default()
    };
    assert_eq!(estimate_duration_secs(&nothing), 30);
}
