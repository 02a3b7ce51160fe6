//! Shared data models for the Scribe video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Pipeline runs (context, options, step and execution results)
//! - Background jobs, their typed payloads and the job state machine
//! - Media, transcript and script-component payloads exchanged with adapters
//! - Video documents persisted through the document store
//! - Health reporting

pub mod health;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod video;

// Re-export common types
pub use health::{DependencyHealth, HealthReport, HealthState, ProviderAvailability};
pub use job::{
    AnalysisJobPayload, BackgroundJob, JobId, JobPayload, JobStats, JobStatus, JobType, JobUpdate,
    ProcessingJobPayload, TranscriptionJobPayload, TranscriptionSource, UploadJobPayload,
};
pub use media::{
    CdnUpload, ContentInsights, DownloadOutcome, DownloadPayload, EngagementMetrics, Platform,
    ScriptComponents, SourceMetadata, Transcription, UploadSource,
};
pub use pipeline::{
    BackgroundExecution, ExecutionStatus, FallbackBehavior, FinalResult, PipelineContext,
    PipelineExecutionResult, PipelineOptions, PipelineStep, PipelineStepResult, Priority,
    RequestMetadata,
};
pub use video::{TranscriptionStatus, VideoDocument, VideoId};
