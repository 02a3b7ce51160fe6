//! Step execution and background jobs for the Scribe pipeline.
//!
//! This crate provides:
//! - Retry/timeout executor that turns adapter calls into step results
//! - Job processors for transcription, analysis, upload and processing jobs
//! - Background job service with a small worker pool
//! - Heuristic script component split
//! - Structured job logging and metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod processors;
pub mod retry;
pub mod service;
pub mod split;
pub mod steps;

pub use config::{JobStepPolicies, StepTimeouts, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use processors::{
    default_processors, AnalysisProcessor, JobProcessor, ProcessingProcessor, ProcessorContext,
    TranscriptionProcessor, UploadProcessor,
};
pub use retry::{execute_step, BackoffPolicy, StepOutcome, StepPolicy};
pub use service::JobService;
pub use split::{heuristic_components, split_sentences};
pub use steps::ComponentSource;
