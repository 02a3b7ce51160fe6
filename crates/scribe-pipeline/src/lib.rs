//! Video pipeline orchestrator.
//!
//! This crate provides:
//! - Synchronous and background pipeline runs over the adapter traits
//! - Execution status, cancellation and health reporting
//! - Graceful shutdown of the background job service

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::{PipelineConfig, StepPolicies};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{estimate_duration_secs, validate_context, PipelineOrchestrator};
