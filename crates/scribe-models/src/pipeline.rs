//! Pipeline run inputs and results.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::job::{JobId, JobStatus};
use crate::media::{Platform, ScriptComponents};
use crate::video::{TranscriptionStatus, VideoId};

/// Scheduling priority of a background job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
    Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-supplied options for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, Validate)]
pub struct PipelineOptions {
    #[validate(length(max = 200))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Target collection for the resulting document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,

    #[serde(default)]
    pub skip_transcription: bool,

    #[serde(default)]
    pub skip_analysis: bool,

    #[serde(default)]
    pub priority: Priority,

    #[validate(url)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_thumbnail: Option<String>,
}

/// Who asked for the run, and when.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self {
            user_id: None,
            session_id: None,
            request_id: None,
            started_at: Utc::now(),
        }
    }
}

/// Input to one pipeline run. Not mutated while the run is in flight.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct PipelineContext {
    #[validate(url)]
    pub source_url: String,

    #[validate(nested)]
    #[serde(default)]
    pub options: PipelineOptions,

    #[serde(default)]
    pub metadata: RequestMetadata,
}

impl PipelineContext {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            options: PipelineOptions::default(),
            metadata: RequestMetadata::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.metadata.user_id = Some(user_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.metadata.request_id = Some(request_id.into());
        self
    }
}

/// What to do when a pipeline step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackBehavior {
    /// Stop at the first failing step
    Fail,
    /// Record the failure as an error and keep going
    #[default]
    Partial,
    /// Record the failure as a warning and keep going
    Continue,
}

impl FallbackBehavior {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Some(Self::Fail),
            "partial" => Some(Self::Partial),
            "continue" => Some(Self::Continue),
            _ => None,
        }
    }
}

/// Named steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Download,
    CdnUpload,
    Transcription,
    AiAnalysis,
    BackgroundProcessing,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::Download => "download",
            PipelineStep::CdnUpload => "cdn_upload",
            PipelineStep::Transcription => "transcription",
            PipelineStep::AiAnalysis => "ai_analysis",
            PipelineStep::BackgroundProcessing => "background_processing",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one executed step. Created once and never changed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineStepResult {
    pub step: PipelineStep,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Small JSON summary of the step output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    pub retry_count: u32,
    pub attempts: u32,
}

impl PipelineStepResult {
    /// A step that failed before any attempt was made (e.g. missing input).
    pub fn skipped_failure(step: PipelineStep, error: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            duration_ms: 0,
            error: Some(error.into()),
            output: None,
            retry_count: 0,
            attempts: 0,
        }
    }
}

/// Summary of a run that reached the CDN.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FinalResult {
    pub platform: Platform,
    pub iframe_url: String,
    pub direct_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub media_id: String,
    pub transcription_status: TranscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<ScriptComponents>,
    /// Set when transcription was handed off to a background job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_job_id: Option<JobId>,
}

/// Result of a synchronous run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    pub total_duration_ms: u64,
    pub steps: Vec<PipelineStepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result: Option<FinalResult>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl PipelineExecutionResult {
    pub fn step(&self, step: PipelineStep) -> Option<&PipelineStepResult> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn step_names(&self) -> Vec<PipelineStep> {
        self.steps.iter().map(|s| s.step).collect()
    }
}

/// Handle returned by a background run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundExecution {
    pub job_id: JobId,
    pub estimated_duration_secs: u64,
}

/// Externally visible status of a background run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionStatus {
    pub status: JobStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
