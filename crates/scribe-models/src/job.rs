//! Background job definitions.
//!
//! A [`BackgroundJob`] is the unit of queued work. Its step-specific state
//! lives in a typed [`JobPayload`]; the job type is derived from the payload
//! variant so the two can never disagree.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::media::{CdnUpload, DownloadOutcome};
use crate::pipeline::{PipelineContext, PipelineOptions, Priority};
use crate::video::{VideoDocument, VideoId};

/// Unique identifier for a background job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Type of background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Transcribe a video and extract script components
    Transcription,
    /// Run AI analysis over an existing transcript
    Analysis,
    /// Upload downloaded media to the CDN
    Upload,
    /// Ingest a source URL (download + CDN upload)
    Processing,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::Transcription,
        JobType::Analysis,
        JobType::Upload,
        JobType::Processing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Transcription => "transcription",
            JobType::Analysis => "analysis",
            JobType::Upload => "upload",
            JobType::Processing => "processing",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle status.
///
/// `pending -> running -> completed | failed`, and `pending -> cancelled`.
/// Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued waiting for a worker
    #[default]
    Pending,
    /// Job was claimed by a worker and its processor is running
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
    /// Job was cancelled before it started
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Re-asserting the current non-terminal status is allowed so that
    /// progress-only updates can carry it.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (current, next) if *current == next => !current.is_terminal(),
            (JobStatus::Pending, JobStatus::Running | JobStatus::Cancelled) => true,
            (JobStatus::Running, JobStatus::Completed | JobStatus::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a transcription job gets its media from.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptionSource {
    /// The video was already downloaded and uploaded by the caller.
    Ingested {
        video: Box<VideoDocument>,
        download: Option<DownloadOutcome>,
        upload: Option<CdnUpload>,
    },
    /// The job covers the entire pipeline starting from the source URL.
    SourceUrl { context: Box<PipelineContext> },
}

/// Payload of a transcription job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptionJobPayload {
    pub source: TranscriptionSource,
    #[serde(default)]
    pub options: PipelineOptions,
    /// Retries allowed for each external call made by the job
    #[serde(default = "default_job_retries")]
    pub max_retries: u32,
}

fn default_job_retries() -> u32 {
    2
}

/// Payload of an analysis job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisJobPayload {
    pub video_id: VideoId,
    pub transcript: String,
}

/// Payload of an upload job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadJobPayload {
    pub video_id: VideoId,
    pub download: DownloadOutcome,
    pub filename: String,
    #[serde(default = "default_job_retries")]
    pub max_retries: u32,
}

/// Payload of a processing (ingest) job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingJobPayload {
    pub video_id: VideoId,
    pub context: PipelineContext,
    #[serde(default = "default_job_retries")]
    pub max_retries: u32,
}

/// Typed step state carried by a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    Transcription(TranscriptionJobPayload),
    Analysis(AnalysisJobPayload),
    Upload(UploadJobPayload),
    Processing(ProcessingJobPayload),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::Transcription(_) => JobType::Transcription,
            JobPayload::Analysis(_) => JobType::Analysis,
            JobPayload::Upload(_) => JobType::Upload,
            JobPayload::Processing(_) => JobType::Processing,
        }
    }
}

/// A queued unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundJob {
    /// Unique job ID
    pub id: JobId,

    /// Job type (always matches the payload variant)
    pub job_type: JobType,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Video the job works on
    pub video_id: VideoId,

    /// Playable or source URL, when known at enqueue time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Progress (0-100), never decreases
    #[serde(default)]
    pub progress: u8,

    /// Dequeue priority (only honored by the priority strategy)
    #[serde(default)]
    pub priority: Priority,

    /// Human-readable label of the step in progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completed at timestamp (set for every terminal state)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Step-specific state
    pub payload: JobPayload,
}

impl BackgroundJob {
    /// Create a new pending job.
    pub fn new(
        video_id: VideoId,
        video_url: Option<String>,
        priority: Priority,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: JobId::new(),
            job_type: payload.job_type(),
            status: JobStatus::Pending,
            video_id,
            video_url,
            progress: 0,
            priority,
            current_step: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            payload,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Partial update merged into a queued job.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub current_step: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub video_url: Option<String>,
    pub payload: Option<JobPayload>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn with_payload(mut self, payload: JobPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Live job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn analysis_job() -> BackgroundJob {
        BackgroundJob::new(
            VideoId::new(),
            None,
            Priority::Normal,
            JobPayload::Analysis(AnalysisJobPayload {
                video_id: VideoId::new(),
                transcript: "Hello there.".to_string(),
            }),
        )
    }

    #[test]
    fn test_job_type_follows_payload() {
        let job = analysis_job();
        assert_eq!(job.job_type, JobType::Analysis);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_status_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Running.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            for next in JobStatus::ALL {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_payload_serializes_with_type_tag() {
        let job = analysis_job();
        let json = assert_ok!(serde_json::to_value(&job.payload));
        assert_eq!(json["type"], "analysis");
        assert_eq!(json["transcript"], "Hello there.");
    }
}
