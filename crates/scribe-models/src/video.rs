//! Video documents persisted through the document store.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::media::{
    CdnUpload, ContentInsights, DownloadOutcome, Platform, ScriptComponents, SourceMetadata,
};
use crate::pipeline::PipelineContext;

/// Unique identifier for a video document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
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

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transcription state of a video document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl TranscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionStatus::Pending => "pending",
            TranscriptionStatus::Processing => "processing",
            TranscriptionStatus::Completed => "completed",
            TranscriptionStatus::Failed => "failed",
            TranscriptionStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TranscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted record of an ingested video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoDocument {
    pub id: VideoId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub source_url: String,

    #[serde(default)]
    pub platform: Platform,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iframe_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Media identifier assigned by the CDN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,

    #[serde(default)]
    pub metadata: SourceMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<ScriptComponents>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<ContentInsights>,

    #[serde(default)]
    pub transcription_status: TranscriptionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription_error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl VideoDocument {
    /// Minimal document for a source URL.
    pub fn new(id: VideoId, source_url: impl Into<String>) -> Self {
        let source_url = source_url.into();
        let now = Utc::now();
        Self {
            id,
            user_id: None,
            collection_id: None,
            title: None,
            platform: Platform::detect(&source_url),
            source_url,
            iframe_url: None,
            direct_url: None,
            thumbnail_url: None,
            media_id: None,
            metadata: SourceMetadata::default(),
            transcript: None,
            components: None,
            insights: None,
            transcription_status: TranscriptionStatus::Pending,
            transcription_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the document for a freshly ingested video.
    ///
    /// A custom thumbnail from the options wins over the CDN and source
    /// thumbnails.
    pub fn from_ingest(
        id: VideoId,
        context: &PipelineContext,
        download: Option<&DownloadOutcome>,
        upload: Option<&CdnUpload>,
    ) -> Self {
        let mut doc = Self::new(id, &context.source_url);
        doc.user_id = context.metadata.user_id.clone();
        doc.collection_id = context.options.collection_id.clone();
        doc.title = context.options.title.clone();
        doc.transcription_status = if context.options.skip_transcription {
            TranscriptionStatus::Skipped
        } else {
            TranscriptionStatus::Pending
        };

        if let Some(download) = download {
            doc.platform = download.platform;
            doc.metadata.merge(&download.metadata);
        }
        if let Some(upload) = upload {
            doc.apply_upload(upload);
        }
        if let Some(thumbnail) = &context.options.custom_thumbnail {
            doc.thumbnail_url = Some(thumbnail.clone());
        }
        doc
    }

    /// Record CDN locations. Keeps an existing thumbnail when the upload has none.
    pub fn apply_upload(&mut self, upload: &CdnUpload) {
        self.iframe_url = Some(upload.iframe_url.clone());
        self.direct_url = Some(upload.direct_url.clone());
        self.media_id = Some(upload.media_id.clone());
        let thumbnail = upload
            .thumbnail_url
            .clone()
            .or_else(|| self.metadata.thumbnail_url.clone());
        if thumbnail.is_some() {
            self.thumbnail_url = thumbnail;
        }
        self.touch();
    }

    /// Record a finished transcription.
    pub fn apply_transcript(
        &mut self,
        transcript: impl Into<String>,
        components: ScriptComponents,
        content_metadata: Option<&SourceMetadata>,
    ) {
        self.transcript = Some(transcript.into());
        self.components = Some(components);
        if let Some(metadata) = content_metadata {
            self.metadata.merge(metadata);
        }
        self.transcription_status = TranscriptionStatus::Completed;
        self.transcription_error = None;
        self.touch();
    }

    pub fn mark_transcription(&mut self, status: TranscriptionStatus, error: Option<String>) {
        self.transcription_status = status;
        self.transcription_error = error;
        self.touch();
    }

    /// Best playable URL known for the document.
    pub fn playable_url(&self) -> Option<&str> {
        self.direct_url
            .as_deref()
            .or(self.iframe_url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
