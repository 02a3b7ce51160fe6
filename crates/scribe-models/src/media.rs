//! Media, transcript and analysis payloads exchanged with the adapters.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Social platform a source URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Instagram,
    Youtube,
    #[default]
    Other,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Youtube => "youtube",
            Platform::Other => "other",
        }
    }

    /// Detect the platform from a URL's host.
    ///
    /// Unparseable URLs and unknown hosts map to [`Platform::Other`].
    pub fn detect(url: &str) -> Self {
        let host = match url::Url::parse(url.trim()) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => host.to_ascii_lowercase(),
                None => return Platform::Other,
            },
            Err(_) => return Platform::Other,
        };

        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

        if matches("tiktok.com") {
            Platform::Tiktok
        } else if matches("instagram.com") || matches("instagr.am") {
            Platform::Instagram
        } else if matches("youtube.com") || matches("youtu.be") {
            Platform::Youtube
        } else {
            Platform::Other
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Engagement counters reported by the source platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EngagementMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<u64>,
}

/// Descriptive metadata about the source video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub metrics: EngagementMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl SourceMetadata {
    /// Merge newer metadata into `self`, preferring newer non-empty values.
    pub fn merge(&mut self, newer: &SourceMetadata) {
        fn pick(current: &mut Option<String>, newer: &Option<String>) {
            if let Some(value) = newer.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *current = Some(value.to_string());
            }
        }

        pick(&mut self.author, &newer.author);
        pick(&mut self.description, &newer.description);
        pick(&mut self.thumbnail_url, &newer.thumbnail_url);

        if !newer.hashtags.is_empty() {
            self.hashtags = newer.hashtags.clone();
        }
        if newer.duration_secs.is_some() {
            self.duration_secs = newer.duration_secs;
        }

        let metrics = &newer.metrics;
        self.metrics.views = metrics.views.or(self.metrics.views);
        self.metrics.likes = metrics.likes.or(self.metrics.likes);
        self.metrics.comments = metrics.comments.or(self.metrics.comments);
        self.metrics.shares = metrics.shares.or(self.metrics.shares);
    }
}

/// Media produced by the downloader.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadPayload {
    /// Raw bytes held in memory.
    Bytes {
        data: Vec<u8>,
        mime_type: String,
        filename: String,
    },
    /// A URL the CDN can pull from directly.
    Stream {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        filename: String,
    },
}

/// Successful downloader output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadOutcome {
    pub platform: Platform,
    pub payload: DownloadPayload,
    #[serde(default)]
    pub metadata: SourceMetadata,
}

impl DownloadOutcome {
    pub fn filename(&self) -> &str {
        match &self.payload {
            DownloadPayload::Bytes { filename, .. } | DownloadPayload::Stream { filename, .. } => {
                filename
            }
        }
    }

    /// Streamable URL, when the downloader reported one.
    pub fn stream_url(&self) -> Option<&str> {
        match &self.payload {
            DownloadPayload::Stream { url, .. } => Some(url),
            DownloadPayload::Bytes { .. } => None,
        }
    }

    /// Size of the buffered payload (0 for streams).
    pub fn size_bytes(&self) -> usize {
        match &self.payload {
            DownloadPayload::Bytes { data, .. } => data.len(),
            DownloadPayload::Stream { .. } => 0,
        }
    }

    /// What to hand to the CDN. A streamable URL is preferred so large
    /// payloads are not transferred twice.
    pub fn upload_source(&self) -> UploadSource {
        match &self.payload {
            DownloadPayload::Stream { url, .. } => UploadSource::Url(url.clone()),
            DownloadPayload::Bytes {
                data, mime_type, ..
            } => UploadSource::Bytes {
                data: data.clone(),
                mime_type: mime_type.clone(),
            },
        }
    }

    /// JSON summary for step results (never includes the raw bytes).
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "platform": self.platform,
            "filename": self.filename(),
            "streamed": self.stream_url().is_some(),
            "size_bytes": self.size_bytes(),
        })
    }
}

/// Input for a CDN upload.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes { data: Vec<u8>, mime_type: String },
    Url(String),
}

/// Successful CDN upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CdnUpload {
    pub iframe_url: String,
    pub direct_url: String,
    /// Opaque media identifier assigned by the CDN
    pub media_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl CdnUpload {
    /// Best URL for playback-based consumers such as transcription.
    pub fn playable_url(&self) -> Option<&str> {
        [self.direct_url.as_str(), self.iframe_url.as_str()]
            .into_iter()
            .find(|url| !url.trim().is_empty())
    }
}

/// Hook / bridge / nugget / call-to-action split of a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptComponents {
    pub hook: String,
    pub bridge: String,
    pub nugget: String,
    /// Call to action
    pub wta: String,
}

impl ScriptComponents {
    pub fn new(
        hook: impl Into<String>,
        bridge: impl Into<String>,
        nugget: impl Into<String>,
        wta: impl Into<String>,
    ) -> Self {
        Self {
            hook: hook.into(),
            bridge: bridge.into(),
            nugget: nugget.into(),
            wta: wta.into(),
        }
    }

    /// True when every component is blank.
    pub fn is_empty(&self) -> bool {
        [&self.hook, &self.bridge, &self.nugget, &self.wta]
            .iter()
            .all(|part| part.trim().is_empty())
    }
}

/// Transcriber output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transcription {
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<ScriptComponents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_metadata: Option<SourceMetadata>,
    /// How the transcript was produced (provider or technique)
    #[serde(default)]
    pub method: String,
    pub transcribed_at: DateTime<Utc>,
    /// The provider only produced a degraded, fallback transcript
    #[serde(default)]
    pub is_fallback: bool,
}

impl Transcription {
    /// Components worth keeping: present, non-empty and not from a fallback run.
    pub fn usable_components(&self) -> Option<&ScriptComponents> {
        if self.is_fallback {
            return None;
        }
        self.components.as_ref().filter(|c| !c.is_empty())
    }
}

/// General content analysis of a transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentInsights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}
