//! Direct HTTP downloader.
//!
//! Checks the URL with a HEAD request. Media served with range support is
//! handed on as a streamable URL so the CDN can pull it directly; anything
//! else is fetched into memory, bounded by `max_bytes`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use scribe_models::{DependencyHealth, DownloadOutcome, DownloadPayload, Platform, SourceMetadata};

use crate::body::read_limited;
use crate::error::{AdapterError, AdapterResult};
use crate::traits::Downloader;

/// Downloader configuration.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Largest payload buffered in memory
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_bytes: 100 * 1024 * 1024,
            user_agent: format!("scribe/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DownloaderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: std::env::var("DOWNLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_bytes: std::env::var("DOWNLOAD_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_bytes),
            user_agent: std::env::var("DOWNLOAD_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }
}

/// Downloads media straight from the source URL.
pub struct DirectDownloader {
    client: Client,
    config: DownloaderConfig,
}

impl DirectDownloader {
    pub fn new(config: DownloaderConfig) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AdapterError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> AdapterResult<Self> {
        Self::new(DownloaderConfig::from_env())
    }

    async fn fetch_bytes(&self, url: &str) -> AdapterResult<(Vec<u8>, Option<String>)> {
        let response = self.client.get(url).send().await?;
        check_status(response.status(), url)?;

        let mime_type = header_str(response.headers().get(CONTENT_TYPE));
        let data = read_limited(response, self.config.max_bytes).await?;
        Ok((data, mime_type))
    }
}

fn header_str(value: Option<&reqwest::header::HeaderValue>) -> Option<String> {
    value
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_status(status: StatusCode, url: &str) -> AdapterResult<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(AdapterError::not_found(url.to_string()));
    }
    if !status.is_success() {
        return Err(AdapterError::provider(
            status.as_u16(),
            format!("source responded {status}"),
        ));
    }
    Ok(())
}

fn is_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("video/")
        || essence == "application/octet-stream"
        || essence == "binary/octet-stream"
}

/// File name for a media URL: the last path segment, `video.mp4` if none.
pub fn filename_from_url(url: &str) -> String {
    let segment = url::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
    });

    match segment {
        Some(name) if name.contains('.') => name,
        Some(name) => format!("{name}.mp4"),
        None => "video.mp4".to_string(),
    }
}

#[async_trait]
impl Downloader for DirectDownloader {
    async fn download(&self, url: &str) -> AdapterResult<DownloadOutcome> {
        let parsed = url::Url::parse(url)
            .map_err(|e| AdapterError::invalid_input(format!("Invalid URL {url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AdapterError::invalid_input(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let platform = Platform::detect(url);
        let filename = filename_from_url(url);
        debug!(url, %platform, "Checking source media");

        let head = self.client.head(url).send().await?;
        let head_ok = head.status() != StatusCode::METHOD_NOT_ALLOWED;
        if head_ok {
            check_status(head.status(), url)?;
        }

        let content_type = header_str(head.headers().get(CONTENT_TYPE));
        if let Some(ct) = &content_type {
            if !is_media_type(ct) {
                return Err(AdapterError::invalid_input(format!(
                    "Source is not a video (content-type {ct})"
                )));
            }
        }

        let declared_len = header_str(head.headers().get(CONTENT_LENGTH))
            .and_then(|v| v.parse::<u64>().ok());
        let ranged = header_str(head.headers().get(ACCEPT_RANGES))
            .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));

        let payload = if head_ok && ranged {
            info!(url, "Source supports ranged reads, passing stream URL");
            DownloadPayload::Stream {
                url: head.url().to_string(),
                mime_type: content_type,
                filename,
            }
        } else {
            if let Some(len) = declared_len.filter(|len| *len > self.config.max_bytes) {
                return Err(AdapterError::invalid_input(format!(
                    "Media is {len} bytes, limit is {}",
                    self.config.max_bytes
                )));
            }
            let (data, mime_type) = self.fetch_bytes(url).await?;
            info!(url, bytes = data.len(), "Downloaded source media");
            DownloadPayload::Bytes {
                data,
                mime_type: mime_type
                    .or(content_type)
                    .unwrap_or_else(|| "video/mp4".to_string()),
                filename,
            }
        };

        Ok(DownloadOutcome {
            platform,
            payload,
            metadata: SourceMetadata::default(),
        })
    }

    async fn health(&self) -> DependencyHealth {
        DependencyHealth::healthy()
    }
}
