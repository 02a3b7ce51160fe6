//! Cloudflare R2 CDN uploader.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scribe_models::{CdnUpload, DependencyHealth, UploadSource};

use crate::body::read_limited;
use crate::error::{AdapterError, AdapterResult};
use crate::traits::CdnUploader;

/// Configuration for the R2 uploader.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL objects are served from
    pub public_base_url: String,
    /// Base URL of the embeddable player
    pub iframe_base_url: String,
    /// Key prefix for uploaded media
    pub key_prefix: String,
    /// Timeout for fetching URL sources before upload
    pub fetch_timeout: Duration,
    /// Largest URL source buffered for upload
    pub max_source_bytes: u64,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> AdapterResult<Self> {
        let public_base_url = std::env::var("R2_PUBLIC_URL")
            .map_err(|_| AdapterError::config("R2_PUBLIC_URL not set"))?
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| AdapterError::config("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| AdapterError::config("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| AdapterError::config("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| AdapterError::config("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            iframe_base_url: std::env::var("R2_IFRAME_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("{public_base_url}/embed")),
            public_base_url,
            key_prefix: std::env::var("R2_KEY_PREFIX").unwrap_or_else(|_| "videos".to_string()),
            fetch_timeout: Duration::from_secs(
                std::env::var("R2_FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_source_bytes: std::env::var("R2_MAX_SOURCE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500 * 1024 * 1024),
        })
    }

    /// Object key for a media id and original file name.
    pub fn object_key(&self, media_id: &str, filename: &str) -> String {
        let safe: String = filename
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = if safe.trim_matches('_').is_empty() {
            "video.mp4".to_string()
        } else {
            safe
        };
        format!("{}/{}/{}", self.key_prefix.trim_matches('/'), media_id, safe)
    }

    pub fn direct_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    pub fn iframe_url(&self, media_id: &str) -> String {
        format!("{}/{}", self.iframe_base_url, media_id)
    }
}

/// Uploads media to an R2 bucket through the S3 API.
#[derive(Clone)]
pub struct R2Uploader {
    client: Client,
    http: reqwest::Client,
    config: R2Config,
}

impl R2Uploader {
    /// Create a new uploader from configuration.
    pub fn new(config: R2Config) -> AdapterResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| AdapterError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Client::from_conf(sdk_config),
            http,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> AdapterResult<Self> {
        Self::new(R2Config::from_env()?)
    }

    async fn fetch_source(&self, url: &str) -> AdapterResult<(Vec<u8>, String)> {
        debug!(url, "Fetching media for upload");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::provider(
                status.as_u16(),
                format!("media source responded {status}"),
            ));
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let data = read_limited(response, self.config.max_source_bytes).await?;
        Ok((data, mime_type))
    }

    async fn put_bytes(&self, key: &str, data: Vec<u8>, content_type: &str) -> AdapterResult<()> {
        debug!(key, bytes = data.len(), "Uploading to R2");
        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AdapterError::storage(format!("R2 upload failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl CdnUploader for R2Uploader {
    async fn upload(&self, source: UploadSource, filename: &str) -> AdapterResult<CdnUpload> {
        let (data, mime_type) = match source {
            UploadSource::Bytes { data, mime_type } => (data, mime_type),
            UploadSource::Url(url) => self.fetch_source(&url).await?,
        };
        if data.is_empty() {
            return Err(AdapterError::invalid_input("Refusing to upload empty media"));
        }

        let media_id = Uuid::new_v4().to_string();
        let key = self.config.object_key(&media_id, filename);
        self.put_bytes(&key, data, &mime_type).await?;

        info!(key, media_id, "Uploaded media to R2");
        Ok(CdnUpload {
            iframe_url: self.config.iframe_url(&media_id),
            direct_url: self.config.direct_url(&key),
            media_id,
            thumbnail_url: None,
            preview_url: None,
        })
    }

    async fn health(&self) -> DependencyHealth {
        let start = Instant::now();
        match self
            .client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
        {
            Ok(_) => DependencyHealth::healthy().with_latency(start.elapsed().as_millis() as u64),
            Err(e) => {
                warn!("R2 connectivity check failed: {}", e);
                DependencyHealth::unhealthy(format!("R2 connectivity check failed: {e}"))
            }
        }
    }
}
