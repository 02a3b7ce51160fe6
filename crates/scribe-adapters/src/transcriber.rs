//! HTTP client for the transcription service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use scribe_models::{
    Platform, ProviderAvailability, ScriptComponents, SourceMetadata, Transcription,
};

use crate::error::{AdapterError, AdapterResult};
use crate::traits::Transcriber;

/// Transcription service configuration.
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// Base URL of the service
    pub endpoint: String,
    /// Bearer token, if the service requires one
    pub api_key: Option<String>,
    /// Request timeout. Long videos take a while.
    pub timeout: Duration,
}

impl TranscriberConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> AdapterResult<Self> {
        let endpoint = std::env::var("TRANSCRIBER_URL")
            .map_err(|_| AdapterError::config("TRANSCRIBER_URL not set"))?;
        let mut config = Self::new(endpoint);
        config.api_key = std::env::var("TRANSCRIBER_API_KEY").ok().filter(|k| !k.is_empty());
        if let Some(secs) = std::env::var("TRANSCRIBER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    url: &'a str,
    platform: Platform,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    transcript: String,
    #[serde(default)]
    components: Option<ScriptComponents>,
    #[serde(default)]
    metadata: Option<SourceMetadata>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    is_fallback: bool,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    providers: Option<ProvidersHealth>,
}

#[derive(Debug, Deserialize)]
struct ProvidersHealth {
    available: usize,
    total: usize,
}

/// Transcriber backed by a remote HTTP service.
pub struct HttpTranscriber {
    client: Client,
    config: TranscriberConfig,
}

impl HttpTranscriber {
    pub fn new(config: TranscriberConfig) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> AdapterResult<Self> {
        Self::new(TranscriberConfig::from_env()?)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, url: &str, platform: Platform) -> AdapterResult<Transcription> {
        let endpoint = format!("{}/transcribe", self.config.endpoint);
        debug!(url, %platform, "Requesting transcription");

        let response = self
            .request(self.client.post(&endpoint))
            .json(&TranscribeRequest { url, platform })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::provider(status.as_u16(), body));
        }

        let body: TranscribeResponse = response.json().await?;
        info!(
            url,
            chars = body.transcript.len(),
            fallback = body.is_fallback,
            "Transcription received"
        );

        Ok(Transcription {
            transcript: body.transcript,
            components: body.components,
            content_metadata: body.metadata,
            method: body.method.unwrap_or_else(|| "transcription-service".to_string()),
            transcribed_at: Utc::now(),
            is_fallback: body.is_fallback,
        })
    }

    async fn availability(&self) -> ProviderAvailability {
        let endpoint = format!("{}/health", self.config.endpoint);
        let response = match self.request(self.client.get(&endpoint)).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Transcription service health check failed: {}", e);
                return ProviderAvailability::new(0, 1);
            }
        };

        if !response.status().is_success() {
            return ProviderAvailability::new(0, 1);
        }

        match response.json::<HealthResponse>().await {
            Ok(HealthResponse {
                providers: Some(providers),
            }) => ProviderAvailability::new(providers.available, providers.total),
            _ => ProviderAvailability::new(1, 1),
        }
    }
}
