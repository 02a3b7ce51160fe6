//! Gemini content analyzer.
//!
//! Extracts hook / bridge / nugget / call-to-action components and general
//! content insights from a transcript. Models are tried in order; a model
//! that keeps failing is skipped until it recovers.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use scribe_models::{ContentInsights, ProviderAvailability, ScriptComponents};

use crate::error::{AdapterError, AdapterResult};
use crate::traits::ContentAnalyzer;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODELS: [&str; 3] = ["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Models in order of preference
    pub models: Vec<String>,
    /// Consecutive failures after which a model counts as unavailable
    pub failure_threshold: u32,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            failure_threshold: 3,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> AdapterResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| AdapterError::config("GEMINI_API_KEY not set"))?;
        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(models) = std::env::var("GEMINI_MODELS") {
            let models: Vec<String> = models
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if !models.is_empty() {
                config.models = models;
            }
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini-backed [`ContentAnalyzer`].
pub struct GeminiAnalyzer {
    client: Client,
    config: GeminiConfig,
    /// Consecutive failures per model
    failures: Mutex<HashMap<String, u32>>,
}

impl GeminiAnalyzer {
    pub fn new(config: GeminiConfig) -> AdapterResult<Self> {
        if config.models.is_empty() {
            return Err(AdapterError::config("No Gemini models configured"));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            failures: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_env() -> AdapterResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn record(&self, model: &str, ok: bool) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if ok {
            failures.remove(model);
        } else {
            *failures.entry(model.to_string()).or_insert(0) += 1;
        }
    }

    fn is_available(&self, model: &str) -> bool {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.get(model).copied().unwrap_or(0) < self.config.failure_threshold
    }

    /// Models to try: available ones first, then the rest as a last resort.
    fn model_order(&self) -> Vec<String> {
        let (mut order, resting): (Vec<_>, Vec<_>) = self
            .config
            .models
            .iter()
            .cloned()
            .partition(|m| self.is_available(m));
        order.extend(resting);
        order
    }

    /// Run a prompt through the model list. `None` when every model failed.
    async fn generate<T: DeserializeOwned>(&self, prompt: &str) -> Option<T> {
        for model in self.model_order() {
            debug!("Attempting Gemini API with model: {}", model);
            match self.call_gemini_api::<T>(&model, prompt).await {
                Ok(data) => {
                    self.record(&model, true);
                    info!("Gemini analysis succeeded with {}", model);
                    return Some(data);
                }
                Err(e) => {
                    self.record(&model, false);
                    warn!("Failed with model {}: {}", model, e);
                }
            }
        }
        warn!("All Gemini models failed");
        None
    }

    async fn call_gemini_api<T: DeserializeOwned>(
        &self,
        model: &str,
        prompt: &str,
    ) -> AdapterResult<T> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AdapterError::provider(status.as_u16(), error_text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AdapterError::empty_result("No content in Gemini response"))?;

        Ok(serde_json::from_str(strip_code_fence(text))?)
    }
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn components_prompt(transcript: &str) -> String {
    format!(
        r#"You are a script editor for short-form social video.
Split the transcript below into four consecutive parts:
- "hook": the opening line that grabs attention
- "bridge": the transition that sets up the main point
- "nugget": the core value or insight
- "wta": the closing call to action

Use the transcript's own words. Every part must be a contiguous excerpt and
the parts must appear in transcript order. Use an empty string for a part that
does not exist.

Return ONLY a single JSON object:
{{"hook": "...", "bridge": "...", "nugget": "...", "wta": "..."}}

TRANSCRIPT:
{transcript}
"#
    )
}

fn insights_prompt(transcript: &str) -> String {
    format!(
        r#"Analyze the transcript of a short-form social video.

Return ONLY a single JSON object:
{{
  "sentiment": "positive | neutral | negative",
  "topics": ["up to 5 topics"],
  "keywords": ["up to 10 keywords"],
  "content_type": "tutorial | story | review | entertainment | other"
}}

TRANSCRIPT:
{transcript}
"#
    )
}

#[async_trait]
impl ContentAnalyzer for GeminiAnalyzer {
    async fn extract_components(
        &self,
        transcript: &str,
    ) -> AdapterResult<Option<ScriptComponents>> {
        if transcript.trim().is_empty() {
            return Err(AdapterError::invalid_input("Transcript is empty"));
        }
        let components: Option<ScriptComponents> =
            self.generate(&components_prompt(transcript)).await;
        Ok(components.filter(|c| !c.is_empty()))
    }

    async fn analyze_content(&self, transcript: &str) -> AdapterResult<Option<ContentInsights>> {
        if transcript.trim().is_empty() {
            return Err(AdapterError::invalid_input("Transcript is empty"));
        }
        Ok(self.generate(&insights_prompt(transcript)).await)
    }

    async fn availability(&self) -> ProviderAvailability {
        let available = self
            .config
            .models
            .iter()
            .filter(|m| self.is_available(m))
            .count();
        ProviderAvailability::new(available, self.config.models.len())
    }
}
