//! Scriptable fake adapters and sample payloads for tests.
//!
//! Every fake counts its calls and hands the 1-based call number to its
//! handler, so a test can fail the first attempts and succeed later.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use scribe_models::{
    CdnUpload, ContentInsights, DependencyHealth, DownloadOutcome, DownloadPayload, Platform,
    ProviderAvailability, ScriptComponents, SourceMetadata, Transcription, UploadSource,
};

use crate::error::{AdapterError, AdapterResult};
use crate::memory::InMemoryDocumentStore;
use crate::traits::{Adapters, CdnUploader, ContentAnalyzer, Downloader, Transcriber};

type Handler<T> = Box<dyn Fn(u32) -> AdapterResult<T> + Send + Sync>;

/// Shared call counting, delay and health override.
struct Script<T> {
    handler: Handler<T>,
    calls: AtomicU32,
    delay: Mutex<Option<Duration>>,
    health: Mutex<Option<DependencyHealth>>,
}

impl<T> Script<T> {
    fn new(handler: Handler<T>) -> Self {
        Self {
            handler,
            calls: AtomicU32::new(0),
            delay: Mutex::new(None),
            health: Mutex::new(None),
        }
    }

    async fn call(&self) -> AdapterResult<T> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(call)
    }

    fn health(&self) -> Option<DependencyHealth> {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    fn set_health(&self, health: DependencyHealth) {
        *self.health.lock().unwrap_or_else(PoisonError::into_inner) = Some(health);
    }
}

/// A downloader result for a source URL (in-memory bytes).
pub fn sample_download(url: &str) -> DownloadOutcome {
    DownloadOutcome {
        platform: Platform::detect(url),
        payload: DownloadPayload::Bytes {
            data: vec![0, 0, 0, 24, b'f', b't', b'y', b'p'],
            mime_type: "video/mp4".to_string(),
            filename: "source.mp4".to_string(),
        },
        metadata: SourceMetadata {
            author: Some("creator".to_string()),
            ..Default::default()
        },
    }
}

/// A downloader result that points at a streamable URL.
pub fn sample_stream_download(url: &str) -> DownloadOutcome {
    DownloadOutcome {
        platform: Platform::detect(url),
        payload: DownloadPayload::Stream {
            url: "https://origin.example.com/stream/source.mp4".to_string(),
            mime_type: Some("video/mp4".to_string()),
            filename: "source.mp4".to_string(),
        },
        metadata: SourceMetadata::default(),
    }
}

pub fn sample_upload() -> CdnUpload {
    CdnUpload {
        iframe_url: "https://play.example.com/embed/media-1".to_string(),
        direct_url: "https://media.example.com/videos/media-1/source.mp4".to_string(),
        media_id: "media-1".to_string(),
        thumbnail_url: Some("https://media.example.com/videos/media-1/thumb.jpg".to_string()),
        preview_url: None,
    }
}

/// A transcription without components.
pub fn sample_transcription(transcript: &str) -> Transcription {
    Transcription {
        transcript: transcript.to_string(),
        components: None,
        content_metadata: None,
        method: "fake".to_string(),
        transcribed_at: Utc::now(),
        is_fallback: false,
    }
}

/// Scriptable [`Downloader`].
pub struct FakeDownloader {
    script: Script<DownloadOutcome>,
    urls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn with_handler(
        handler: impl Fn(u32) -> AdapterResult<DownloadOutcome> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Script::new(Box::new(handler)),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok() -> Self {
        Self::with_handler(|_| Ok(sample_download("https://www.tiktok.com/@creator/video/1")))
    }

    pub fn failing(message: &'static str) -> Self {
        Self::with_handler(move |_| Err(AdapterError::request_failed(message)))
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.script.set_delay(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_health(&self, health: DependencyHealth) {
        self.script.set_health(health);
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str) -> AdapterResult<DownloadOutcome> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        self.script.call().await
    }

    async fn health(&self) -> DependencyHealth {
        self.script.health().unwrap_or_else(DependencyHealth::healthy)
    }
}

/// Scriptable [`CdnUploader`].
pub struct FakeUploader {
    script: Script<CdnUpload>,
    uploads: Mutex<Vec<(bool, String)>>,
}

impl FakeUploader {
    pub fn with_handler(
        handler: impl Fn(u32) -> AdapterResult<CdnUpload> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Script::new(Box::new(handler)),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn ok() -> Self {
        Self::with_handler(|_| Ok(sample_upload()))
    }

    pub fn failing(message: &'static str) -> Self {
        Self::with_handler(move |_| Err(AdapterError::storage(message)))
    }

    pub fn calls(&self) -> u32 {
        self.script.calls.load(Ordering::SeqCst)
    }

    /// Uploads seen so far as `(was_url_source, filename)`.
    pub fn uploads(&self) -> Vec<(bool, String)> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_health(&self, health: DependencyHealth) {
        self.script.set_health(health);
    }
}

#[async_trait]
impl CdnUploader for FakeUploader {
    async fn upload(&self, source: UploadSource, filename: &str) -> AdapterResult<CdnUpload> {
        let from_url = matches!(source, UploadSource::Url(_));
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((from_url, filename.to_string()));
        self.script.call().await
    }

    async fn health(&self) -> DependencyHealth {
        self.script.health().unwrap_or_else(DependencyHealth::healthy)
    }
}

/// Scriptable [`Transcriber`].
pub struct FakeTranscriber {
    script: Script<Transcription>,
    urls: Mutex<Vec<String>>,
    availability: Mutex<ProviderAvailability>,
}

impl FakeTranscriber {
    pub fn with_handler(
        handler: impl Fn(u32) -> AdapterResult<Transcription> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Script::new(Box::new(handler)),
            urls: Mutex::new(Vec::new()),
            availability: Mutex::new(ProviderAvailability::new(1, 1)),
        }
    }

    /// Always returns `transcript` without components.
    pub fn returning(transcript: &'static str) -> Self {
        Self::with_handler(move |_| Ok(sample_transcription(transcript)))
    }

    pub fn failing(message: &'static str) -> Self {
        Self::with_handler(move |_| Err(AdapterError::request_failed(message)))
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.script.set_delay(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_availability(&self, availability: ProviderAvailability) {
        *self
            .availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = availability;
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, url: &str, _platform: Platform) -> AdapterResult<Transcription> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        self.script.call().await
    }

    async fn availability(&self) -> ProviderAvailability {
        *self
            .availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scriptable [`ContentAnalyzer`]. Content insights are always `None`.
pub struct FakeAnalyzer {
    script: Script<Option<ScriptComponents>>,
    availability: Mutex<ProviderAvailability>,
}

impl FakeAnalyzer {
    pub fn with_handler(
        handler: impl Fn(u32) -> AdapterResult<Option<ScriptComponents>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Script::new(Box::new(handler)),
            availability: Mutex::new(ProviderAvailability::new(1, 1)),
        }
    }

    pub fn returning(components: ScriptComponents) -> Self {
        Self::with_handler(move |_| Ok(Some(components.clone())))
    }

    /// Provider that never produces anything.
    pub fn empty() -> Self {
        Self::with_handler(|_| Ok(None))
    }

    pub fn failing(message: &'static str) -> Self {
        Self::with_handler(move |_| Err(AdapterError::request_failed(message)))
    }

    pub fn calls(&self) -> u32 {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn set_availability(&self, availability: ProviderAvailability) {
        *self
            .availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = availability;
    }
}

#[async_trait]
impl ContentAnalyzer for FakeAnalyzer {
    async fn extract_components(
        &self,
        _transcript: &str,
    ) -> AdapterResult<Option<ScriptComponents>> {
        self.script.call().await
    }

    async fn analyze_content(&self, _transcript: &str) -> AdapterResult<Option<ContentInsights>> {
        Ok(None)
    }

    async fn availability(&self) -> ProviderAvailability {
        *self
            .availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handles to the concrete fakes behind an [`Adapters`] bundle.
pub struct FakeAdapters {
    pub downloader: Arc<FakeDownloader>,
    pub cdn: Arc<FakeUploader>,
    pub transcriber: Arc<FakeTranscriber>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub documents: Arc<InMemoryDocumentStore>,
}

impl FakeAdapters {
    /// Everything succeeds; the transcript has no components.
    pub fn happy(transcript: &'static str) -> Self {
        Self {
            downloader: Arc::new(FakeDownloader::ok()),
            cdn: Arc::new(FakeUploader::ok()),
            transcriber: Arc::new(FakeTranscriber::returning(transcript)),
            analyzer: Arc::new(FakeAnalyzer::empty()),
            documents: Arc::new(InMemoryDocumentStore::new()),
        }
    }

    pub fn with_downloader(mut self, downloader: FakeDownloader) -> Self {
        self.downloader = Arc::new(downloader);
        self
    }

    pub fn with_cdn(mut self, cdn: FakeUploader) -> Self {
        self.cdn = Arc::new(cdn);
        self
    }

    pub fn with_transcriber(mut self, transcriber: FakeTranscriber) -> Self {
        self.transcriber = Arc::new(transcriber);
        self
    }

    pub fn with_analyzer(mut self, analyzer: FakeAnalyzer) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    pub fn adapters(&self) -> Adapters {
        Adapters {
            downloader: self.downloader.clone(),
            cdn: self.cdn.clone(),
            transcriber: self.transcriber.clone(),
            analyzer: self.analyzer.clone(),
            documents: self.documents.clone(),
        }
    }
}
