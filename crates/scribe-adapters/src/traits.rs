//! Narrow interfaces to the external collaborators of the pipeline.

use std::sync::Arc;

use async_trait::async_trait;

use scribe_models::{
    CdnUpload, ContentInsights, DependencyHealth, DownloadOutcome, Platform,
    ProviderAvailability, ScriptComponents, Transcription, UploadSource, VideoDocument, VideoId,
};

use crate::error::{AdapterError, AdapterResult};

/// Fetches media for a source URL.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str) -> AdapterResult<DownloadOutcome>;

    async fn health(&self) -> DependencyHealth {
        DependencyHealth::healthy()
    }
}

/// Stores media on the CDN.
#[async_trait]
pub trait CdnUploader: Send + Sync {
    async fn upload(&self, source: UploadSource, filename: &str) -> AdapterResult<CdnUpload>;

    async fn health(&self) -> DependencyHealth {
        DependencyHealth::healthy()
    }
}

/// Produces a transcript for a playable URL.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, url: &str, platform: Platform) -> AdapterResult<Transcription>;

    async fn availability(&self) -> ProviderAvailability {
        ProviderAvailability::new(1, 1)
    }

    async fn health(&self) -> DependencyHealth {
        DependencyHealth::from_availability(self.availability().await)
    }
}

/// AI analysis of transcripts.
///
/// `Ok(None)` means the provider produced nothing usable; callers treat it,
/// and errors, as non-fatal.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn extract_components(&self, transcript: &str)
        -> AdapterResult<Option<ScriptComponents>>;

    async fn analyze_content(&self, transcript: &str) -> AdapterResult<Option<ContentInsights>>;

    async fn availability(&self) -> ProviderAvailability {
        ProviderAvailability::new(1, 1)
    }

    async fn health(&self) -> DependencyHealth {
        DependencyHealth::from_availability(self.availability().await)
    }
}

/// In-place edit applied by [`DocumentStore::update_with`].
pub type DocumentEdit = Box<dyn FnOnce(&mut VideoDocument) + Send>;

/// Persistence for video documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: &VideoId) -> AdapterResult<Option<VideoDocument>>;

    async fn put(&self, document: VideoDocument) -> AdapterResult<()>;

    /// Read-modify-write of an existing document.
    async fn update_with(&self, id: &VideoId, edit: DocumentEdit) -> AdapterResult<VideoDocument> {
        let mut document = self
            .get(id)
            .await?
            .ok_or_else(|| AdapterError::not_found(format!("video document {id}")))?;
        edit(&mut document);
        document.touch();
        self.put(document.clone()).await?;
        Ok(document)
    }

    async fn health(&self) -> DependencyHealth {
        DependencyHealth::healthy()
    }
}

/// The full set of adapters a pipeline run needs.
#[derive(Clone)]
pub struct Adapters {
    pub downloader: Arc<dyn Downloader>,
    pub cdn: Arc<dyn CdnUploader>,
    pub transcriber: Arc<dyn Transcriber>,
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub documents: Arc<dyn DocumentStore>,
}
