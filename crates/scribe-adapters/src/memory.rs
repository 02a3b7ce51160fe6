//! In-memory document store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use scribe_models::{DependencyHealth, VideoDocument, VideoId};

use crate::error::AdapterResult;
use crate::traits::DocumentStore;

/// Document store backed by a map. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<VideoId, VideoDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// All stored documents, oldest first.
    pub async fn all(&self) -> Vec<VideoDocument> {
        let mut docs: Vec<_> = self.documents.read().await.values().cloned().collect();
        docs.sort_by_key(|d| d.created_at);
        docs
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: &VideoId) -> AdapterResult<Option<VideoDocument>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn put(&self, document: VideoDocument) -> AdapterResult<()> {
        debug!(video_id = %document.id, "Storing video document");
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
        Ok(())
    }

    async fn health(&self) -> DependencyHealth {
        DependencyHealth::healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use scribe_models::TranscriptionStatus;

    #[tokio::test]
    async fn test_update_with_existing_document() {
        let store = InMemoryDocumentStore::new();
        let doc = VideoDocument::new(VideoId::from("v1"), "https://example.com/a.mp4");
        store.put(doc).await.unwrap();

        let updated = store
            .update_with(
                &VideoId::from("v1"),
                Box::new(|d| d.mark_transcription(TranscriptionStatus::Processing, None)),
            )
            .await
            .unwrap();

        assert_eq!(updated.transcription_status, TranscriptionStatus::Processing);
        let stored = store.get(&VideoId::from("v1")).await.unwrap().unwrap();
        assert_eq!(stored.transcription_status, TranscriptionStatus::Processing);
    }

    #[tokio::test]
    async fn test_update_with_missing_document() {
        let store = InMemoryDocumentStore::new();
        let result = store
            .update_with(&VideoId::from("missing"), Box::new(|_| {}))
            .await;
        assert!(matches!(result, Err(AdapterError::NotFound(_))));
        assert!(store.is_empty().await);
    }
}
