//! External service adapters for the Scribe pipeline.
//!
//! This crate provides:
//! - Adapter traits for download, CDN upload, transcription, AI analysis and
//!   document persistence
//! - A direct HTTP downloader
//! - A Cloudflare R2 uploader (S3 API)
//! - An HTTP transcription-service client
//! - A Gemini analyzer with model fallback
//! - An in-memory document store

mod body;
pub mod downloader;
pub mod error;
pub mod gemini;
pub mod memory;
pub mod r2;
pub mod traits;
pub mod transcriber;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use downloader::{DirectDownloader, DownloaderConfig};
pub use error::{AdapterError, AdapterResult};
pub use gemini::{GeminiAnalyzer, GeminiConfig};
pub use memory::InMemoryDocumentStore;
pub use r2::{R2Config, R2Uploader};
pub use traits::{
    Adapters, CdnUploader, ContentAnalyzer, DocumentEdit, DocumentStore, Downloader, Transcriber,
};
pub use transcriber::{HttpTranscriber, TranscriberConfig};
