//! Adapter error types.

use thiserror::Error;

/// Result type for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors returned by external service adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Operation timeout")]
    Timeout,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdapterError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn provider(status: u16, msg: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: msg.into(),
        }
    }

    pub fn empty_result(msg: impl Into<String>) -> Self {
        Self::EmptyResult(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Check if another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::InvalidInput(_)
            | AdapterError::Config(_)
            | AdapterError::NotFound(_)
            | AdapterError::EmptyResult(_) => false,
            AdapterError::Provider { status, .. } => *status == 429 || *status >= 500,
            AdapterError::Json(_) => false,
            AdapterError::Http(e) => !e.is_builder(),
            _ => true,
        }
    }
}
