//! HTTP client port.
//!
//! The pipeline never talks to the network directly; the embedding
//! application provides an HTTP client through this port. Two operations
//! cover everything the download stack needs: JSON API calls and raw blob
//! fetches with streamed progress.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::errors::DownloadError;

/// Callback invoked with positive byte deltas as blob bytes arrive.
pub type ByteProgress = Arc<dyn Fn(u64) + Send + Sync>;

/// HTTP method for a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// POST request.
    Post,
}

/// A JSON API request.
#[derive(Clone, Debug)]
pub struct JsonRequest {
    /// Fully built request URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Request timeout in milliseconds. A reached timeout aborts the request
    /// and yields [`HttpError::Timeout`].
    pub timeout_ms: Option<u64>,
    /// Optional structured request body.
    pub body: Option<serde_json::Value>,
    /// Cancellation signal; cancelling aborts the in-flight request.
    pub cancel: CancellationToken,
}

impl JsonRequest {
    /// Build a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            timeout_ms: None,
            body: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a POST request with a JSON body.
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            headers: Vec::new(),
            timeout_ms: None,
            body: Some(body),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// A raw blob request.
#[derive(Clone)]
pub struct BlobRequest {
    /// Fully built request URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Callback invoked with byte deltas as the body streams in.
    pub on_progress: Option<ByteProgress>,
    /// Cancellation signal; cancelling aborts the in-flight request.
    pub cancel: CancellationToken,
}

impl BlobRequest {
    /// Build a GET blob request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            timeout_ms: None,
            on_progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<ByteProgress>) -> Self {
        self.on_progress = on_progress;
        self
    }
}

impl std::fmt::Debug for BlobRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobRequest")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("timeout_ms", &self.timeout_ms)
            .field("has_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Errors surfaced by the HTTP client.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HttpError {
    /// The configured timeout was reached and the request was aborted.
    #[error("request timed out: {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The URL that was requested.
        url: String,
    },

    /// A network-level failure (DNS, connect, read, TLS).
    #[error("network failure: {message}")]
    Network {
        /// Detailed error message.
        message: String,
    },

    /// The response body could not be parsed.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// What was invalid.
        message: String,
    },

    /// The request was cancelled through its token.
    #[error("request cancelled")]
    Cancelled,
}

impl From<HttpError> for DownloadError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Cancelled => Self::Cancelled,
            HttpError::Status { status, url } => Self::transport_with_status(
                format!("request failed: {url}"),
                status,
            ),
            HttpError::Timeout { url } => Self::transport(format!("request timed out: {url}")),
            HttpError::Network { message } | HttpError::InvalidResponse { message } => {
                Self::transport(message)
            }
        }
    }
}

/// Port for the HTTP client the embedding application provides.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Perform a JSON API request and return the parsed body.
    async fn fetch_json(&self, request: JsonRequest) -> Result<serde_json::Value, HttpError>;

    /// Fetch a raw blob, streaming progress deltas while the body arrives.
    async fn fetch_blob(&self, request: BlobRequest) -> Result<Vec<u8>, HttpError>;
}
