//! Download error taxonomy.
//!
//! One public error type covers the whole pipeline. Variants are grouped by
//! how they are handled: validation errors are never retried, transport and
//! integrity errors get one retry at the block level, an expired token is
//! refreshed transparently, and bug errors mark states that should be
//! impossible.
//!
//! These errors carry only owned strings so they stay serializable across
//! process boundaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for every download operation.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// Inputs violate a contract (bad UID shape, zero-length read, folder
    /// passed to a file downloader, missing content key, ...).
    #[error("{message}")]
    Validation {
        /// What contract was violated.
        message: String,
    },

    /// Network or HTTP error.
    #[error("network error: {message}")]
    Transport {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },

    /// The short-lived block token was rejected by the storage host.
    #[error("block token expired")]
    TokenExpired,

    /// A block ciphertext did not match its expected content hash.
    #[error("integrity check failed: expected {expected}, got {actual}")]
    HashMismatch {
        /// Expected base64 SHA-256 hash.
        expected: String,
        /// Actual hash computed over the received bytes.
        actual: String,
    },

    /// The whole-revision manifest signature could not be verified.
    #[error("manifest verification failed: {message}")]
    Manifest {
        /// Why verification failed.
        message: String,
    },

    /// Decryption of a block or thumbnail failed.
    #[error("decryption failed: {message}")]
    Decryption {
        /// Detailed error message.
        message: String,
    },

    /// Writing to or closing the output sink failed.
    #[error("sink error: {message}")]
    Sink {
        /// Detailed error message.
        message: String,
    },

    /// The operation was cancelled by the caller.
    #[error("download cancelled")]
    Cancelled,

    /// An internal invariant was violated. Always a bug, never retryable.
    #[error("internal error: {message}")]
    Bug {
        /// Description of the impossible state.
        message: String,
    },
}

impl DownloadError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a transport error without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Create a transport error carrying an HTTP status code.
    pub fn transport_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a hash mismatch error carrying both hashes.
    pub fn hash_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::HashMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a manifest verification error.
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Create a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    /// Create a sink error.
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Create a bug error for an impossible internal state.
    pub fn bug(message: impl Into<String>) -> Self {
        Self::Bug {
            message: message.into(),
        }
    }

    /// Whether a per-block retry may recover from this error.
    ///
    /// Token expiry is handled separately (transparent refresh) and does not
    /// consume the retry budget, so it is not "retryable" in this sense.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::HashMismatch { .. } | Self::Decryption { .. }
        )
    }

    /// Whether this error means the block token expired.
    #[must_use]
    pub const fn is_token_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// Whether this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this is an integrity failure (block hash or manifest).
    #[must_use]
    pub const fn is_integrity(&self) -> bool {
        matches!(self, Self::HashMismatch { .. } | Self::Manifest { .. })
    }

    /// Convert to a user-facing message in the requested locale.
    ///
    /// Only the English catalogue ships today; unknown locales fall back to
    /// it. The `language` value comes from [`crate::config::DriveConfig`].
    #[must_use]
    pub fn user_message(&self, language: &str) -> String {
        // Single catalogue for now; the match keeps the locale plumbing honest.
        let _ = language;
        match self {
            Self::Validation { message } => message.clone(),
            Self::Transport {
                message,
                status: Some(code),
            } => format!("Network error (HTTP {code}): {message}"),
            Self::Transport { message, .. } => format!("Network error: {message}"),
            Self::TokenExpired => "The download link expired. Please retry.".to_string(),
            Self::HashMismatch { .. } => {
                "A downloaded block failed its integrity check. The file may be corrupted."
                    .to_string()
            }
            Self::Manifest { .. } => {
                "The file's signature could not be verified. The file may have been tampered with."
                    .to_string()
            }
            Self::Decryption { .. } => "The file could not be decrypted.".to_string(),
            Self::Sink { message } => format!("Writing the file failed: {message}"),
            Self::Cancelled => "Download was cancelled.".to_string(),
            Self::Bug { message } => format!("Internal error: {message}"),
        }
    }
}

/// Convenience result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;
