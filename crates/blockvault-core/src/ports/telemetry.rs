//! Telemetry port.
//!
//! The pipeline reports download lifecycle events through this interface;
//! what happens to them (metrics, user-facing reporting, nothing) is the
//! embedder's business.

use tracing::Span;

use crate::errors::DownloadError;
use crate::uid::RevisionUid;

/// Port for download telemetry.
pub trait TelemetryPort: Send + Sync {
    /// A span all of one revision's pipeline logs are recorded under.
    fn revision_span(&self, uid: &RevisionUid) -> Span;

    /// A downloader could not be constructed (precondition failure).
    fn download_init_failed(&self, uid: &str, error: &DownloadError);

    /// A download completed successfully after transferring `bytes`.
    fn download_finished(&self, uid: &RevisionUid, bytes: u64);

    /// A download failed fatally after transferring `bytes`.
    fn download_failed(
        &self,
        uid: &RevisionUid,
        error: &DownloadError,
        bytes: u64,
        claimed_size: Option<u64>,
    );
}

/// Default telemetry that records everything through `tracing`.
#[derive(Clone, Debug, Default)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    /// Create the tracing-backed telemetry sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TelemetryPort for TracingTelemetry {
    fn revision_span(&self, uid: &RevisionUid) -> Span {
        tracing::info_span!("download", revision = %uid)
    }

    fn download_init_failed(&self, uid: &str, error: &DownloadError) {
        tracing::warn!(uid, %error, "download initialization failed");
    }

    fn download_finished(&self, uid: &RevisionUid, bytes: u64) {
        tracing::info!(revision = %uid, bytes, "download finished");
    }

    fn download_failed(
        &self,
        uid: &RevisionUid,
        error: &DownloadError,
        bytes: u64,
        claimed_size: Option<u64>,
    ) {
        tracing::error!(revision = %uid, %error, bytes, claimed_size, "download failed");
    }
}

/// Telemetry that discards everything, for tests and embedders that do not
/// care.
#[derive(Clone, Debug, Default)]
pub struct NoopTelemetry;

impl NoopTelemetry {
    /// Create the no-op telemetry sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TelemetryPort for NoopTelemetry {
    fn revision_span(&self, _uid: &RevisionUid) -> Span {
        Span::none()
    }

    fn download_init_failed(&self, _uid: &str, _error: &DownloadError) {}

    fn download_finished(&self, _uid: &RevisionUid, _bytes: u64) {}

    fn download_failed(
        &self,
        _uid: &RevisionUid,
        _error: &DownloadError,
        _bytes: u64,
        _claimed_size: Option<u64>,
    ) {
    }
}
