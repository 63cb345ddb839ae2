//! Thumbnail token API port.

use async_trait::async_trait;

use crate::errors::DownloadError;
use crate::uid::ThumbnailUid;

/// A fetch capability for one thumbnail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThumbnailToken {
    /// The thumbnail this token is for.
    pub uid: ThumbnailUid,
    /// Storage host URL without the token query.
    pub bare_url: String,
    /// Opaque, short-lived fetch capability.
    pub token: String,
}

/// Per-batch result of a token lookup.
///
/// Every requested UID lands in exactly one of the two lists.
#[derive(Debug, Default)]
pub struct ThumbnailTokenBatch {
    /// Tokens for the thumbnails the host resolved.
    pub tokens: Vec<ThumbnailToken>,
    /// Thumbnails the host rejected or did not answer for.
    pub failures: Vec<(ThumbnailUid, DownloadError)>,
}

/// Port for the batched thumbnail token endpoint.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait ThumbnailApiPort: Send + Sync {
    /// Resolve tokens for a batch of thumbnails in one volume.
    async fn get_thumbnail_tokens(
        &self,
        volume_id: &str,
        uids: &[ThumbnailUid],
    ) -> Result<ThumbnailTokenBatch, DownloadError>;
}
