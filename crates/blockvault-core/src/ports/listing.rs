//! Revision listing port.
//!
//! A revision's manifest signature, thumbnails and blocks are enumerated
//! through a lazy, finite, non-restartable event source backed by a
//! paginated API.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::DownloadError;
use crate::revision::{BlockMetadata, RevisionEvent};
use crate::uid::RevisionUid;

/// A lazy sequence of revision listing events.
///
/// Yields exactly one [`RevisionEvent::ManifestSignature`], then the
/// thumbnails, then the blocks in strictly increasing index order, then
/// `None`. Not restartable.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait RevisionEventSource: Send {
    /// Pull the next event, or `None` once the listing is exhausted.
    async fn next_event(&mut self) -> Result<Option<RevisionEvent>, DownloadError>;
}

/// Port for revision listings.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait RevisionListingPort: Send + Sync {
    /// Open the full listing for a revision: manifest signature, thumbnails,
    /// then blocks. The cancellation token is honored at page boundaries.
    fn iterate_revision(
        &self,
        revision_uid: &RevisionUid,
        cancel: CancellationToken,
    ) -> Box<dyn RevisionEventSource>;

    /// Open a plain block listing: only [`RevisionEvent::Block`] events, in
    /// larger pages. Used by callers that need raw block enumeration.
    fn iterate_blocks(
        &self,
        revision_uid: &RevisionUid,
        cancel: CancellationToken,
    ) -> Box<dyn RevisionEventSource>;

    /// Fetch the current metadata for a single block, used to refresh an
    /// expired token. Returns `None` when the revision has no block at this
    /// index. The refreshed metadata carries no signature fields.
    async fn get_block_token(
        &self,
        revision_uid: &RevisionUid,
        index: u64,
    ) -> Result<Option<BlockMetadata>, DownloadError>;
}
