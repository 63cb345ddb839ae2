//! Revisions service port.

use async_trait::async_trait;

use crate::errors::DownloadError;
use crate::revision::Revision;
use crate::uid::RevisionUid;

/// Port for explicit revision lookup, used when the caller downloads a
/// specific revision rather than a node's active one.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait RevisionsServicePort: Send + Sync {
    /// Fetch one revision.
    async fn get_revision(&self, uid: &RevisionUid) -> Result<Revision, DownloadError>;
}
