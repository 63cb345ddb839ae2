//! Block fetcher port.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::DownloadError;
use crate::ports::http::ByteProgress;

/// Port for fetching one encrypted block from the storage host.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait BlockFetcherPort: Send + Sync {
    /// Stream one block's ciphertext to memory.
    ///
    /// `on_progress` receives positive byte deltas as the body arrives. A
    /// `NOT_FOUND` answer from the storage host means the token expired and
    /// surfaces as [`DownloadError::TokenExpired`]; other failures are
    /// transport errors. Cancellation aborts the request.
    async fn fetch_block(
        &self,
        bare_url: &str,
        token: &str,
        on_progress: Option<ByteProgress>,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, DownloadError>;
}
