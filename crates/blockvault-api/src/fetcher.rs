//! Block fetcher.
//!
//! Fetches one encrypted block by bare URL + token. The storage host answers
//! `404` for an expired token, which the pipeline handles with a transparent
//! refresh, so that status gets its own error.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use blockvault_core::ports::fetcher::BlockFetcherPort;
use blockvault_core::ports::http::{BlobRequest, ByteProgress, HttpClientPort, HttpError};
use blockvault_core::DownloadError;

/// Block downloads against the storage host.
pub struct BlockFetcher {
    http: Arc<dyn HttpClientPort>,
}

impl BlockFetcher {
    /// Create the fetcher.
    #[must_use]
    pub fn new(http: Arc<dyn HttpClientPort>) -> Self {
        Self { http }
    }
}

fn block_url(bare_url: &str, token: &str) -> Result<String, DownloadError> {
    let mut url = Url::parse(bare_url)
        .map_err(|err| DownloadError::validation(format!("invalid block URL '{bare_url}': {err}")))?;
    url.query_pairs_mut().append_pair("Token", token);
    Ok(url.into())
}

#[async_trait]
impl BlockFetcherPort for BlockFetcher {
    async fn fetch_block(
        &self,
        bare_url: &str,
        token: &str,
        on_progress: Option<ByteProgress>,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, DownloadError> {
        let url = block_url(bare_url, token)?;
        let request = BlobRequest::get(url)
            .with_cancel(cancel)
            .with_progress(on_progress);

        match self.http.fetch_blob(request).await {
            Ok(bytes) => Ok(bytes),
            Err(HttpError::Status { status: 404, .. }) => Err(DownloadError::TokenExpired),
            Err(err) => Err(err.into()),
        }
    }
}
