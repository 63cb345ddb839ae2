//! Paginated revision listing.
//!
//! The listing endpoint returns the manifest signature, the thumbnails and a
//! page of blocks; further pages return blocks only. This module turns those
//! pages into a lazy event source and validates the gapless-index invariant
//! as blocks stream through.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use blockvault_core::ports::http::{HttpClientPort, JsonRequest};
use blockvault_core::ports::listing::{RevisionEventSource, RevisionListingPort};
use blockvault_core::{BlockMetadata, DownloadError, DriveConfig, RevisionEvent, RevisionUid};

use crate::url::{base_url, revision_listing_url};

/// Page size for the general listing (manifest, thumbnails, blocks).
const GENERAL_PAGE_SIZE: u32 = 20;

/// Page size for the plain block listing.
const PLAIN_BLOCK_PAGE_SIZE: u32 = 50;

/// Page size for the single-block token refresh.
const SINGLE_BLOCK_PAGE_SIZE: u32 = 1;

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListingPayload {
    #[serde(rename = "Revision")]
    revision: ListingPage,
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(rename = "ManifestSignature")]
    manifest_signature: Option<String>,
    #[serde(rename = "Thumbnails", default)]
    thumbnails: Vec<ThumbnailEntry>,
    #[serde(rename = "Blocks", default)]
    blocks: Vec<BlockEntry>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailEntry {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BlockEntry {
    #[serde(rename = "Index")]
    index: u64,
    #[serde(rename = "BareURL")]
    bare_url: String,
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "EncSignature")]
    enc_signature: Option<String>,
    #[serde(rename = "SignatureEmail")]
    signature_email: Option<String>,
}

impl BlockEntry {
    fn into_metadata(self) -> BlockMetadata {
        BlockMetadata {
            index: self.index,
            bare_url: self.bare_url,
            token: self.token,
            hash: self.hash,
            signature_email: self.signature_email,
            armored_signature: self.enc_signature,
        }
    }
}

fn parse_page(body: serde_json::Value) -> Result<ListingPage, DownloadError> {
    let payload: ListingPayload = serde_json::from_value(body)
        .map_err(|err| DownloadError::transport(format!("malformed listing response: {err}")))?;
    Ok(payload.revision)
}

// ============================================================================
// Event source
// ============================================================================

/// Lazy, non-restartable page walker over one revision's listing.
struct PagedEvents {
    http: Arc<dyn HttpClientPort>,
    base: Url,
    uid: RevisionUid,
    page_size: u32,
    /// Whether manifest-signature and thumbnail events are emitted from the
    /// first page. The plain block variant skips them.
    include_header: bool,
    cancel: CancellationToken,
    from_block_index: u64,
    queued: VecDeque<RevisionEvent>,
    fetched_first_page: bool,
    exhausted: bool,
    last_block_index: u64,
}

impl PagedEvents {
    fn new(
        http: Arc<dyn HttpClientPort>,
        base: Url,
        uid: RevisionUid,
        page_size: u32,
        include_header: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            base,
            uid,
            page_size,
            include_header,
            cancel,
            from_block_index: 1,
            queued: VecDeque::new(),
            fetched_first_page: false,
            exhausted: false,
            last_block_index: 0,
        }
    }

    async fn fetch_page(&mut self) -> Result<(), DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let url = revision_listing_url(&self.base, &self.uid, self.page_size, self.from_block_index);
        let request = JsonRequest::get(url).with_cancel(self.cancel.clone());
        let page = parse_page(self.http.fetch_json(request).await?)?;

        if !self.fetched_first_page {
            self.fetched_first_page = true;
            if self.include_header {
                self.queued.push_back(RevisionEvent::ManifestSignature {
                    armored_signature: page.manifest_signature,
                });
                for thumbnail in page.thumbnails {
                    self.queued.push_back(RevisionEvent::Thumbnail {
                        hash: thumbnail.hash,
                    });
                }
            }
        }

        if page.blocks.is_empty() {
            self.exhausted = true;
            return Ok(());
        }

        for entry in page.blocks {
            if entry.index != self.last_block_index + 1 {
                return Err(DownloadError::validation(format!(
                    "revision listing is not contiguous: expected block {}, got {}",
                    self.last_block_index + 1,
                    entry.index
                )));
            }
            self.last_block_index = entry.index;
            self.queued
                .push_back(RevisionEvent::Block(entry.into_metadata()));
        }
        self.from_block_index = self.last_block_index + 1;

        Ok(())
    }
}

#[async_trait]
impl RevisionEventSource for PagedEvents {
    async fn next_event(&mut self) -> Result<Option<RevisionEvent>, DownloadError> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Ok(Some(event));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }
}

// ============================================================================
// Port implementation
// ============================================================================

/// Revision listing backed by the paginated Drive endpoint.
pub struct RevisionListing {
    http: Arc<dyn HttpClientPort>,
    base: Url,
}

impl RevisionListing {
    /// Create the listing adapter for the configured host.
    pub fn new(http: Arc<dyn HttpClientPort>, config: &DriveConfig) -> Result<Self, DownloadError> {
        Ok(Self {
            http,
            base: base_url(config)?,
        })
    }
}

#[async_trait]
impl RevisionListingPort for RevisionListing {
    fn iterate_revision(
        &self,
        revision_uid: &RevisionUid,
        cancel: CancellationToken,
    ) -> Box<dyn RevisionEventSource> {
        Box::new(PagedEvents::new(
            Arc::clone(&self.http),
            self.base.clone(),
            revision_uid.clone(),
            GENERAL_PAGE_SIZE,
            true,
            cancel,
        ))
    }

    fn iterate_blocks(
        &self,
        revision_uid: &RevisionUid,
        cancel: CancellationToken,
    ) -> Box<dyn RevisionEventSource> {
        Box::new(PagedEvents::new(
            Arc::clone(&self.http),
            self.base.clone(),
            revision_uid.clone(),
            PLAIN_BLOCK_PAGE_SIZE,
            false,
            cancel,
        ))
    }

    async fn get_block_token(
        &self,
        revision_uid: &RevisionUid,
        index: u64,
    ) -> Result<Option<BlockMetadata>, DownloadError> {
        let url = revision_listing_url(&self.base, revision_uid, SINGLE_BLOCK_PAGE_SIZE, index);
        let request = JsonRequest::get(url);
        let page = parse_page(self.http.fetch_json(request).await?)?;

        // The refresh answer is partial: keep only the addressing fields so
        // callers continue using the originally listed signature metadata.
        Ok(page.blocks.into_iter().next().map(|entry| BlockMetadata {
            signature_email: None,
            armored_signature: None,
            ..entry.into_metadata()
        }))
    }
}
