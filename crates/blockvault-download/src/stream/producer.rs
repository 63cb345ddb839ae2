//! Demand-driven single-block producer.
//!
//! The inner layer of the seekable stream: a cursor over the revision's
//! plaintext that loads one block per pull through the single-block listing
//! variant, verifying and decrypting on the way. Revision keys are derived
//! lazily on the first pull and held for the producer's lifetime.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use blockvault_core::{
    BlockFetcherPort, CryptoServicePort, DownloadError, NodeKey, Revision, RevisionKeys,
    RevisionListingPort,
};

use super::block_index::{BlockLookup, block_for_offset};

/// Single-producer byte source with `start`, `pull` and `seek`.
pub(crate) struct BlockStream {
    listing: Arc<dyn RevisionListingPort>,
    fetcher: Arc<dyn BlockFetcherPort>,
    crypto: Arc<dyn CryptoServicePort>,
    revision: Revision,
    node_key: NodeKey,
    keys: Option<Arc<RevisionKeys>>,
    position: u64,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BlockStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStream")
            .field("revision", &self.revision)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl BlockStream {
    pub(crate) fn new(
        listing: Arc<dyn RevisionListingPort>,
        fetcher: Arc<dyn BlockFetcherPort>,
        crypto: Arc<dyn CryptoServicePort>,
        revision: Revision,
        node_key: NodeKey,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            listing,
            fetcher,
            crypto,
            revision,
            node_key,
            keys: None,
            position: 0,
            cancel,
        }
    }

    /// Prepare the producer without fetching data. Optional; `pull` derives
    /// the keys on demand anyway.
    pub(crate) async fn start(&mut self) -> Result<(), DownloadError> {
        self.ensure_keys().await.map(|_| ())
    }

    /// Move the logical cursor. The next pull resumes from `position`.
    pub(crate) fn seek(&mut self, position: u64) {
        self.position = position;
    }

    async fn ensure_keys(&mut self) -> Result<Arc<RevisionKeys>, DownloadError> {
        if let Some(keys) = &self.keys {
            return Ok(Arc::clone(keys));
        }
        let keys = Arc::new(
            self.crypto
                .revision_keys(&self.node_key, &self.revision)
                .await?,
        );
        self.keys = Some(Arc::clone(&keys));
        Ok(keys)
    }

    /// Produce the plaintext from the cursor to the end of the block it
    /// falls in, or `None` at end of file.
    pub(crate) async fn pull(&mut self) -> Result<Option<Vec<u8>>, DownloadError> {
        let keys = self.ensure_keys().await?;

        let lookup = block_for_offset(self.revision.claimed_block_sizes.as_deref(), self.position);
        let pos = match lookup {
            BlockLookup::Within(pos) => pos,
            BlockLookup::End => return Ok(None),
        };

        let Some(meta) = self
            .listing
            .get_block_token(&self.revision.uid, pos.index)
            .await?
        else {
            // Past the last block; only reachable with default-size mapping.
            return Ok(None);
        };

        let ciphertext = self
            .fetcher
            .fetch_block(&meta.bare_url, &meta.token, None, self.cancel.clone())
            .await?;
        self.crypto.verify_block_integrity(&ciphertext, &meta.hash)?;
        let plain = self
            .crypto
            .decrypt_block(ciphertext, meta.armored_signature, &keys)
            .await?;

        let offset = usize::try_from(pos.offset)
            .map_err(|_| DownloadError::validation("seek position out of range"))?;
        if offset >= plain.len() {
            // The cursor points past the end of the final, short block.
            return Ok(None);
        }

        let chunk = plain[offset..].to_vec();
        self.position += chunk.len() as u64;
        Ok(Some(chunk))
    }
}
