//! Crypto service port.
//!
//! Everything cryptographic the pipeline needs, behind one interface: key
//! derivation, block integrity, block and thumbnail decryption, and the
//! whole-revision manifest check.

use async_trait::async_trait;

use crate::errors::DownloadError;
use crate::keys::{NodeKey, RevisionKeys, SessionKey};
use crate::revision::Revision;

/// Port for the crypto service.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait CryptoServicePort: Send + Sync {
    /// Derive the keys for downloading one revision.
    ///
    /// Verification keys are resolved from the revision's content author,
    /// verified or claimed; a revision without an author gets an empty set.
    async fn revision_keys(
        &self,
        node_key: &NodeKey,
        revision: &Revision,
    ) -> Result<RevisionKeys, DownloadError>;

    /// Check a block ciphertext against its expected base64 SHA-256 hash.
    ///
    /// Fails with [`DownloadError::HashMismatch`] carrying both hashes.
    fn verify_block_integrity(
        &self,
        ciphertext: &[u8],
        expected_hash: &str,
    ) -> Result<(), DownloadError>;

    /// Decrypt one block.
    ///
    /// Block signatures are not verified; integrity is established by the
    /// per-block hash and the whole-file manifest signature. The armored
    /// signature is accepted so callers can pass listing metadata through
    /// unchanged.
    async fn decrypt_block(
        &self,
        ciphertext: Vec<u8>,
        armored_signature: Option<String>,
        keys: &RevisionKeys,
    ) -> Result<Vec<u8>, DownloadError>;

    /// Decrypt one thumbnail with the node's content session key. No
    /// signature verification.
    async fn decrypt_thumbnail(
        &self,
        ciphertext: Vec<u8>,
        content_session_key: &SessionKey,
    ) -> Result<Vec<u8>, DownloadError>;

    /// Verify the revision manifest.
    ///
    /// `block_hashes` is the concatenation of raw SHA-256 digests in listing
    /// order (thumbnails first, then data blocks by index). An absent
    /// signature is a manifest integrity error. Verification keys default to
    /// the revision's resolved keys, falling back to the node key's
    /// verification half.
    async fn verify_manifest(
        &self,
        revision: &Revision,
        node_key: &NodeKey,
        block_hashes: &[u8],
        armored_manifest_signature: Option<String>,
    ) -> Result<(), DownloadError>;
}
