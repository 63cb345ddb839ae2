//! Revision domain model.
//!
//! A revision is one immutable version of a file's content, stored as
//! independently addressed ciphertext blocks plus optional thumbnails, all
//! committed to by a signed manifest.

use serde::{Deserialize, Serialize};

use crate::uid::{RevisionUid, ThumbnailUid};

/// Who authored a revision's content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentAuthor {
    /// The author's identity was verified.
    Verified(String),
    /// Verification failed; only the claimed identity is available.
    Unverified {
        /// The identity the uploader claimed.
        claimed: String,
        /// Why verification failed.
        reason: String,
    },
}

impl ContentAuthor {
    /// The author's email, verified or claimed.
    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::Verified(email) => email,
            Self::Unverified { claimed, .. } => claimed,
        }
    }
}

/// The kind of thumbnail attached to a revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailType {
    /// The standard preview.
    Preview,
    /// The high-resolution preview.
    HdPreview,
}

impl ThumbnailType {
    /// Stable name for messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::HdPreview => "hd_preview",
        }
    }
}

/// A thumbnail attached to a revision, resolvable to bytes through the
/// thumbnail token API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThumbnailDescriptor {
    /// The thumbnail's UID.
    pub uid: ThumbnailUid,
    /// Which kind of preview this is.
    pub kind: ThumbnailType,
}

/// One immutable version of a file's content.
#[derive(Clone, Debug)]
pub struct Revision {
    /// Globally unique revision identifier.
    pub uid: RevisionUid,
    /// Total plaintext size as stated by the uploader. Advisory.
    pub claimed_size: Option<u64>,
    /// Ordered per-block plaintext sizes as stated by the uploader. Advisory;
    /// used only by the seekable stream when available.
    pub claimed_block_sizes: Option<Vec<u64>>,
    /// Who authored the content, if known.
    pub content_author: Option<ContentAuthor>,
    /// Thumbnails attached to this revision.
    pub thumbnails: Vec<ThumbnailDescriptor>,
}

impl Revision {
    /// Create a revision with no claims, no author and no thumbnails.
    #[must_use]
    pub const fn new(uid: RevisionUid) -> Self {
        Self {
            uid,
            claimed_size: None,
            claimed_block_sizes: None,
            content_author: None,
            thumbnails: Vec::new(),
        }
    }

    /// The thumbnail of the given kind, if the revision has one.
    #[must_use]
    pub fn thumbnail_of(&self, kind: ThumbnailType) -> Option<&ThumbnailDescriptor> {
        self.thumbnails.iter().find(|t| t.kind == kind)
    }
}

/// Metadata describing one ciphertext block of a revision.
///
/// Within a revision, indices form a gapless 1-based sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// 1-based, contiguous, strictly increasing block index.
    pub index: u64,
    /// Storage host URL without the token query.
    pub bare_url: String,
    /// Opaque, short-lived fetch capability.
    pub token: String,
    /// Expected base64 SHA-256 hash of the ciphertext.
    pub hash: String,
    /// Email of the block's signer, when listed.
    pub signature_email: Option<String>,
    /// Armored signature over the block, when listed.
    pub armored_signature: Option<String>,
}

/// One item of a revision's paginated listing.
///
/// A listing yields exactly one `ManifestSignature`, then zero or more
/// `Thumbnail` items, then the data blocks in strictly increasing index
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevisionEvent {
    /// The revision's manifest signature, when one was recorded at upload.
    ManifestSignature {
        /// Armored signature over the concatenated block hashes.
        armored_signature: Option<String>,
    },
    /// A thumbnail's content hash. Thumbnail bytes are not fetched by the
    /// data path; only the hash contributes to the manifest.
    Thumbnail {
        /// Base64 SHA-256 hash of the thumbnail ciphertext.
        hash: String,
    },
    /// One data block.
    Block(BlockMetadata),
}
