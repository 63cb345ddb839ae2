//! Identifier grammar for nodes, revisions and thumbnails.
//!
//! Every entity in the remote store is addressed by a `~`-joined composite
//! identifier: `volume_id ~ node_id` for a node, with a third part naming a
//! revision or a thumbnail. Splitting requires exactly the stated part count.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DownloadError;

/// Separator between identifier parts.
const UID_SEPARATOR: char = '~';

fn split_parts(kind: &str, s: &str, expected: usize) -> Result<Vec<String>, DownloadError> {
    let parts: Vec<&str> = s.split(UID_SEPARATOR).collect();
    if parts.len() != expected || parts.iter().any(|p| p.is_empty()) {
        return Err(DownloadError::validation(format!(
            "'{s}' is not a valid {kind} UID"
        )));
    }
    Ok(parts.into_iter().map(str::to_string).collect())
}

/// Identifier of a file or folder node: `volume_id ~ node_id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeUid {
    volume_id: String,
    node_id: String,
}

impl NodeUid {
    /// Build a node UID from its two parts.
    pub fn new(volume_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
            node_id: node_id.into(),
        }
    }

    /// The volume the node lives in.
    #[must_use]
    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    /// The node identifier within its volume.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

impl fmt::Display for NodeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{UID_SEPARATOR}{}", self.volume_id, self.node_id)
    }
}

impl FromStr for NodeUid {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = split_parts("node", s, 2)?.into_iter();
        Ok(Self {
            volume_id: parts.next().unwrap_or_default(),
            node_id: parts.next().unwrap_or_default(),
        })
    }
}

impl TryFrom<String> for NodeUid {
    type Error = DownloadError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NodeUid> for String {
    fn from(uid: NodeUid) -> Self {
        uid.to_string()
    }
}

/// Identifier of one immutable revision: `volume_id ~ node_id ~ revision_id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionUid {
    node_uid: NodeUid,
    revision_id: String,
}

impl RevisionUid {
    /// Build a revision UID from its parts.
    pub fn new(node_uid: NodeUid, revision_id: impl Into<String>) -> Self {
        Self {
            node_uid,
            revision_id: revision_id.into(),
        }
    }

    /// The volume the revision lives in.
    #[must_use]
    pub fn volume_id(&self) -> &str {
        self.node_uid.volume_id()
    }

    /// The node identifier within its volume.
    #[must_use]
    pub fn node_id(&self) -> &str {
        self.node_uid.node_id()
    }

    /// The revision identifier.
    #[must_use]
    pub fn revision_id(&self) -> &str {
        &self.revision_id
    }

    /// The UID of the node this revision belongs to.
    #[must_use]
    pub const fn node_uid(&self) -> &NodeUid {
        &self.node_uid
    }
}

impl fmt::Display for RevisionUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{UID_SEPARATOR}{}", self.node_uid, self.revision_id)
    }
}

impl FromStr for RevisionUid {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = split_parts("revision", s, 3)?.into_iter();
        let volume_id = parts.next().unwrap_or_default();
        let node_id = parts.next().unwrap_or_default();
        Ok(Self {
            node_uid: NodeUid::new(volume_id, node_id),
            revision_id: parts.next().unwrap_or_default(),
        })
    }
}

impl TryFrom<String> for RevisionUid {
    type Error = DownloadError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RevisionUid> for String {
    fn from(uid: RevisionUid) -> Self {
        uid.to_string()
    }
}

/// Identifier of one thumbnail: `volume_id ~ node_id ~ thumbnail_id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThumbnailUid {
    node_uid: NodeUid,
    thumbnail_id: String,
}

impl ThumbnailUid {
    /// Build a thumbnail UID from its parts.
    pub fn new(node_uid: NodeUid, thumbnail_id: impl Into<String>) -> Self {
        Self {
            node_uid,
            thumbnail_id: thumbnail_id.into(),
        }
    }

    /// The volume the thumbnail lives in.
    #[must_use]
    pub fn volume_id(&self) -> &str {
        self.node_uid.volume_id()
    }

    /// The thumbnail identifier.
    #[must_use]
    pub fn thumbnail_id(&self) -> &str {
        &self.thumbnail_id
    }

    /// The UID of the node this thumbnail belongs to.
    #[must_use]
    pub const fn node_uid(&self) -> &NodeUid {
        &self.node_uid
    }
}

impl fmt::Display for ThumbnailUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{UID_SEPARATOR}{}", self.node_uid, self.thumbnail_id)
    }
}

impl FromStr for ThumbnailUid {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = split_parts("thumbnail", s, 3)?.into_iter();
        let volume_id = parts.next().unwrap_or_default();
        let node_id = parts.next().unwrap_or_default();
        Ok(Self {
            node_uid: NodeUid::new(volume_id, node_id),
            thumbnail_id: parts.next().unwrap_or_default(),
        })
    }
}

impl TryFrom<String> for ThumbnailUid {
    type Error = DownloadError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ThumbnailUid> for String {
    fn from(uid: ThumbnailUid) -> Self {
        uid.to_string()
    }
}
