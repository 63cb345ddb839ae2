//! Node domain model.
//!
//! A node is a file or folder entity. Files carry one active revision; the
//! revision may be degraded when its own metadata could not be decrypted.

use crate::keys::{NodeKey, SessionKey};
use crate::revision::Revision;
use crate::uid::NodeUid;

/// The kind of entity a node is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    /// A regular file with revisions.
    File,
    /// A folder. Folders have no content and cannot be downloaded.
    Folder,
}

/// The state of a node's active revision.
#[derive(Clone, Debug)]
pub enum ActiveRevision {
    /// The revision's metadata decrypted cleanly.
    Ready(Revision),
    /// The revision exists but its metadata could not be decrypted.
    Degraded {
        /// Why the revision is unusable.
        message: String,
    },
}

/// A file or folder entity.
#[derive(Clone, Debug)]
pub struct Node {
    /// The node's UID.
    pub uid: NodeUid,
    /// Whether this is a file or a folder.
    pub node_type: NodeType,
    /// The active revision, for files that have one.
    pub active_revision: Option<ActiveRevision>,
}

/// A node's key material.
#[derive(Clone, Debug)]
pub struct NodeKeys {
    /// The node's decryption key.
    pub key: NodeKey,
    /// Session key protecting the node's content. Absent for folders and for
    /// files whose key packet is missing.
    pub content_session_key: Option<SessionKey>,
}

/// Result of looking up one node in a batch.
#[derive(Clone, Debug)]
pub enum NodeLookup {
    /// The node exists.
    Found(Node),
    /// No node with this UID.
    Missing(NodeUid),
}

impl NodeLookup {
    /// The UID this lookup is about.
    #[must_use]
    pub const fn uid(&self) -> &NodeUid {
        match self {
            Self::Found(node) => &node.uid,
            Self::Missing(uid) => uid,
        }
    }
}
