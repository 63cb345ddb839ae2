//! Nodes service port.
//!
//! Node and revision metadata live in an adjacent subsystem (with its own
//! fetch and cache layers); the download pipeline only consumes it through
//! this interface.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::DownloadError;
use crate::node::{Node, NodeKeys, NodeLookup};
use crate::uid::NodeUid;

/// Port for node metadata and key lookup.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait NodesServicePort: Send + Sync {
    /// Fetch one node.
    async fn get_node(&self, uid: &NodeUid) -> Result<Node, DownloadError>;

    /// Fetch a node's key material.
    async fn get_node_keys(&self, uid: &NodeUid) -> Result<NodeKeys, DownloadError>;

    /// Look up a batch of nodes. Every requested UID yields exactly one
    /// entry; unknown UIDs come back as [`NodeLookup::Missing`].
    async fn iterate_nodes(
        &self,
        uids: &[NodeUid],
        cancel: CancellationToken,
    ) -> Result<Vec<NodeLookup>, DownloadError>;
}
