//! The integrative download module.
//!
//! Wires every port into the three public entry points and guards them with
//! global admission control. Precondition failures release the admission
//! slot and report through telemetry before surfacing to the caller.

use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use blockvault_core::{
    ActiveRevision, BlockFetcherPort, CryptoServicePort, DownloadError, DriveConfig, NodeKey,
    NodeType, NodeUid, NodesServicePort, Revision, RevisionListingPort, RevisionUid,
    RevisionsServicePort, TelemetryPort, ThumbnailApiPort, ThumbnailType,
};

use crate::downloader::FileDownloader;
use crate::pipeline::PipelineDeps;
use crate::queue::{AdmissionQueue, MAX_CONCURRENT_DOWNLOADS};
use crate::thumbnails::{self, ThumbnailDeps, ThumbnailResult};

/// Ports the module consumes.
#[derive(Clone)]
pub struct DownloadModuleDeps {
    /// Revision listing adapter.
    pub listing: Arc<dyn RevisionListingPort>,
    /// Block fetch adapter.
    pub fetcher: Arc<dyn BlockFetcherPort>,
    /// Thumbnail token adapter.
    pub thumbnail_api: Arc<dyn ThumbnailApiPort>,
    /// Node metadata and key lookup.
    pub nodes: Arc<dyn NodesServicePort>,
    /// Explicit revision lookup.
    pub revisions: Arc<dyn RevisionsServicePort>,
    /// Crypto service.
    pub crypto: Arc<dyn CryptoServicePort>,
    /// Telemetry sink.
    pub telemetry: Arc<dyn TelemetryPort>,
}

/// Factory for downloaders and thumbnail iterations.
pub struct DownloadModule {
    deps: DownloadModuleDeps,
    config: DriveConfig,
    queue: AdmissionQueue,
}

/// Build a download module with the standard admission limit.
#[must_use]
pub fn build_download_module(config: DriveConfig, deps: DownloadModuleDeps) -> DownloadModule {
    DownloadModule {
        deps,
        config,
        queue: AdmissionQueue::new(MAX_CONCURRENT_DOWNLOADS),
    }
}

impl DownloadModule {
    /// The configuration this module was built with.
    #[must_use]
    pub const fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// Create a downloader for a node's active revision.
    ///
    /// Waits for an admission slot, then validates that the node is a file
    /// with a usable active revision and a content key. The slot is released
    /// when the download finishes, or immediately on a precondition failure.
    pub async fn file_downloader(
        &self,
        node_uid: &NodeUid,
        cancel: CancellationToken,
    ) -> Result<FileDownloader, DownloadError> {
        let permit = self.queue.acquire(&cancel).await?;
        match self.prepare_from_node(node_uid).await {
            Ok((revision, node_key)) => Ok(self.downloader(revision, node_key, cancel, permit)),
            Err(err) => {
                self.deps
                    .telemetry
                    .download_init_failed(&node_uid.to_string(), &err);
                drop(permit);
                Err(err)
            }
        }
    }

    /// Create a downloader for an explicit revision.
    pub async fn revision_downloader(
        &self,
        revision_uid: &RevisionUid,
        cancel: CancellationToken,
    ) -> Result<FileDownloader, DownloadError> {
        let permit = self.queue.acquire(&cancel).await?;
        match self.prepare_from_revision(revision_uid).await {
            Ok((revision, node_key)) => Ok(self.downloader(revision, node_key, cancel, permit)),
            Err(err) => {
                self.deps
                    .telemetry
                    .download_init_failed(&revision_uid.to_string(), &err);
                drop(permit);
                Err(err)
            }
        }
    }

    /// Resolve thumbnails for a batch of nodes into a result stream.
    #[must_use]
    pub fn iterate_thumbnails(
        &self,
        node_uids: Vec<NodeUid>,
        kind: ThumbnailType,
        cancel: CancellationToken,
    ) -> ReceiverStream<ThumbnailResult> {
        thumbnails::iterate_thumbnails(
            ThumbnailDeps {
                nodes: Arc::clone(&self.deps.nodes),
                thumbnail_api: Arc::clone(&self.deps.thumbnail_api),
                fetcher: Arc::clone(&self.deps.fetcher),
                crypto: Arc::clone(&self.deps.crypto),
            },
            node_uids,
            kind,
            cancel,
        )
    }

    async fn prepare_from_node(
        &self,
        node_uid: &NodeUid,
    ) -> Result<(Revision, NodeKey), DownloadError> {
        let node = self.deps.nodes.get_node(node_uid).await?;
        if node.node_type != NodeType::File {
            return Err(DownloadError::validation(format!(
                "node {node_uid} is not a file"
            )));
        }
        let revision = match node.active_revision {
            Some(ActiveRevision::Ready(revision)) => revision,
            Some(ActiveRevision::Degraded { message }) => {
                return Err(DownloadError::validation(format!(
                    "active revision of {node_uid} unavailable: {message}"
                )));
            }
            None => {
                return Err(DownloadError::validation(format!(
                    "node {node_uid} has no active revision"
                )));
            }
        };
        let node_key = self.require_content_key(node_uid).await?;
        Ok((revision, node_key))
    }

    async fn prepare_from_revision(
        &self,
        revision_uid: &RevisionUid,
    ) -> Result<(Revision, NodeKey), DownloadError> {
        let revision = self.deps.revisions.get_revision(revision_uid).await?;
        let node_key = self.require_content_key(revision_uid.node_uid()).await?;
        Ok((revision, node_key))
    }

    async fn require_content_key(&self, node_uid: &NodeUid) -> Result<NodeKey, DownloadError> {
        let keys = self.deps.nodes.get_node_keys(node_uid).await?;
        if keys.content_session_key.is_none() {
            return Err(DownloadError::validation(format!(
                "node {node_uid} has no content key session key"
            )));
        }
        Ok(keys.key)
    }

    fn downloader(
        &self,
        revision: Revision,
        node_key: NodeKey,
        cancel: CancellationToken,
        permit: OwnedSemaphorePermit,
    ) -> FileDownloader {
        FileDownloader::new(
            PipelineDeps {
                listing: Arc::clone(&self.deps.listing),
                fetcher: Arc::clone(&self.deps.fetcher),
                crypto: Arc::clone(&self.deps.crypto),
                telemetry: Arc::clone(&self.deps.telemetry),
            },
            revision,
            node_key,
            cancel,
            Some(permit),
        )
    }
}
