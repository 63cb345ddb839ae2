//! One revision's downloader.
//!
//! Created by the module once all preconditions hold. Offers the two
//! streaming entry points (verified and unsafe) plus random-access reads.
//! The admission permit travels with the downloader: it moves into the
//! pipeline when a download starts and is released by the finish hook, or
//! simply dropped if the downloader never starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

use blockvault_core::{DownloadError, DownloadSink, NodeKey, Revision};

use crate::controller::{DownloadController, PauseLatch};
use crate::pipeline::{PipelineDeps, ReassemblyPipeline};
use crate::progress::ProgressCallback;
use crate::stream::{BlockStream, SeekableStream};

/// A ready-to-run download of one revision.
pub struct FileDownloader {
    deps: PipelineDeps,
    revision: Revision,
    node_key: NodeKey,
    cancel: CancellationToken,
    started: AtomicBool,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

impl std::fmt::Debug for FileDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownloader")
            .field("revision", &self.revision)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl FileDownloader {
    pub(crate) fn new(
        deps: PipelineDeps,
        revision: Revision,
        node_key: NodeKey,
        cancel: CancellationToken,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            deps,
            revision,
            node_key,
            cancel,
            started: AtomicBool::new(false),
            permit: Mutex::new(permit),
        }
    }

    /// The total plaintext size the uploader claimed, if any.
    #[must_use]
    pub const fn claimed_size(&self) -> Option<u64> {
        self.revision.claimed_size
    }

    /// The per-block plaintext sizes the uploader claimed, if any.
    #[must_use]
    pub fn claimed_block_sizes(&self) -> Option<&[u64]> {
        self.revision.claimed_block_sizes.as_deref()
    }

    /// Stream the revision's plaintext into `sink` with full verification:
    /// per-block hashes and the manifest signature.
    pub fn write_to_sink(
        &self,
        sink: Box<dyn DownloadSink>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DownloadController, DownloadError> {
        self.start(sink, on_progress, true)
    }

    /// Stream the revision's plaintext into `sink` without hash or manifest
    /// verification. Decryption still authenticates each block's ciphertext.
    pub fn unsafe_write_to_sink(
        &self,
        sink: Box<dyn DownloadSink>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DownloadController, DownloadError> {
        self.start(sink, on_progress, false)
    }

    fn start(
        &self,
        sink: Box<dyn DownloadSink>,
        on_progress: Option<ProgressCallback>,
        verify: bool,
    ) -> Result<DownloadController, DownloadError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(DownloadError::validation("Download already started"));
        }

        let latch = Arc::new(PauseLatch::new());
        let permit = self
            .permit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let on_finish = Box::new(move || drop(permit));

        let pipeline = ReassemblyPipeline::new(
            self.deps.clone(),
            self.revision.clone(),
            self.node_key.clone(),
            Arc::clone(&latch),
            self.cancel.clone(),
            verify,
            on_progress,
            Some(on_finish),
        );
        let completion = tokio::spawn(pipeline.run(sink));

        Ok(DownloadController::new(latch, completion))
    }

    /// Random-access reads over the revision's plaintext. Blocks are
    /// demand-loaded; nothing is fetched until the first read.
    #[must_use]
    pub fn get_seekable_stream(&self) -> SeekableStream {
        let producer = BlockStream::new(
            Arc::clone(&self.deps.listing),
            Arc::clone(&self.deps.fetcher),
            Arc::clone(&self.deps.crypto),
            self.revision.clone(),
            self.node_key.clone(),
            self.cancel.clone(),
        );
        SeekableStream::new(producer, 0).expect("zero high-water mark is always accepted")
    }
}
