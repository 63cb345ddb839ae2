//! Ordered reassembly engine.
//!
//! The driver loop owns all pipeline state. It pulls listing events, spawns
//! one task per block (fetch, verify, decrypt), and alternates between
//! awaiting capacity and flushing whatever has become contiguous, so the
//! strict index-order guarantee lives in exactly one code path.
//!
//! Block tasks never touch the sink: they park their plaintext in the
//! per-block slot and report through a completion channel. The driver waits
//! on that channel, which means a failing task in the middle of the window
//! surfaces on the very next wait, not when its turn to flush comes.

// Byte counters fit i64 comfortably; progress deltas are signed on purpose.
#![allow(clippy::cast_possible_wrap)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use blockvault_core::ports::http::ByteProgress;
use blockvault_core::{
    BlockFetcherPort, BlockMetadata, CryptoServicePort, DownloadError, DownloadSink, NodeKey,
    Revision, RevisionEvent, RevisionEventSource, RevisionKeys, RevisionListingPort, RevisionUid,
    TelemetryPort,
};

use crate::controller::PauseLatch;
use crate::crypto::decode_wire_hash;
use crate::progress::ProgressCallback;

/// Upper bound on blocks in flight for one file.
pub const MAX_BLOCK_CONCURRENCY: usize = 10;

/// Hook fired exactly once when the pipeline reaches a terminal state.
pub(crate) type FinishHook = Box<dyn FnOnce() + Send + Sync>;

/// Ports the pipeline consumes, cloned into every block task.
#[derive(Clone)]
pub(crate) struct PipelineDeps {
    pub listing: Arc<dyn RevisionListingPort>,
    pub fetcher: Arc<dyn BlockFetcherPort>,
    pub crypto: Arc<dyn CryptoServicePort>,
    pub telemetry: Arc<dyn TelemetryPort>,
}

type CompletionSender = mpsc::UnboundedSender<(u64, Result<(), DownloadError>)>;
type CompletionReceiver = mpsc::UnboundedReceiver<(u64, Result<(), DownloadError>)>;

fn lock_plaintext(slot: &Mutex<Option<Vec<u8>>>) -> MutexGuard<'_, Option<Vec<u8>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One dispatched block: its task handle and the slot the task fills.
struct BlockSlot {
    handle: JoinHandle<()>,
    plaintext: Arc<Mutex<Option<Vec<u8>>>>,
}

/// Driver-owned pipeline state. Only mutated between awaits of the driver
/// loop; block tasks reach it exclusively through their own slot.
struct PipelineState {
    next_index: u64,
    ongoing: HashMap<u64, BlockSlot>,
    manifest_signature: Option<String>,
    /// Concatenated raw SHA-256 digests in listing order: thumbnails first,
    /// then data blocks by index.
    all_hashes: Vec<u8>,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            next_index: 1,
            ongoing: HashMap::new(),
            manifest_signature: None,
            all_hashes: Vec::new(),
        }
    }

    fn head_ready(&self) -> bool {
        self.ongoing
            .get(&self.next_index)
            .is_some_and(|slot| lock_plaintext(&slot.plaintext).is_some())
    }

    /// Dispatched blocks whose completion the driver has not observed yet.
    fn pending_count(&self) -> usize {
        self.ongoing
            .values()
            .filter(|slot| lock_plaintext(&slot.plaintext).is_none())
            .count()
    }

    fn take_head(&mut self) -> Option<Vec<u8>> {
        self.ongoing
            .get(&self.next_index)
            .and_then(|slot| lock_plaintext(&slot.plaintext).take())
    }

    fn abort_all(&mut self) {
        for slot in self.ongoing.values() {
            slot.handle.abort();
        }
        self.ongoing.clear();
    }
}

/// The download pipeline for one revision.
pub(crate) struct ReassemblyPipeline {
    deps: PipelineDeps,
    revision: Revision,
    node_key: NodeKey,
    latch: Arc<PauseLatch>,
    cancel: CancellationToken,
    /// When false, hash and manifest verification are skipped entirely.
    verify: bool,
    on_progress: Option<ProgressCallback>,
    on_finish: Option<FinishHook>,
}

impl ReassemblyPipeline {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        deps: PipelineDeps,
        revision: Revision,
        node_key: NodeKey,
        latch: Arc<PauseLatch>,
        cancel: CancellationToken,
        verify: bool,
        on_progress: Option<ProgressCallback>,
        on_finish: Option<FinishHook>,
    ) -> Self {
        Self {
            deps,
            revision,
            node_key,
            latch,
            cancel,
            verify,
            on_progress,
            on_finish,
        }
    }

    /// Run the pipeline to its terminal state.
    ///
    /// On success the sink is closed and `download_finished` fires; on any
    /// fatal error the sink is aborted and `download_failed` fires. The
    /// finish hook runs exactly once either way. Returns the net ciphertext
    /// bytes transferred.
    pub(crate) async fn run(
        mut self,
        mut sink: Box<dyn DownloadSink>,
    ) -> Result<u64, DownloadError> {
        let span = self.deps.telemetry.revision_span(&self.revision.uid);
        let revision_uid = self.revision.uid.clone();
        let claimed_size = self.revision.claimed_size;
        let on_finish = self.on_finish.take();
        let progress = Arc::new(AtomicI64::new(0));

        let result = self.drive(&mut sink, &progress).instrument(span).await;
        let transferred = progress.load(Ordering::Acquire).max(0) as u64;

        match &result {
            Ok(()) => {
                self.deps
                    .telemetry
                    .download_finished(&revision_uid, transferred);
            }
            Err(err) => {
                sink.abort().await;
                self.deps
                    .telemetry
                    .download_failed(&revision_uid, err, transferred, claimed_size);
            }
        }
        if let Some(hook) = on_finish {
            hook();
        }
        result.map(|()| transferred)
    }

    async fn drive(
        &mut self,
        sink: &mut Box<dyn DownloadSink>,
        progress: &Arc<AtomicI64>,
    ) -> Result<(), DownloadError> {
        let keys = Arc::new(
            self.deps
                .crypto
                .revision_keys(&self.node_key, &self.revision)
                .await?,
        );
        let mut source = self
            .deps
            .listing
            .iterate_revision(&self.revision.uid, self.cancel.clone());

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut state = PipelineState::new();

        let pumped = self
            .pump(
                source.as_mut(),
                &keys,
                &done_tx,
                &mut done_rx,
                &mut state,
                sink,
                progress,
            )
            .await;
        if let Err(err) = pumped {
            state.abort_all();
            return Err(err);
        }

        if self.verify {
            let armored = state.manifest_signature.take();
            self.deps
                .crypto
                .verify_manifest(&self.revision, &self.node_key, &state.all_hashes, armored)
                .await?;
        }

        sink.close().await?;
        Ok(())
    }

    /// Iterate the listing, dispatch block tasks, and keep the sink fed in
    /// strict index order; then drain what is still in flight.
    #[allow(clippy::too_many_arguments)]
    async fn pump(
        &self,
        source: &mut dyn RevisionEventSource,
        keys: &Arc<RevisionKeys>,
        done_tx: &CompletionSender,
        done_rx: &mut CompletionReceiver,
        state: &mut PipelineState,
        sink: &mut Box<dyn DownloadSink>,
        progress: &Arc<AtomicI64>,
    ) -> Result<(), DownloadError> {
        while let Some(event) = source.next_event().await? {
            match event {
                RevisionEvent::ManifestSignature { armored_signature } => {
                    state.manifest_signature = armored_signature;
                }
                RevisionEvent::Thumbnail { hash } => {
                    // Thumbnail bytes are not fetched on the data path; only
                    // the hash contributes to the manifest.
                    state.all_hashes.extend(decode_wire_hash(&hash)?);
                }
                RevisionEvent::Block(meta) => {
                    state.all_hashes.extend(decode_wire_hash(&meta.hash)?);
                    self.latch.wait_while_paused().await;

                    let index = meta.index;
                    let slot = self.dispatch(meta, keys, done_tx.clone(), progress);
                    state.ongoing.insert(index, slot);

                    self.wait_for_capacity(state, done_rx).await?;
                    flush_ready(state, sink).await?;
                }
            }
        }

        while state.pending_count() > 0 {
            recv_completion(done_rx).await?;
            flush_ready(state, sink).await?;
        }
        flush_ready(state, sink).await?;

        if !state.ongoing.is_empty() {
            return Err(DownloadError::bug(format!(
                "{} blocks left unemitted after drain",
                state.ongoing.len()
            )));
        }
        Ok(())
    }

    /// Block until the concurrency window has room or the head block can be
    /// flushed. Waits on the completion channel, never on a single task, so
    /// a failure anywhere in the window surfaces immediately.
    async fn wait_for_capacity(
        &self,
        state: &mut PipelineState,
        done_rx: &mut CompletionReceiver,
    ) -> Result<(), DownloadError> {
        while state.ongoing.len() >= MAX_BLOCK_CONCURRENCY && !state.head_ready() {
            if state.pending_count() == 0 {
                break;
            }
            recv_completion(done_rx).await?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        meta: BlockMetadata,
        keys: &Arc<RevisionKeys>,
        done_tx: CompletionSender,
        progress: &Arc<AtomicI64>,
    ) -> BlockSlot {
        let plaintext = Arc::new(Mutex::new(None));
        let task = BlockTask {
            meta,
            keys: Arc::clone(keys),
            listing: Arc::clone(&self.deps.listing),
            fetcher: Arc::clone(&self.deps.fetcher),
            crypto: Arc::clone(&self.deps.crypto),
            revision_uid: self.revision.uid.clone(),
            latch: Arc::clone(&self.latch),
            cancel: self.cancel.clone(),
            verify: self.verify,
            progress: Arc::clone(progress),
            on_progress: self.on_progress.clone(),
            slot: Arc::clone(&plaintext),
        };
        let handle = tokio::spawn(async move {
            let index = task.meta.index;
            let result = task.run().await;
            let _ = done_tx.send((index, result));
        });
        BlockSlot { handle, plaintext }
    }
}

async fn recv_completion(done_rx: &mut CompletionReceiver) -> Result<(), DownloadError> {
    match done_rx.recv().await {
        Some((_, Ok(()))) => Ok(()),
        Some((index, Err(err))) => {
            tracing::error!(block = index, %err, "block task failed");
            Err(err)
        }
        None => Err(DownloadError::bug(
            "completion channel closed with blocks pending",
        )),
    }
}

/// Write every contiguous completed block to the sink. A failed write is
/// retried exactly once; the second failure is fatal.
async fn flush_ready(
    state: &mut PipelineState,
    sink: &mut Box<dyn DownloadSink>,
) -> Result<(), DownloadError> {
    while let Some(plain) = state.take_head() {
        write_with_retry(sink, &plain).await?;
        state.ongoing.remove(&state.next_index);
        state.next_index += 1;
    }
    Ok(())
}

async fn write_with_retry(
    sink: &mut Box<dyn DownloadSink>,
    chunk: &[u8],
) -> Result<(), DownloadError> {
    if let Err(first) = sink.write(chunk).await {
        tracing::warn!(%first, "sink write failed, retrying once");
        sink.write(chunk).await?;
    }
    Ok(())
}

/// One block's fetch/verify/decrypt execution, running in its own task.
struct BlockTask {
    meta: BlockMetadata,
    keys: Arc<RevisionKeys>,
    listing: Arc<dyn RevisionListingPort>,
    fetcher: Arc<dyn BlockFetcherPort>,
    crypto: Arc<dyn CryptoServicePort>,
    revision_uid: RevisionUid,
    latch: Arc<PauseLatch>,
    cancel: CancellationToken,
    verify: bool,
    progress: Arc<AtomicI64>,
    on_progress: Option<ProgressCallback>,
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl BlockTask {
    /// At most one retry for non-auth failures. Token refreshes are
    /// unbounded and do not consume the retry budget, but they do not reset
    /// it either.
    async fn run(mut self) -> Result<(), DownloadError> {
        let mut retried = false;
        loop {
            self.latch.wait_while_paused().await;

            let attempt_bytes = Arc::new(AtomicU64::new(0));
            match self.attempt(&attempt_bytes).await {
                Ok(plain) => {
                    *lock_plaintext(&self.slot) = Some(plain);
                    return Ok(());
                }
                Err(err) => {
                    // Cancel reported partial progress before any retry so
                    // the caller's counter stays meaningful.
                    self.roll_back_partial(&attempt_bytes);

                    if err.is_cancelled() {
                        return Err(err);
                    }
                    if err.is_token_expired() {
                        self.refresh_token().await?;
                        continue;
                    }
                    if retried || !err.is_retryable() {
                        return Err(err);
                    }
                    retried = true;
                    tracing::warn!(block = self.meta.index, %err, "block attempt failed, retrying");
                }
            }
        }
    }

    async fn attempt(&self, attempt_bytes: &Arc<AtomicU64>) -> Result<Vec<u8>, DownloadError> {
        let total = Arc::clone(&self.progress);
        let on_progress = self.on_progress.clone();
        let attempt = Arc::clone(attempt_bytes);
        let track: ByteProgress = Arc::new(move |delta: u64| {
            attempt.fetch_add(delta, Ordering::AcqRel);
            total.fetch_add(delta as i64, Ordering::AcqRel);
            if let Some(cb) = &on_progress {
                cb(delta as i64);
            }
        });

        let ciphertext = self
            .fetcher
            .fetch_block(
                &self.meta.bare_url,
                &self.meta.token,
                Some(track),
                self.cancel.clone(),
            )
            .await?;
        if self.verify {
            self.crypto
                .verify_block_integrity(&ciphertext, &self.meta.hash)?;
        }
        self.crypto
            .decrypt_block(ciphertext, self.meta.armored_signature.clone(), &self.keys)
            .await
    }

    fn roll_back_partial(&self, attempt_bytes: &AtomicU64) {
        let partial = attempt_bytes.swap(0, Ordering::AcqRel);
        if partial > 0 {
            self.progress.fetch_sub(partial as i64, Ordering::AcqRel);
            if let Some(cb) = &self.on_progress {
                cb(-(partial as i64));
            }
        }
    }

    async fn refresh_token(&mut self) -> Result<(), DownloadError> {
        tracing::debug!(block = self.meta.index, "block token expired, refreshing");
        let fresh = self
            .listing
            .get_block_token(&self.revision_uid, self.meta.index)
            .await?
            .ok_or_else(|| {
                DownloadError::bug(format!(
                    "block {} disappeared during token refresh",
                    self.meta.index
                ))
            })?;
        // The refresh answer is partial; keep the originally listed
        // signature fields.
        self.meta.bare_url = fresh.bare_url;
        self.meta.token = fresh.token;
        Ok(())
    }
}
