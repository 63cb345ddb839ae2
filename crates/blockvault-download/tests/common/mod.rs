//! Shared fakes for the pipeline scenario tests.
//!
//! Hand-rolled fakes where call sequencing matters (listing, fetcher,
//! crypto, sink, telemetry); mockall mocks from `blockvault-core`'s
//! `test-utils` feature cover the metadata services.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio_util::sync::CancellationToken;

use blockvault_core::ports::http::ByteProgress;
use blockvault_core::ports::{MockNodesServicePort, MockRevisionsServicePort, MockThumbnailApiPort};
use blockvault_core::{
    BlockFetcherPort, BlockMetadata, CryptoServicePort, DownloadError, DownloadSink, DriveConfig,
    NodeKey, NodeKeys, PrivateKey, Revision, RevisionEvent, RevisionEventSource,
    RevisionListingPort, RevisionKeys, RevisionUid, SessionKey, TelemetryPort,
};
use blockvault_download::{DownloadModule, DownloadModuleDeps, ProgressCallback, build_download_module};

// ============================================================================
// Listing
// ============================================================================

/// Replays a scripted event list.
pub struct ScriptedSource {
    events: VecDeque<RevisionEvent>,
}

#[async_trait]
impl RevisionEventSource for ScriptedSource {
    async fn next_event(&mut self) -> Result<Option<RevisionEvent>, DownloadError> {
        Ok(self.events.pop_front())
    }
}

/// Listing fake: a fixed event script plus a token refresh table.
pub struct FakeListing {
    events: Vec<RevisionEvent>,
    refresh: Mutex<HashMap<u64, BlockMetadata>>,
    refreshed_indices: Mutex<Vec<u64>>,
}

impl FakeListing {
    pub fn new(events: Vec<RevisionEvent>) -> Self {
        Self {
            events,
            refresh: Mutex::new(HashMap::new()),
            refreshed_indices: Mutex::new(Vec::new()),
        }
    }

    /// Register the metadata served for one block by the refresh endpoint.
    pub fn with_refresh(self, meta: BlockMetadata) -> Self {
        self.refresh.lock().unwrap().insert(meta.index, meta);
        self
    }

    pub fn refreshed_indices(&self) -> Vec<u64> {
        self.refreshed_indices.lock().unwrap().clone()
    }
}

#[async_trait]
impl RevisionListingPort for FakeListing {
    fn iterate_revision(
        &self,
        _revision_uid: &RevisionUid,
        _cancel: CancellationToken,
    ) -> Box<dyn RevisionEventSource> {
        Box::new(ScriptedSource {
            events: self.events.clone().into(),
        })
    }

    fn iterate_blocks(
        &self,
        _revision_uid: &RevisionUid,
        _cancel: CancellationToken,
    ) -> Box<dyn RevisionEventSource> {
        let blocks: VecDeque<RevisionEvent> = self
            .events
            .iter()
            .filter(|event| matches!(event, RevisionEvent::Block(_)))
            .cloned()
            .collect();
        Box::new(ScriptedSource { events: blocks })
    }

    async fn get_block_token(
        &self,
        _revision_uid: &RevisionUid,
        index: u64,
    ) -> Result<Option<BlockMetadata>, DownloadError> {
        self.refreshed_indices.lock().unwrap().push(index);
        Ok(self.refresh.lock().unwrap().get(&index).map(|meta| {
            BlockMetadata {
                signature_email: None,
                armored_signature: None,
                ..meta.clone()
            }
        }))
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// One scripted answer of the fake fetcher.
pub enum FetchOutcome {
    /// Report the payload length as progress, then succeed.
    Success { bytes: Vec<u8>, delay: Duration },
    /// Report some progress, then fail.
    ProgressThenError { progress: u64, error: DownloadError },
    /// Fail without any progress.
    Error(DownloadError),
}

impl FetchOutcome {
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self::Success {
            bytes,
            delay: Duration::ZERO,
        }
    }

    pub fn bytes_after(bytes: Vec<u8>, delay: Duration) -> Self {
        Self::Success { bytes, delay }
    }
}

/// Fetcher fake keyed by token, with per-token outcome scripts.
#[derive(Default)]
pub struct FakeFetcher {
    plans: Mutex<HashMap<String, VecDeque<FetchOutcome>>>,
    calls: AtomicUsize,
    inflight: AtomicUsize,
    max_inflight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(self, token: &str, outcomes: Vec<FetchOutcome>) -> Self {
        self.plans
            .lock()
            .unwrap()
            .insert(token.to_string(), outcomes.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    pub fn max_inflight(&self) -> usize {
        self.max_inflight.load(Ordering::Acquire)
    }
}

#[async_trait]
impl BlockFetcherPort for FakeFetcher {
    async fn fetch_block(
        &self,
        _bare_url: &str,
        token: &str,
        on_progress: Option<ByteProgress>,
        _cancel: CancellationToken,
    ) -> Result<Vec<u8>, DownloadError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let outcome = self
            .plans
            .lock()
            .unwrap()
            .get_mut(token)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("unexpected fetch for token {token}"));

        let inflight = self.inflight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_inflight.fetch_max(inflight, Ordering::AcqRel);
        let result = match outcome {
            FetchOutcome::Success { bytes, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if let Some(on_progress) = &on_progress {
                    on_progress(bytes.len() as u64);
                }
                Ok(bytes)
            }
            FetchOutcome::ProgressThenError { progress, error } => {
                if let Some(on_progress) = &on_progress {
                    on_progress(progress);
                }
                Err(error)
            }
            FetchOutcome::Error(error) => Err(error),
        };
        self.inflight.fetch_sub(1, Ordering::AcqRel);
        result
    }
}

// ============================================================================
// Crypto
// ============================================================================

/// Crypto fake: identity decryption, always-ok integrity, configurable
/// manifest verdict, call counting all around.
pub struct FakeCrypto {
    pub verify_block_calls: AtomicUsize,
    pub decrypt_block_calls: AtomicUsize,
    pub decrypt_thumbnail_calls: AtomicUsize,
    pub verify_manifest_calls: AtomicUsize,
    manifest_result: Mutex<Result<(), DownloadError>>,
    seen_manifest: Mutex<Option<(usize, Option<String>)>>,
}

impl FakeCrypto {
    pub fn new() -> Self {
        Self {
            verify_block_calls: AtomicUsize::new(0),
            decrypt_block_calls: AtomicUsize::new(0),
            decrypt_thumbnail_calls: AtomicUsize::new(0),
            verify_manifest_calls: AtomicUsize::new(0),
            manifest_result: Mutex::new(Ok(())),
            seen_manifest: Mutex::new(None),
        }
    }

    pub fn failing_manifest(self, error: DownloadError) -> Self {
        *self.manifest_result.lock().unwrap() = Err(error);
        self
    }

    /// `(hash bytes length, armored signature)` seen by `verify_manifest`.
    pub fn seen_manifest(&self) -> Option<(usize, Option<String>)> {
        self.seen_manifest.lock().unwrap().clone()
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Acquire)
    }

    pub fn verify_block_count(&self) -> usize {
        Self::count(&self.verify_block_calls)
    }

    pub fn decrypt_block_count(&self) -> usize {
        Self::count(&self.decrypt_block_calls)
    }

    pub fn decrypt_thumbnail_count(&self) -> usize {
        Self::count(&self.decrypt_thumbnail_calls)
    }

    pub fn verify_manifest_count(&self) -> usize {
        Self::count(&self.verify_manifest_calls)
    }
}

pub fn dummy_keys() -> RevisionKeys {
    RevisionKeys {
        private_key: PrivateKey::new(vec![0; 32]),
        content_session_key: SessionKey::new(vec![0; 32]),
        verification_keys: Vec::new(),
    }
}

#[async_trait]
impl CryptoServicePort for FakeCrypto {
    async fn revision_keys(
        &self,
        _node_key: &NodeKey,
        _revision: &Revision,
    ) -> Result<RevisionKeys, DownloadError> {
        Ok(dummy_keys())
    }

    fn verify_block_integrity(
        &self,
        _ciphertext: &[u8],
        _expected_hash: &str,
    ) -> Result<(), DownloadError> {
        self.verify_block_calls.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn decrypt_block(
        &self,
        ciphertext: Vec<u8>,
        _armored_signature: Option<String>,
        _keys: &RevisionKeys,
    ) -> Result<Vec<u8>, DownloadError> {
        self.decrypt_block_calls.fetch_add(1, Ordering::AcqRel);
        Ok(ciphertext)
    }

    async fn decrypt_thumbnail(
        &self,
        ciphertext: Vec<u8>,
        _content_session_key: &SessionKey,
    ) -> Result<Vec<u8>, DownloadError> {
        self.decrypt_thumbnail_calls.fetch_add(1, Ordering::AcqRel);
        Ok(ciphertext)
    }

    async fn verify_manifest(
        &self,
        _revision: &Revision,
        _node_key: &NodeKey,
        block_hashes: &[u8],
        armored_manifest_signature: Option<String>,
    ) -> Result<(), DownloadError> {
        self.verify_manifest_calls.fetch_add(1, Ordering::AcqRel);
        *self.seen_manifest.lock().unwrap() =
            Some((block_hashes.len(), armored_manifest_signature));
        self.manifest_result.lock().unwrap().clone()
    }
}

// ============================================================================
// Sink
// ============================================================================

#[derive(Debug, Default)]
pub struct SinkState {
    pub writes: Vec<Vec<u8>>,
    pub closed: bool,
    pub aborted: bool,
    pub fail_next_writes: usize,
}

/// Sink recording everything, with optional injected write failures.
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<SinkState>>) {
        let state = Arc::new(Mutex::new(SinkState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }

    pub fn failing_writes(count: usize) -> (Self, Arc<Mutex<SinkState>>) {
        let (sink, state) = Self::new();
        state.lock().unwrap().fail_next_writes = count;
        (sink, state)
    }
}

#[async_trait]
impl DownloadSink for RecordingSink {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), DownloadError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_writes > 0 {
            state.fail_next_writes -= 1;
            return Err(DownloadError::sink("injected write failure"));
        }
        state.writes.push(chunk.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DownloadError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }

    async fn abort(&mut self) {
        self.state.lock().unwrap().aborted = true;
    }
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Clone, Debug)]
pub enum TelemetryEvent {
    InitFailed(String, DownloadError),
    Finished(String, u64),
    Failed(String, DownloadError, u64, Option<u64>),
}

#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TelemetryPort for RecordingTelemetry {
    fn revision_span(&self, _uid: &RevisionUid) -> tracing::Span {
        tracing::Span::none()
    }

    fn download_init_failed(&self, uid: &str, error: &DownloadError) {
        self.events
            .lock()
            .unwrap()
            .push(TelemetryEvent::InitFailed(uid.to_string(), error.clone()));
    }

    fn download_finished(&self, uid: &RevisionUid, bytes: u64) {
        self.events
            .lock()
            .unwrap()
            .push(TelemetryEvent::Finished(uid.to_string(), bytes));
    }

    fn download_failed(
        &self,
        uid: &RevisionUid,
        error: &DownloadError,
        bytes: u64,
        claimed_size: Option<u64>,
    ) {
        self.events.lock().unwrap().push(TelemetryEvent::Failed(
            uid.to_string(),
            error.clone(),
            bytes,
            claimed_size,
        ));
    }
}

// ============================================================================
// Assembly helpers
// ============================================================================

pub const REVISION_UID: &str = "vol~node~rev";

pub fn revision_uid() -> RevisionUid {
    REVISION_UID.parse().unwrap()
}

/// A valid base64 wire hash with a recognizable seed byte.
pub fn wire_hash(seed: u8) -> String {
    BASE64.encode([seed; 32])
}

pub fn block_meta(index: u64) -> BlockMetadata {
    BlockMetadata {
        index,
        bare_url: format!("https://store.example/blocks/{index}"),
        token: format!("tok-{index}"),
        hash: wire_hash(u8::try_from(index).unwrap()),
        signature_email: None,
        armored_signature: None,
    }
}

/// Standard three-block script: manifest signature, one thumbnail, blocks
/// 1..=3.
pub fn three_block_events() -> Vec<RevisionEvent> {
    vec![
        RevisionEvent::ManifestSignature {
            armored_signature: Some("armored-manifest".into()),
        },
        RevisionEvent::Thumbnail {
            hash: wire_hash(0),
        },
        RevisionEvent::Block(block_meta(1)),
        RevisionEvent::Block(block_meta(2)),
        RevisionEvent::Block(block_meta(3)),
    ]
}

/// Plan the fetcher for blocks `1..=n` with payload `[index; size]` pulled
/// from `sizes`.
pub fn plan_blocks(mut fetcher: FakeFetcher, sizes: &[usize]) -> FakeFetcher {
    for (i, &size) in sizes.iter().enumerate() {
        let index = i + 1;
        fetcher = fetcher.plan(
            &format!("tok-{index}"),
            vec![FetchOutcome::bytes(vec![u8::try_from(index).unwrap(); size])],
        );
    }
    fetcher
}

pub struct Harness {
    pub listing: Arc<FakeListing>,
    pub fetcher: Arc<FakeFetcher>,
    pub crypto: Arc<FakeCrypto>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub module: DownloadModule,
}

/// Wire a module around the fakes, with mocked metadata services answering
/// for `revision`.
pub fn harness(
    revision: Revision,
    listing: FakeListing,
    fetcher: FakeFetcher,
    crypto: FakeCrypto,
) -> Harness {
    let listing = Arc::new(listing);
    let fetcher = Arc::new(fetcher);
    let crypto = Arc::new(crypto);
    let telemetry = Arc::new(RecordingTelemetry::new());

    let mut revisions = MockRevisionsServicePort::new();
    {
        let revision = revision.clone();
        revisions
            .expect_get_revision()
            .returning(move |_| Ok(revision.clone()));
    }

    let mut nodes = MockNodesServicePort::new();
    nodes.expect_get_node_keys().returning(|_| {
        Ok(NodeKeys {
            key: NodeKey::new(vec![1; 32]),
            content_session_key: Some(SessionKey::new(vec![2; 32])),
        })
    });

    let module = build_download_module(
        DriveConfig::default(),
        DownloadModuleDeps {
            listing: listing.clone(),
            fetcher: fetcher.clone(),
            thumbnail_api: Arc::new(MockThumbnailApiPort::new()),
            nodes: Arc::new(nodes),
            revisions: Arc::new(revisions),
            crypto: crypto.clone(),
            telemetry: telemetry.clone(),
        },
    );

    Harness {
        listing,
        fetcher,
        crypto,
        telemetry,
        module,
    }
}

/// A progress callback that records every delta.
pub fn progress_recorder() -> (ProgressCallback, Arc<Mutex<Vec<i64>>>) {
    let deltas = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&deltas);
    let callback: ProgressCallback = Arc::new(move |delta| {
        recorded.lock().unwrap().push(delta);
    });
    (callback, deltas)
}
