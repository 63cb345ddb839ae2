//! Pause latch and download controller.
//!
//! Pausing is not cancellation: it is a cooperative latch the pipeline
//! checks before dispatching a block and at the start of each fetch attempt.
//! Tasks already mid-read are not interrupted. The hard cancel signal
//! travels separately as a `CancellationToken`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use blockvault_core::DownloadError;

/// Cooperative pause flag with a wake-up notifier.
#[derive(Debug, Default)]
pub(crate) struct PauseLatch {
    paused: AtomicBool,
    notify: Notify,
}

impl PauseLatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub(crate) fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Suspend until the latch is cleared. Returns immediately when not
    /// paused.
    pub(crate) async fn wait_while_paused(&self) {
        while self.paused.load(Ordering::Acquire) {
            let notified = self.notify.notified();
            // Re-check after registering so a resume between the load and
            // the registration cannot be missed.
            if !self.paused.load(Ordering::Acquire) {
                break;
            }
            notified.await;
        }
    }
}

/// Handle to a running download: pause, resume, and the terminal result.
#[derive(Debug)]
pub struct DownloadController {
    latch: Arc<PauseLatch>,
    completion: Option<JoinHandle<Result<u64, DownloadError>>>,
}

impl DownloadController {
    pub(crate) fn new(
        latch: Arc<PauseLatch>,
        completion: JoinHandle<Result<u64, DownloadError>>,
    ) -> Self {
        Self {
            latch,
            completion: Some(completion),
        }
    }

    /// Pause the download. Blocks already being fetched finish their read;
    /// no new attempts start until [`Self::resume`].
    pub fn pause(&self) {
        self.latch.pause();
    }

    /// Resume a paused download.
    pub fn resume(&self) {
        self.latch.resume();
    }

    /// Await the pipeline's terminal result: the number of ciphertext bytes
    /// transferred on success, or the first fatal error.
    ///
    /// Consuming the result twice is a caller bug.
    pub async fn completion(&mut self) -> Result<u64, DownloadError> {
        let Some(handle) = self.completion.take() else {
            return Err(DownloadError::bug("completion already consumed"));
        };
        match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(DownloadError::bug(format!(
                "download task aborted: {join_error}"
            ))),
        }
    }
}
