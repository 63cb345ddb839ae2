//! Global admission control.
//!
//! At most [`MAX_CONCURRENT_DOWNLOADS`] file downloads run at once. The
//! permit travels with the downloader and is released through its finish
//! hook, so capacity returns on success and failure alike.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use blockvault_core::DownloadError;

/// Upper bound on concurrently active file downloads.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 5;

/// Counted semaphore guarding downloader creation.
#[derive(Clone, Debug)]
pub(crate) struct AdmissionQueue {
    semaphore: Arc<Semaphore>,
}

impl AdmissionQueue {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Wait for a download slot. Cancelling the token abandons the wait.
    pub(crate) async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit, DownloadError> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(DownloadError::Cancelled),

            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| DownloadError::bug("admission queue closed"))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
