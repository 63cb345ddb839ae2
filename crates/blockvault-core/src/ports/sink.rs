//! Download sink port.
//!
//! The caller provides the destination for decrypted bytes: a file, a
//! streaming response, an in-memory buffer. The pipeline owns the sink
//! exclusively while a download runs and either closes it (success) or
//! aborts it (failure).

use async_trait::async_trait;

use crate::errors::DownloadError;

/// Port for the output sink a download writes plaintext into.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait DownloadSink: Send {
    /// Append one plaintext block. Blocks arrive in strict index order.
    async fn write(&mut self, chunk: &[u8]) -> Result<(), DownloadError>;

    /// Finalize the sink after all blocks were written.
    async fn close(&mut self) -> Result<(), DownloadError>;

    /// Discard the sink after a fatal failure. Must not fail.
    async fn abort(&mut self);
}
