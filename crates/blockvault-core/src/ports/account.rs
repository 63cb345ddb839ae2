//! Account port.

use async_trait::async_trait;

use crate::errors::DownloadError;
use crate::keys::VerificationKey;

/// Port for public key lookup by email, used to resolve a revision's
/// verification keys from its content author.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait AccountPort: Send + Sync {
    /// Fetch the public keys registered for an email address.
    async fn get_public_keys(&self, email: &str) -> Result<Vec<VerificationKey>, DownloadError>;
}
