//! Key material newtypes.
//!
//! All key material is opaque bytes to the pipeline; only the crypto service
//! interprets it. Debug output never prints the bytes themselves.

use std::fmt;

/// A node's decryption key, with an optional verification half used as the
/// fallback for manifest signature checks.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeKey {
    secret: Vec<u8>,
    verification: Option<VerificationKey>,
}

impl NodeKey {
    /// Wrap raw secret key material.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            verification: None,
        }
    }

    /// Attach the key's verification half.
    #[must_use]
    pub fn with_verification(mut self, key: VerificationKey) -> Self {
        self.verification = Some(key);
        self
    }

    /// The raw secret bytes.
    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// The verification half, if the key carries one.
    #[must_use]
    pub const fn verification(&self) -> Option<&VerificationKey> {
        self.verification.as_ref()
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKey")
            .field("secret_len", &self.secret.len())
            .field("has_verification", &self.verification.is_some())
            .finish()
    }
}

/// A symmetric session key.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    /// Wrap raw session key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({} bytes)", self.0.len())
    }
}

/// A revision's private decryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// Wrap raw private key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({} bytes)", self.0.len())
    }
}

/// A public key used to verify signatures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationKey(Vec<u8>);

impl VerificationKey {
    /// Wrap raw public key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Keys derived once per downloader from `(node_key, revision)`.
///
/// Held for the download's lifetime and dropped with the downloader.
#[derive(Clone, Debug)]
pub struct RevisionKeys {
    /// The revision's private decryption key.
    pub private_key: PrivateKey,
    /// The session key protecting the revision's content blocks.
    pub content_session_key: SessionKey,
    /// Keys eligible to verify the revision's signatures. Empty when the
    /// revision has no content author.
    pub verification_keys: Vec<VerificationKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_key_bytes() {
        let key = NodeKey::new(vec![1, 2, 3]);
        let debug = format!("{key:?}");
        assert!(!debug.contains('1'), "secret bytes leaked: {debug}");
        assert!(debug.contains("secret_len"));

        let session = SessionKey::new(vec![9; 32]);
        assert_eq!(format!("{session:?}"), "SessionKey(32 bytes)");
    }

    #[test]
    fn node_key_verification_half_is_optional() {
        let bare = NodeKey::new(vec![0; 16]);
        assert!(bare.verification().is_none());

        let with = bare.clone().with_verification(VerificationKey::new(vec![7; 32]));
        assert_eq!(with.verification().unwrap().as_bytes(), &[7; 32]);
    }
}
