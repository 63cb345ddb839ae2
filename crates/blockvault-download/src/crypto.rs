//! Concrete crypto service.
//!
//! Key derivation is HKDF-SHA256 bound to the revision UID; block and
//! thumbnail ciphertexts are AES-256-GCM with a 12-byte nonce prefix; block
//! integrity is SHA-256 compared by base64; the manifest signature is an
//! armored Ed25519 signature over the concatenated raw block digests.
//!
//! Decryption is CPU-bound and runs on the blocking pool so the pipeline
//! driver stays responsive.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hkdf::Hkdf;
use ring::signature::{ED25519, UnparsedPublicKey};
use sha2::{Digest, Sha256};

use blockvault_core::ports::account::AccountPort;
use blockvault_core::ports::crypto::CryptoServicePort;
use blockvault_core::{
    DownloadError, NodeKey, PrivateKey, Revision, RevisionKeys, SessionKey, VerificationKey,
};

/// Derived AEAD key length in bytes.
const AEAD_KEY_LEN: usize = 32;

/// Nonce prefix length of every ciphertext.
const NONCE_LEN: usize = 12;

const REVISION_PRIVATE_KEY_INFO: &[u8] = b"blockvault:revision-private-key:v1";
const CONTENT_SESSION_KEY_INFO: &[u8] = b"blockvault:content-session-key:v1";

/// The production crypto service.
pub struct DriveCryptoService {
    account: Arc<dyn AccountPort>,
}

impl DriveCryptoService {
    /// Create the service. The account port resolves verification keys from
    /// content-author emails.
    #[must_use]
    pub fn new(account: Arc<dyn AccountPort>) -> Self {
        Self { account }
    }

    async fn resolve_verification_keys(
        &self,
        revision: &Revision,
    ) -> Result<Vec<VerificationKey>, DownloadError> {
        match &revision.content_author {
            Some(author) => self.account.get_public_keys(author.email()).await,
            None => Ok(Vec::new()),
        }
    }
}

fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<Vec<u8>, DownloadError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; AEAD_KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|_| DownloadError::decryption("key derivation failed"))?;
    Ok(okm)
}

/// Base64 SHA-256 of a byte string, the hash format used on the wire.
pub(crate) fn sha256_base64(bytes: &[u8]) -> String {
    BASE64.encode(Sha256::digest(bytes))
}

/// Raw SHA-256 digest bytes for a base64 wire hash.
pub(crate) fn decode_wire_hash(hash: &str) -> Result<Vec<u8>, DownloadError> {
    BASE64
        .decode(hash)
        .map_err(|err| DownloadError::validation(format!("malformed block hash '{hash}': {err}")))
}

fn open_aead(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, DownloadError> {
    if ciphertext.len() < NONCE_LEN {
        return Err(DownloadError::decryption("ciphertext shorter than its nonce"));
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| DownloadError::decryption("invalid content key length"))?;
    let (nonce, body) = ciphertext.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), body)
        .map_err(|_| DownloadError::decryption("authentication tag mismatch"))
}

async fn open_aead_blocking(key: Vec<u8>, ciphertext: Vec<u8>) -> Result<Vec<u8>, DownloadError> {
    tokio::task::spawn_blocking(move || open_aead(&key, &ciphertext))
        .await
        .map_err(|err| DownloadError::bug(format!("decryption task failed: {err}")))?
}

/// Strip ASCII armor and decode the signature bytes. Bare base64 is accepted
/// too; only `-----`-framed lines are treated as armor.
fn decode_armored(armored: &str) -> Result<Vec<u8>, DownloadError> {
    let mut encoded = String::new();
    for line in armored.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("-----") {
            continue;
        }
        encoded.push_str(line);
    }
    BASE64
        .decode(encoded)
        .map_err(|err| DownloadError::manifest(format!("malformed armored signature: {err}")))
}

#[async_trait]
impl CryptoServicePort for DriveCryptoService {
    async fn revision_keys(
        &self,
        node_key: &NodeKey,
        revision: &Revision,
    ) -> Result<RevisionKeys, DownloadError> {
        let salt = revision.uid.to_string();
        let private_key = hkdf_derive(node_key.secret(), salt.as_bytes(), REVISION_PRIVATE_KEY_INFO)?;
        let content_key = hkdf_derive(&private_key, salt.as_bytes(), CONTENT_SESSION_KEY_INFO)?;
        let verification_keys = self.resolve_verification_keys(revision).await?;

        Ok(RevisionKeys {
            private_key: PrivateKey::new(private_key),
            content_session_key: SessionKey::new(content_key),
            verification_keys,
        })
    }

    fn verify_block_integrity(
        &self,
        ciphertext: &[u8],
        expected_hash: &str,
    ) -> Result<(), DownloadError> {
        let actual = sha256_base64(ciphertext);
        if actual == expected_hash {
            Ok(())
        } else {
            Err(DownloadError::hash_mismatch(expected_hash, actual))
        }
    }

    async fn decrypt_block(
        &self,
        ciphertext: Vec<u8>,
        _armored_signature: Option<String>,
        keys: &RevisionKeys,
    ) -> Result<Vec<u8>, DownloadError> {
        // Block signatures are intentionally not verified: integrity comes
        // from the per-block hash and the manifest signature.
        open_aead_blocking(keys.content_session_key.as_bytes().to_vec(), ciphertext).await
    }

    async fn decrypt_thumbnail(
        &self,
        ciphertext: Vec<u8>,
        content_session_key: &SessionKey,
    ) -> Result<Vec<u8>, DownloadError> {
        open_aead_blocking(content_session_key.as_bytes().to_vec(), ciphertext).await
    }

    async fn verify_manifest(
        &self,
        revision: &Revision,
        node_key: &NodeKey,
        block_hashes: &[u8],
        armored_manifest_signature: Option<String>,
    ) -> Result<(), DownloadError> {
        let Some(armored) = armored_manifest_signature else {
            return Err(DownloadError::manifest("revision has no manifest signature"));
        };
        let signature = decode_armored(&armored)?;

        let mut keys = self.resolve_verification_keys(revision).await?;
        if keys.is_empty() {
            keys.extend(node_key.verification().cloned());
        }
        if keys.is_empty() {
            return Err(DownloadError::manifest("no verification keys available"));
        }

        let accepted = keys.iter().any(|key| {
            UnparsedPublicKey::new(&ED25519, key.as_bytes())
                .verify(block_hashes, &signature)
                .is_ok()
        });
        if accepted {
            Ok(())
        } else {
            Err(DownloadError::manifest(
                "signature does not match any verification key",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockvault_core::ports::account::MockAccountPort;
    use blockvault_core::{ContentAuthor, NodeUid, RevisionUid};
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    fn revision() -> Revision {
        let uid = RevisionUid::new(NodeUid::new("vol", "node"), "rev");
        Revision::new(uid)
    }

    fn service() -> DriveCryptoService {
        let mut account = MockAccountPort::new();
        account.expect_get_public_keys().never();
        DriveCryptoService::new(Arc::new(account))
    }

    /// AES-256-GCM seal matching the service's nonce-prefix layout.
    fn seal(key: &[u8], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes256Gcm::new_from_slice(key).unwrap();
        let mut out = nonce.to_vec();
        out.extend(cipher.encrypt(Nonce::from_slice(nonce), plaintext).unwrap());
        out
    }

    #[tokio::test]
    async fn derived_keys_are_deterministic_and_revision_bound() {
        let crypto = service();
        let node_key = NodeKey::new(vec![7; 32]);

        let a = crypto.revision_keys(&node_key, &revision()).await.unwrap();
        let b = crypto.revision_keys(&node_key, &revision()).await.unwrap();
        assert_eq!(a.content_session_key, b.content_session_key);
        assert_eq!(a.private_key, b.private_key);
        assert!(a.verification_keys.is_empty());

        let other_revision =
            Revision::new(RevisionUid::new(NodeUid::new("vol", "node"), "other"));
        let c = crypto.revision_keys(&node_key, &other_revision).await.unwrap();
        assert_ne!(a.content_session_key, c.content_session_key);
    }

    #[tokio::test]
    async fn verification_keys_come_from_the_content_author() {
        let mut account = MockAccountPort::new();
        account
            .expect_get_public_keys()
            .withf(|email| email == "claimed@example.com")
            .returning(|_| Ok(vec![VerificationKey::new(vec![1; 32])]));
        let crypto = DriveCryptoService::new(Arc::new(account));

        let mut revision = revision();
        // The claimed value from the error branch still resolves keys.
        revision.content_author = Some(ContentAuthor::Unverified {
            claimed: "claimed@example.com".into(),
            reason: "address key missing".into(),
        });

        let keys = crypto
            .revision_keys(&NodeKey::new(vec![7; 32]), &revision)
            .await
            .unwrap();
        assert_eq!(keys.verification_keys.len(), 1);
    }

    #[test]
    fn block_integrity_carries_both_hashes() {
        let crypto = service();
        let data = b"ciphertext bytes";
        assert!(crypto
            .verify_block_integrity(data, &sha256_base64(data))
            .is_ok());

        let err = crypto
            .verify_block_integrity(data, "bm90LXRoZS1oYXNo")
            .unwrap_err();
        match err {
            DownloadError::HashMismatch { expected, actual } => {
                assert_eq!(expected, "bm90LXRoZS1oYXNo");
                assert_eq!(actual, sha256_base64(data));
            }
            other => panic!("expected hash mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn block_round_trips_through_derived_keys() {
        let crypto = service();
        let node_key = NodeKey::new(vec![9; 32]);
        let keys = crypto.revision_keys(&node_key, &revision()).await.unwrap();

        let ciphertext = seal(
            keys.content_session_key.as_bytes(),
            &[3; NONCE_LEN],
            b"plaintext block",
        );
        let plain = crypto.decrypt_block(ciphertext, None, &keys).await.unwrap();
        assert_eq!(plain, b"plaintext block");
    }

    #[tokio::test]
    async fn tampered_block_fails_decryption() {
        let crypto = service();
        let keys = crypto
            .revision_keys(&NodeKey::new(vec![9; 32]), &revision())
            .await
            .unwrap();

        let mut ciphertext = seal(keys.content_session_key.as_bytes(), &[3; NONCE_LEN], b"data");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xff;

        let err = crypto.decrypt_block(ciphertext, None, &keys).await.unwrap_err();
        assert!(matches!(err, DownloadError::Decryption { .. }));
    }

    #[tokio::test]
    async fn thumbnail_decrypts_with_the_session_key() {
        let crypto = service();
        let session = SessionKey::new(vec![5; 32]);
        let ciphertext = seal(session.as_bytes(), &[1; NONCE_LEN], b"thumbnail");
        let plain = crypto.decrypt_thumbnail(ciphertext, &session).await.unwrap();
        assert_eq!(plain, b"thumbnail");
    }

    fn armored(signature: &[u8]) -> String {
        format!(
            "-----BEGIN SIGNATURE-----\n{}\n-----END SIGNATURE-----\n",
            BASE64.encode(signature)
        )
    }

    fn signing_pair() -> (Ed25519KeyPair, VerificationKey) {
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let public = VerificationKey::new(pair.public_key().as_ref().to_vec());
        (pair, public)
    }

    #[tokio::test]
    async fn manifest_verifies_against_author_keys() {
        let (pair, public) = signing_pair();
        let mut account = MockAccountPort::new();
        account
            .expect_get_public_keys()
            .returning(move |_| Ok(vec![public.clone()]));
        let crypto = DriveCryptoService::new(Arc::new(account));

        let mut revision = revision();
        revision.content_author = Some(ContentAuthor::Verified("a@example.com".into()));

        let hashes: Vec<u8> = (0..64).collect();
        let signature = pair.sign(&hashes);
        crypto
            .verify_manifest(
                &revision,
                &NodeKey::new(vec![0; 32]),
                &hashes,
                Some(armored(signature.as_ref())),
            )
            .await
            .unwrap();

        // Any tampering with the hash stream breaks the signature.
        let mut tampered = hashes;
        tampered[0] ^= 1;
        let err = crypto
            .verify_manifest(
                &revision,
                &NodeKey::new(vec![0; 32]),
                &tampered,
                Some(armored(signature.as_ref())),
            )
            .await
            .unwrap_err();
        assert!(err.is_integrity());
    }

    #[tokio::test]
    async fn manifest_falls_back_to_the_node_verification_half() {
        let (pair, public) = signing_pair();
        let crypto = service();

        let hashes = vec![0xaa; 32];
        let signature = pair.sign(&hashes);
        let node_key = NodeKey::new(vec![0; 32]).with_verification(public);

        crypto
            .verify_manifest(&revision(), &node_key, &hashes, Some(armored(signature.as_ref())))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_manifest_signature_is_an_integrity_error() {
        let crypto = service();
        let err = crypto
            .verify_manifest(&revision(), &NodeKey::new(vec![0; 32]), &[0; 32], None)
            .await
            .unwrap_err();
        assert!(err.is_integrity());
        assert!(err.to_string().contains("no manifest signature"));
    }

    #[test]
    fn wire_hash_decoding_rejects_garbage() {
        assert!(decode_wire_hash(&sha256_base64(b"x")).is_ok());
        assert!(decode_wire_hash("!!!").is_err());
    }
}
