//! # Local KMS backend
//!
//! Keys are encrypted at rest with AES-256-GCM under a master key derived
//! via HKDF-SHA256 from a passphrase or supplied key file (spec §4.2, §6.4).
//! One logical "file" per key: `{key_id, algorithm, created_at, status,
//! ciphertext}` where `ciphertext = nonce || encrypted_secret_key || tag`.
//! This backend keeps that record in memory; a host wanting on-disk
//! persistence serializes [`StoredKey`] itself.

use std::collections::HashMap;
use std::sync::RwLock;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use chrono::{DateTime, Utc};
use ed25519_dalek::Signer as _;
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use super::{KeyManager, KeyPurpose, KeyReference, KeyStatus};
use crate::crypto::Algorithm;
use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;

/// On-disk-shaped record for one key (spec §6.4). `ciphertext` is
/// `nonce || AES-256-GCM(secret_key) || tag` (the `aes-gcm` crate appends
/// the tag to the ciphertext itself).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredKey {
    /// Backend-assigned key id.
    pub key_id: String,
    /// Signature algorithm.
    pub algorithm: Algorithm,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: KeyStatus,
    /// `nonce || ciphertext-with-tag`.
    pub ciphertext: Vec<u8>,
    /// Public key bytes, kept in cleartext (public by definition).
    pub public_key: Vec<u8>,
}

/// A KMS backend storing encrypted key material in process memory, keyed
/// by `key_id`.
pub struct LocalKms {
    master_key: [u8; 32],
    keys: RwLock<HashMap<String, StoredKey>>,
}

impl LocalKms {
    /// Derive a master key from `passphrase` via HKDF-SHA256 and construct
    /// an empty backend.
    #[must_use]
    pub fn from_passphrase(passphrase: &[u8]) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(b"trust-protocol-core-kms-v1"), passphrase);
        let mut master_key = [0u8; 32];
        // `expand` only fails if the requested length exceeds HKDF's output
        // limit (255 * hash length); 32 bytes never does.
        hk.expand(b"local-kms-master-key", &mut master_key)
            .expect("32-byte HKDF expand is always within RFC 5869 bounds");
        Self { master_key, keys: RwLock::new(HashMap::new()) }
    }

    /// Construct directly from a 32-byte key file, bypassing HKDF (for
    /// hosts that already manage key derivation themselves).
    #[must_use]
    pub fn from_key_file(master_key: [u8; 32]) -> Self {
        Self { master_key, keys: RwLock::new(HashMap::new()) }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.master_key))
    }

    fn encrypt_secret(&self, mut secret: Vec<u8>) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher()
            .encrypt(nonce, secret.as_slice())
            .map_err(|e| Error::internal(format!("key encryption failed: {e}")))?;
        secret.zeroize();
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt_secret(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN {
            return Err(Error::internal("stored ciphertext shorter than nonce"));
        }
        let (nonce_bytes, rest) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher()
            .decrypt(nonce, rest)
            .map_err(|e| Error::internal(format!("key decryption failed: {e}")))
    }

    fn generate_keypair(algorithm: Algorithm) -> (Vec<u8>, Vec<u8>) {
        match algorithm {
            Algorithm::Ed25519 => {
                let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
                (signing_key.to_bytes().to_vec(), signing_key.verifying_key().to_bytes().to_vec())
            }
            Algorithm::Secp256k1 => {
                let signing_key = k256::ecdsa::SigningKey::random(&mut OsRng);
                let public = signing_key.verifying_key().to_encoded_point(true);
                (signing_key.to_bytes().to_vec(), public.as_bytes().to_vec())
            }
        }
    }

    fn sign_with(algorithm: Algorithm, secret_bytes: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        match algorithm {
            Algorithm::Ed25519 => {
                let bytes: [u8; 32] = secret_bytes.try_into().map_err(|_| {
                    Error::internal("stored ed25519 secret key has wrong length")
                })?;
                let signing_key = ed25519_dalek::SigningKey::from_bytes(&bytes);
                Ok(signing_key.sign(message).to_bytes().to_vec())
            }
            Algorithm::Secp256k1 => {
                use k256::ecdsa::signature::Signer as _;
                let signing_key = k256::ecdsa::SigningKey::from_slice(secret_bytes)
                    .map_err(|e| Error::internal(format!("stored secp256k1 secret key invalid: {e}")))?;
                // `message` already arrives as the SHA-256 digest of the
                // signing input (spec §4.1); hashing it again here would
                // produce a signature over the wrong value.
                let signature: k256::ecdsa::Signature = signing_key.sign(message);
                let normalized = signature.normalize_s().unwrap_or(signature);
                Ok(normalized.to_bytes().to_vec())
            }
        }
    }
}

#[async_trait::async_trait]
impl KeyManager for LocalKms {
    async fn generate(&self, algorithm: Algorithm, purpose: KeyPurpose) -> Result<KeyReference> {
        let (secret, public) = Self::generate_keypair(algorithm);
        let ciphertext = self.encrypt_secret(secret)?;
        let key_id = format!("local-{}-{}", purpose_tag(purpose), uuid::Uuid::new_v4());
        let record = StoredKey {
            key_id: key_id.clone(),
            algorithm,
            created_at: Utc::now(),
            status: KeyStatus::Active,
            ciphertext,
            public_key: public,
        };
        self.keys
            .write()
            .map_err(|_| Error::internal("local KMS key store lock poisoned"))?
            .insert(key_id.clone(), record);
        tracing::info!(key_id = %key_id, algorithm = ?algorithm, "generated local KMS key");
        Ok(KeyReference { key_id, algorithm, status: KeyStatus::Active })
    }

    async fn sign(&self, key_id: &str, message: &[u8]) -> Result<Vec<u8>> {
        let record = {
            let keys = self.keys.read().map_err(|_| Error::internal("local KMS key store lock poisoned"))?;
            keys.get(key_id)
                .cloned()
                .ok_or_else(|| Error::KeyNotFound { key_id: key_id.to_string() })?
        };
        if record.status != KeyStatus::Active {
            return Err(Error::KeyDisabled { key_id: key_id.to_string() });
        }
        let mut secret = self.decrypt_secret(&record.ciphertext)?;
        let result = Self::sign_with(record.algorithm, &secret, message);
        secret.zeroize();
        result
    }

    async fn public_key(&self, key_id: &str) -> Result<Vec<u8>> {
        let keys = self.keys.read().map_err(|_| Error::internal("local KMS key store lock poisoned"))?;
        keys.get(key_id)
            .map(|r| r.public_key.clone())
            .ok_or_else(|| Error::KeyNotFound { key_id: key_id.to_string() })
    }

    async fn rotate(&self, key_id: &str) -> Result<KeyReference> {
        let (algorithm, purpose_hint) = {
            let mut keys =
                self.keys.write().map_err(|_| Error::internal("local KMS key store lock poisoned"))?;
            let record = keys
                .get_mut(key_id)
                .ok_or_else(|| Error::KeyNotFound { key_id: key_id.to_string() })?;
            record.status = KeyStatus::Disabled;
            (record.algorithm, record.key_id.clone())
        };
        tracing::info!(old_key_id = %purpose_hint, "disabled key for rotation");
        self.generate(algorithm, KeyPurpose::CredentialIssuance).await
    }

    async fn disable(&self, key_id: &str) -> Result<()> {
        let mut keys =
            self.keys.write().map_err(|_| Error::internal("local KMS key store lock poisoned"))?;
        let record = keys
            .get_mut(key_id)
            .ok_or_else(|| Error::KeyNotFound { key_id: key_id.to_string() })?;
        record.status = KeyStatus::Disabled;
        Ok(())
    }
}

fn purpose_tag(purpose: KeyPurpose) -> &'static str {
    match purpose {
        KeyPurpose::CredentialIssuance => "issuance",
        KeyPurpose::StatusListSigning => "status",
        KeyPurpose::AuditSigning => "audit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;

    #[tokio::test]
    async fn generate_sign_verify_round_trip() {
        let kms = LocalKms::from_passphrase(b"test passphrase");
        let key_ref = kms.generate(Algorithm::Ed25519, KeyPurpose::CredentialIssuance).await.unwrap();
        let public = kms.public_key(&key_ref.key_id).await.unwrap();
        let message = b"sign me";
        let signature = kms.sign(&key_ref.key_id, message).await.unwrap();
        assert!(crypto::verify(Algorithm::Ed25519, &public, message, &signature).unwrap());
    }

    #[tokio::test]
    async fn secp256k1_round_trip() {
        let kms = LocalKms::from_passphrase(b"test passphrase");
        let key_ref = kms.generate(Algorithm::Secp256k1, KeyPurpose::AuditSigning).await.unwrap();
        let public = kms.public_key(&key_ref.key_id).await.unwrap();
        // `sign`/`verify` operate on the digest directly for secp256k1.
        let digest = crypto::sha256(b"audit entry preimage");
        let signature = kms.sign(&key_ref.key_id, &digest).await.unwrap();
        assert!(crypto::verify(Algorithm::Secp256k1, &public, &digest, &signature).unwrap());
    }

    #[tokio::test]
    async fn disabled_key_cannot_sign_but_public_key_remains() {
        let kms = LocalKms::from_passphrase(b"pw");
        let key_ref = kms.generate(Algorithm::Ed25519, KeyPurpose::AuditSigning).await.unwrap();
        kms.disable(&key_ref.key_id).await.unwrap();

        assert!(matches!(
            kms.sign(&key_ref.key_id, b"msg").await,
            Err(Error::KeyDisabled { .. })
        ));
        assert!(kms.public_key(&key_ref.key_id).await.is_ok());
    }

    #[tokio::test]
    async fn rotate_disables_old_key_but_keeps_it_verifiable() {
        let kms = LocalKms::from_passphrase(b"pw");
        let old = kms.generate(Algorithm::Ed25519, KeyPurpose::CredentialIssuance).await.unwrap();
        let old_public = kms.public_key(&old.key_id).await.unwrap();
        let old_signature = kms.sign(&old.key_id, b"before rotation").await.unwrap();

        let new = kms.rotate(&old.key_id).await.unwrap();
        assert_ne!(new.key_id, old.key_id);

        assert!(matches!(
            kms.sign(&old.key_id, b"after rotation").await,
            Err(Error::KeyDisabled { .. })
        ));
        assert!(crypto::verify(Algorithm::Ed25519, &old_public, b"before rotation", &old_signature).unwrap());
    }

    #[tokio::test]
    async fn unknown_key_id_errors() {
        let kms = LocalKms::from_passphrase(b"pw");
        assert!(matches!(
            kms.public_key("does-not-exist").await,
            Err(Error::KeyNotFound { .. })
        ));
    }
}
