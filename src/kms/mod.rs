//! # Key Management Interface (C2)
//!
//! A uniform contract over local / AWS / GCP key backends. Secret bytes
//! never leave the backend; the rest of the core only ever holds a
//! [`KeyReference`] handle and signature bytes (spec §4.2).

pub mod local;

#[cfg(feature = "aws-kms")]
pub mod aws;

#[cfg(feature = "reqwest-client")]
pub mod gcp;

use serde::{Deserialize, Serialize};

use crate::crypto::Algorithm;
use crate::error::Result;

/// What a key is used for. Informational; backends may use it to scope
/// key policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPurpose {
    /// Signs Verifiable Credentials as an issuer.
    CredentialIssuance,
    /// Signs Status List 2021 credentials.
    StatusListSigning,
    /// Signs audit log entries.
    AuditSigning,
}

/// Lifecycle state of a key (spec §3 Key Reference).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    /// May sign and verify.
    Active,
    /// May verify (old signatures stay valid) but may not sign.
    Disabled,
    /// Destroyed; neither sign nor verify should be attempted.
    Destroyed,
}

/// Opaque KMS handle. The core owns only this; the backend owns the secret
/// bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReference {
    /// Backend-assigned key id.
    pub key_id: String,
    /// Signature algorithm this key is bound to.
    pub algorithm: Algorithm,
    /// Current lifecycle state.
    pub status: KeyStatus,
}

/// Uniform contract satisfied by every KMS backend (spec §4.2 table).
///
/// Implementations are responsible for their own internal synchronization;
/// a `KeyReference` is immutable once acquired and safe to share across
/// threads (spec §5).
#[async_trait::async_trait]
pub trait KeyManager: Send + Sync {
    /// Generate a new key for `purpose` using `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::KmsUnavailable`] if the backend
    /// cannot service the request.
    async fn generate(&self, algorithm: Algorithm, purpose: KeyPurpose) -> Result<KeyReference>;

    /// Sign `message` under `key_id`.
    ///
    /// For an [`Algorithm::Secp256k1`] key, `message` is always the final
    /// SHA-256 digest of the signing input, never the raw input itself —
    /// callers hash once (spec §4.1) and every backend signs that digest
    /// as-is. For an [`Algorithm::Ed25519`] key, `message` is the raw
    /// signing input; Ed25519 hashes internally as part of the signature
    /// scheme and must not be pre-hashed by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::KeyNotFound`],
    /// [`crate::error::Error::KeyDisabled`], or
    /// [`crate::error::Error::KmsUnavailable`].
    async fn sign(&self, key_id: &str, message: &[u8]) -> Result<Vec<u8>>;

    /// Retrieve the public key bytes for `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::KeyNotFound`] if the id is unknown to
    /// this backend (this includes disabled keys, whose public material
    /// must remain available for verification).
    async fn public_key(&self, key_id: &str) -> Result<Vec<u8>>;

    /// Rotate `key_id`: generate a fresh key of the same algorithm and
    /// purpose, and mark the old key `disabled` (not destroyed — its public
    /// key remains resolvable so signatures it produced keep verifying).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::KeyNotFound`] if `key_id` is unknown.
    async fn rotate(&self, key_id: &str) -> Result<KeyReference>;

    /// Disable `key_id`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::KeyNotFound`] if `key_id` is unknown.
    async fn disable(&self, key_id: &str) -> Result<()>;
}
