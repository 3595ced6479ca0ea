//! # AWS KMS backend (feature `aws-kms`)
//!
//! Identifies keys by their native ARN; the backend stores the mapping
//! `key_id -> arn` (spec §6.4) so the rest of the core only ever sees the
//! opaque `key_id`. Secret bytes never cross into process memory — signing
//! and public-key retrieval are both native KMS API calls.

use std::collections::HashMap;
use std::sync::RwLock;

use aws_sdk_kms::Client;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::{KeySpec, MessageType, SigningAlgorithmSpec};

use super::{KeyManager, KeyPurpose, KeyReference, KeyStatus};
use crate::crypto::Algorithm;
use crate::error::{Error, Result};

/// A KMS backend delegating to AWS KMS. `key_id -> native ARN` is cached
/// after `generate`/first use; AWS KMS itself remains the source of truth
/// for key material and lifecycle.
pub struct AwsKms {
    client: Client,
    native_ids: RwLock<HashMap<String, String>>,
}

impl AwsKms {
    /// Construct a backend from an already-configured AWS SDK client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client, native_ids: RwLock::new(HashMap::new()) }
    }

    fn native_id(&self, key_id: &str) -> Result<String> {
        self.native_ids
            .read()
            .map_err(|_| Error::internal("AWS KMS id map lock poisoned"))?
            .get(key_id)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound { key_id: key_id.to_string() })
    }

    fn key_spec(algorithm: Algorithm) -> Result<KeySpec> {
        match algorithm {
            // AWS KMS does not support asymmetric Ed25519 signing keys.
            Algorithm::Ed25519 => Err(Error::KmsUnavailable {
                message: "AWS KMS backend does not support Ed25519; use secp256k1 or the local backend".into(),
            }),
            Algorithm::Secp256k1 => Ok(KeySpec::EccSecgP256K1),
        }
    }
}

#[async_trait::async_trait]
impl KeyManager for AwsKms {
    async fn generate(&self, algorithm: Algorithm, purpose: KeyPurpose) -> Result<KeyReference> {
        let output = self
            .client
            .create_key()
            .key_spec(Self::key_spec(algorithm)?)
            .description(format!("trust-protocol-core:{purpose:?}"))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(?algorithm, ?purpose, error = %e, "AWS KMS CreateKey failed");
                Error::KmsUnavailable { message: format!("CreateKey failed: {e}") }
            })?;
        let metadata = output
            .key_metadata()
            .ok_or_else(|| Error::KmsUnavailable { message: "CreateKey returned no metadata".into() })?;
        let arn = metadata.arn().unwrap_or_default().to_string();
        let key_id = format!("aws-{}", metadata.key_id());

        self.native_ids
            .write()
            .map_err(|_| Error::internal("AWS KMS id map lock poisoned"))?
            .insert(key_id.clone(), arn);

        tracing::info!(key_id = %key_id, ?algorithm, ?purpose, "generated AWS KMS key");
        Ok(KeyReference { key_id, algorithm, status: KeyStatus::Active })
    }

    async fn sign(&self, key_id: &str, message: &[u8]) -> Result<Vec<u8>> {
        let native_id = self.native_id(key_id)?;
        // This backend only issues secp256k1 keys (see `key_spec`), and
        // `message` already arrives as the SHA-256 digest of the signing
        // input (spec §4.1). `MessageType::Digest` tells AWS KMS to sign
        // that digest as-is; `Raw` would hash it again and produce a
        // non-interoperable signature.
        let output = self
            .client
            .sign()
            .key_id(native_id)
            .message(Blob::new(message.to_vec()))
            .message_type(MessageType::Digest)
            .signing_algorithm(SigningAlgorithmSpec::EcdsaSha256)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(key_id, error = %e, "AWS KMS Sign failed");
                Error::KmsUnavailable { message: format!("Sign failed: {e}") }
            })?;
        Ok(output.signature().map(|b| b.as_ref().to_vec()).unwrap_or_default())
    }

    async fn public_key(&self, key_id: &str) -> Result<Vec<u8>> {
        let native_id = self.native_id(key_id)?;
        let output = self
            .client
            .get_public_key()
            .key_id(native_id)
            .send()
            .await
            .map_err(|e| Error::KmsUnavailable { message: format!("GetPublicKey failed: {e}") })?;
        Ok(output.public_key().map(|b| b.as_ref().to_vec()).unwrap_or_default())
    }

    async fn rotate(&self, key_id: &str) -> Result<KeyReference> {
        let native_id = self.native_id(key_id)?;
        self.client
            .disable_key()
            .key_id(&native_id)
            .send()
            .await
            .map_err(|e| Error::KmsUnavailable { message: format!("DisableKey failed: {e}") })?;
        // AWS KMS has no native "rotate and keep old key verifiable"
        // primitive for asymmetric keys, so rotation here means: disable the
        // old key (still usable for GetPublicKey/verification) and create a
        // fresh one of the same spec, mirroring the local backend's contract.
        self.generate(Algorithm::Secp256k1, KeyPurpose::CredentialIssuance).await
    }

    async fn disable(&self, key_id: &str) -> Result<()> {
        let native_id = self.native_id(key_id)?;
        self.client
            .disable_key()
            .key_id(native_id)
            .send()
            .await
            .map_err(|e| Error::KmsUnavailable { message: format!("DisableKey failed: {e}") })?;
        Ok(())
    }
}
