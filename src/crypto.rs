//! # Signature algorithms and hashing primitives (C1)
//!
//! Ed25519 and secp256k1 sign/verify, SHA-256, and a timing-safe byte
//! comparison. Key material never lives here longer than a single call —
//! callers obtain signatures from the KMS (`crate::kms`) and pass public key
//! bytes in from a resolved DID Document.

use ed25519_dalek::Verifier as _;
use k256::ecdsa::signature::Verifier as _;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Signature algorithm used by a proof or a KMS key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Algorithm {
    /// Ed25519 (RFC 8032). 64-byte signatures, 32-byte public keys.
    Ed25519,
    /// secp256k1 ECDSA, low-s normalized. 64-byte `r||s` signatures,
    /// 33-byte compressed public keys.
    Secp256k1,
}

/// SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Constant-time equality check. Always inspects every byte of the longer
/// operand; never short-circuits on the first mismatch, so execution time
/// does not leak which byte differed.
#[must_use]
pub fn timing_safe_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        // Still walk `a` against itself so callers cannot distinguish a
        // length mismatch from a content mismatch by timing alone.
        let mut diff = 0u8;
        for byte in a {
            diff |= *byte;
        }
        let _ = diff;
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Verify a signature over `message` under `public_key_bytes` for the given
/// algorithm.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the public key or signature bytes are
/// the wrong length or otherwise malformed for the algorithm. Returns
/// `Ok(false)` (not an error) when the bytes are well-formed but the
/// signature does not verify.
pub fn verify(
    algorithm: Algorithm, public_key_bytes: &[u8], message: &[u8], signature_bytes: &[u8],
) -> Result<bool> {
    match algorithm {
        Algorithm::Ed25519 => verify_ed25519(public_key_bytes, message, signature_bytes),
        Algorithm::Secp256k1 => verify_secp256k1(public_key_bytes, message, signature_bytes),
    }
}

fn verify_ed25519(public_key_bytes: &[u8], message: &[u8], signature_bytes: &[u8]) -> Result<bool> {
    let key_bytes: [u8; 32] = public_key_bytes.try_into().map_err(|_| Error::InvalidInput {
        message: format!("ed25519 public key must be 32 bytes, got {}", public_key_bytes.len()),
    })?;
    let sig_bytes: [u8; 64] = signature_bytes.try_into().map_err(|_| Error::InvalidInput {
        message: format!("ed25519 signature must be 64 bytes, got {}", signature_bytes.len()),
    })?;
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| Error::InvalidInput { message: format!("malformed ed25519 key: {e}") })?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    Ok(verifying_key.verify(message, &signature).is_ok())
}

/// Verify a secp256k1 ECDSA signature. `message` is the final SHA-256
/// digest of the signing input, not the signing input itself — callers
/// hash once (spec §4.1) and every backend signs/verifies that digest
/// directly, matching how AWS KMS's `Digest` message type and GCP Cloud
/// KMS's `digest.sha256` field both expect a pre-hashed value. Hashing
/// again here would silently produce non-interoperable signatures.
///
/// Low-s normalization is enforced: a signature with a high-s value is
/// rejected as malleable rather than silently normalized and accepted
/// (spec §9 Open Question 3).
fn verify_secp256k1(
    public_key_bytes: &[u8], message: &[u8], signature_bytes: &[u8],
) -> Result<bool> {
    let verifying_key = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key_bytes)
        .map_err(|e| Error::InvalidInput { message: format!("malformed secp256k1 key: {e}") })?;
    if signature_bytes.len() != 64 {
        return Err(Error::InvalidInput {
            message: format!("secp256k1 signature must be 64 bytes, got {}", signature_bytes.len()),
        });
    }
    let signature = k256::ecdsa::Signature::from_slice(signature_bytes)
        .map_err(|e| Error::InvalidInput { message: format!("malformed secp256k1 signature: {e}") })?;
    if signature.normalize_s().is_some() {
        // `normalize_s` returns `Some` only when the input *was* high-s —
        // i.e. it needed normalizing. Reject rather than accept-and-fix.
        return Ok(false);
    }
    Ok(verifying_key.verify(message, &signature).is_ok())
}

/// Normalize a secp256k1 signature to low-s form, as required before
/// `Sign` (§4.1) hands signature bytes back to a caller.
#[must_use]
pub fn normalize_secp256k1_low_s(signature_bytes: &[u8; 64]) -> [u8; 64] {
    let Ok(sig) = k256::ecdsa::Signature::from_slice(signature_bytes) else {
        return *signature_bytes;
    };
    let normalized = sig.normalize_s().unwrap_or(sig);
    let mut out = [0u8; 64];
    out.copy_from_slice(&normalized.to_bytes());
    out
}
