//! # Hash-Chained Audit Log (C9)
//!
//! An append-only, single-writer log where each entry's signature covers
//! its own fields plus the hash of the previous entry's signed preimage, so
//! tampering with any entry breaks every later link (spec §4.9). Appends
//! are serialized behind one [`std::sync::Mutex`]; readers take a snapshot
//! and never block the writer (spec §5 lock ordering: cache-slot → KMS →
//! audit-append is irrelevant here since the log is the innermost lock).

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{self, Algorithm};
use crate::error::{Error, Result};
use crate::kms::{KeyManager, KeyReference};

/// How serious an audited event is. Informational only; does not affect
/// chain verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine, expected event.
    Info,
    /// Noteworthy but not itself a failure.
    Warning,
    /// Requires operator attention.
    Critical,
}

/// One link in the chain (spec §3 Glossary `AuditEntry`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Globally unique entry id, independent of `sequence`.
    pub id: Uuid,
    /// Monotonic, strictly increasing by 1 from the log's first entry.
    pub sequence: u64,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// DID of the actor responsible for the audited event.
    pub actor: String,
    /// Free-form event discriminant, e.g. `"credential.issued"`.
    pub event_type: String,
    /// Event severity.
    pub severity: Severity,
    /// SHA-256 of the canonicalized payload, hex-encoded.
    pub payload_hash: String,
    /// SHA-256 of the previous entry's `signed_preimage`, hex-encoded.
    /// 32 zero bytes (`"00" * 32`) for the genesis entry.
    pub prev_hash: String,
    /// Signature over `signed_preimage()` under `key_id`.
    pub signature: Vec<u8>,
    /// The KMS key id the signature verifies under.
    pub key_id: String,
    /// Algorithm `key_id` is bound to, so `verify_chain` can re-derive the
    /// signing message without a side channel back to the key reference.
    pub algorithm: Algorithm,
}

const GENESIS_PREV_HASH: [u8; 32] = [0u8; 32];

impl AuditEntry {
    /// `sequence_be_u64 || timestamp_rfc3339 || actor || event_type ||
    /// payload_hash || prev_hash` (spec §4.9 step 3), the bytes both signed
    /// at append time and re-verified by [`AuditLog::verify_chain`].
    #[must_use]
    pub fn signed_preimage(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(self.timestamp.to_rfc3339().as_bytes());
        buf.extend_from_slice(self.actor.as_bytes());
        buf.extend_from_slice(self.event_type.as_bytes());
        buf.extend_from_slice(self.payload_hash.as_bytes());
        buf.extend_from_slice(self.prev_hash.as_bytes());
        buf
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Message actually signed/verified for a given algorithm: secp256k1 keys
/// sign a SHA-256 prehash of the preimage, Ed25519 keys sign it directly
/// (spec §4.1, matching the convention used throughout C6/C8).
fn signing_message(algorithm: Algorithm, preimage: &[u8]) -> Vec<u8> {
    match algorithm {
        Algorithm::Secp256k1 => crypto::sha256(preimage).to_vec(),
        Algorithm::Ed25519 => preimage.to_vec(),
    }
}

struct LogState {
    entries: Vec<AuditEntry>,
}

/// An append-only, hash-chained audit log (spec §4.9).
pub struct AuditLog {
    state: Mutex<LogState>,
}

impl AuditLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(LogState { entries: Vec::new() }) }
    }

    /// Rehydrate a log from previously persisted entries (e.g. read back
    /// from disk), without re-validating them. A host calls [`Self::verify_chain`]
    /// immediately afterward to detect out-of-band tampering — this
    /// constructor does no checking itself so that a broken chain can still
    /// be loaded and diagnosed rather than rejected at load time.
    #[must_use]
    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        Self { state: Mutex::new(LogState { entries }) }
    }

    /// Append a new entry signed under `key_ref` (spec §4.9 steps 1-5).
    /// `payload` is canonicalized and hashed, never stored verbatim — the
    /// log only ever commits to its hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalization`] if `payload` cannot be
    /// canonicalized, or any error the underlying [`KeyManager::sign`] call
    /// produces.
    pub async fn append(
        &self, actor: impl Into<String>, event_type: impl Into<String>, severity: Severity,
        payload: &serde_json::Value, key_ref: &KeyReference, kms: &dyn KeyManager,
    ) -> Result<AuditEntry> {
        let payload_hash = hex_encode(&crypto::sha256(&crate::canon::canonicalize(payload)?));

        // Hold the lock only long enough to read the tail and reserve the
        // next sequence number; the KMS call happens outside it so a slow
        // signer cannot stall concurrent readers or the next writer's
        // sequence allocation longer than necessary.
        let (sequence, prev_hash) = {
            let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            match state.entries.last() {
                Some(last) => (last.sequence + 1, hex_encode(&crypto::sha256(&last.signed_preimage()))),
                None => (1, hex_encode(&GENESIS_PREV_HASH)),
            }
        };

        let mut entry = AuditEntry {
            id: Uuid::new_v4(),
            sequence,
            timestamp: Utc::now(),
            actor: actor.into(),
            event_type: event_type.into(),
            severity,
            payload_hash,
            prev_hash,
            signature: Vec::new(),
            key_id: key_ref.key_id.clone(),
            algorithm: key_ref.algorithm,
        };

        let message = signing_message(key_ref.algorithm, &entry.signed_preimage());
        entry.signature = kms.sign(&key_ref.key_id, &message).await?;

        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(last) = state.entries.last() {
            if last.sequence + 1 != entry.sequence {
                // Another append raced us between the read above and this
                // write; re-derive against the now-current tail rather than
                // silently corrupting the chain.
                return Err(Error::internal("audit log sequence race detected"));
            }
        }
        state.entries.push(entry.clone());
        tracing::debug!(sequence = entry.sequence, actor = %entry.actor, event_type = %entry.event_type, ?severity, "appended audit entry");
        Ok(entry)
    }

    /// A snapshot of every entry currently in the log, in ascending
    /// sequence order.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).entries.clone()
    }

    /// Verify the chain from `start_sequence` to `end_sequence` inclusive
    /// (spec §4.9 "Verify chain"). Recomputes each entry's preimage, checks
    /// its signature under its own `key_id`, and checks `prev_hash` against
    /// the previous entry's computed preimage hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChainBroken`] naming the first sequence whose
    /// signature, linkage, or contiguity check fails. Returns
    /// [`Error::NotFound`] if `start_sequence` is absent from the log.
    pub async fn verify_chain(&self, start_sequence: u64, end_sequence: u64, kms: &dyn KeyManager) -> Result<()> {
        let entries = self.entries();
        let Some(start_idx) = entries.iter().position(|e| e.sequence == start_sequence) else {
            return Err(Error::NotFound { message: format!("no entry at sequence {start_sequence}") });
        };

        let mut expected_prev_hash = if start_sequence == 1 {
            hex_encode(&GENESIS_PREV_HASH)
        } else {
            let Some(previous) = entries.iter().find(|e| e.sequence == start_sequence - 1) else {
                return Err(Error::ChainBroken { first_broken_sequence: start_sequence });
            };
            hex_encode(&crypto::sha256(&previous.signed_preimage()))
        };

        let mut expected_sequence = start_sequence;
        for entry in entries[start_idx..].iter().take_while(|e| e.sequence <= end_sequence) {
            if entry.sequence != expected_sequence {
                tracing::warn!(sequence = expected_sequence, "audit chain sequence gap");
                return Err(Error::ChainBroken { first_broken_sequence: expected_sequence });
            }
            if entry.prev_hash != expected_prev_hash {
                tracing::warn!(sequence = entry.sequence, "audit chain prev_hash mismatch");
                return Err(Error::ChainBroken { first_broken_sequence: entry.sequence });
            }

            let public_key = match kms.public_key(&entry.key_id).await {
                Ok(key) => key,
                Err(_) => return Err(Error::ChainBroken { first_broken_sequence: entry.sequence }),
            };
            let message = signing_message(entry.algorithm, &entry.signed_preimage());
            match crypto::verify(entry.algorithm, &public_key, &message, &entry.signature) {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    tracing::warn!(sequence = entry.sequence, "audit chain signature verification failed");
                    return Err(Error::ChainBroken { first_broken_sequence: entry.sequence });
                }
            }

            expected_prev_hash = hex_encode(&crypto::sha256(&entry.signed_preimage()));
            expected_sequence += 1;
        }

        tracing::debug!(start_sequence, end_sequence, "audit chain verified");
        Ok(())
    }

    /// Query entries matching every `Some` field of `query`, in ascending
    /// sequence order (spec §4.9 "Query").
    #[must_use]
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| query.actor.as_deref().is_none_or(|a| a == entry.actor))
            .filter(|entry| query.event_type.as_deref().is_none_or(|t| t == entry.event_type))
            .filter(|entry| query.severity.is_none_or(|s| s == entry.severity))
            .filter(|entry| {
                query.time_range.is_none_or(|(start, end)| entry.timestamp >= start && entry.timestamp <= end)
            })
            .filter(|entry| {
                query.sequence_range.is_none_or(|(start, end)| entry.sequence >= start && entry.sequence <= end)
            })
            .collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter for [`AuditLog::query`]. Every `Some` field narrows the result;
/// `None` fields are unconstrained.
#[derive(Clone, Debug, Default)]
pub struct AuditQuery {
    /// Restrict to entries with this `actor`.
    pub actor: Option<String>,
    /// Restrict to entries with this `event_type`.
    pub event_type: Option<String>,
    /// Restrict to entries with this `severity`.
    pub severity: Option<Severity>,
    /// Restrict to entries with `start <= timestamp <= end`.
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Restrict to entries with `start <= sequence <= end`.
    pub sequence_range: Option<(u64, u64)>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::crypto::Algorithm as Alg;
    use crate::kms::KeyPurpose;
    use crate::kms::local::LocalKms;

    async fn signed_log(kms: &LocalKms, key_ref: &KeyReference, count: u64) -> AuditLog {
        let log = AuditLog::new();
        for i in 0..count {
            log.append(
                "did:key:zIssuer",
                "credential.issued",
                Severity::Info,
                &json!({"index": i}),
                key_ref,
                kms,
            )
            .await
            .unwrap();
        }
        log
    }

    #[tokio::test]
    async fn appends_form_a_contiguous_chain() {
        let kms = LocalKms::from_passphrase(b"audit test passphrase");
        let key_ref = kms.generate(Alg::Ed25519, KeyPurpose::AuditSigning).await.unwrap();
        let log = signed_log(&kms, &key_ref, 5).await;

        let entries = log.entries();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.sequence, i as u64 + 1);
        }
        assert_eq!(entries[0].prev_hash, hex_encode(&GENESIS_PREV_HASH));
        assert_eq!(entries[1].prev_hash, hex_encode(&crypto::sha256(&entries[0].signed_preimage())));
    }

    #[tokio::test]
    async fn verify_chain_succeeds_over_1000_entries() {
        let kms = LocalKms::from_passphrase(b"audit test passphrase 2");
        let key_ref = kms.generate(Alg::Ed25519, KeyPurpose::AuditSigning).await.unwrap();
        let log = signed_log(&kms, &key_ref, 1000).await;

        log.verify_chain(1, 1000, &kms).await.unwrap();
    }

    #[tokio::test]
    async fn tampering_with_entry_500_breaks_the_chain_from_there() {
        let kms = LocalKms::from_passphrase(b"audit test passphrase 3");
        let key_ref = kms.generate(Alg::Ed25519, KeyPurpose::AuditSigning).await.unwrap();
        let log = signed_log(&kms, &key_ref, 1000).await;

        {
            let mut state = log.state.lock().unwrap();
            state.entries[499].payload_hash = hex_encode(&crypto::sha256(b"tampered"));
        }

        let err = log.verify_chain(1, 1000, &kms).await.unwrap_err();
        match err {
            Error::ChainBroken { first_broken_sequence } => assert_eq!(first_broken_sequence, 500),
            other => panic!("expected ChainBroken, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_chain_rejects_unknown_start_sequence() {
        let kms = LocalKms::from_passphrase(b"audit test passphrase 4");
        let key_ref = kms.generate(Alg::Ed25519, KeyPurpose::AuditSigning).await.unwrap();
        let log = signed_log(&kms, &key_ref, 3).await;

        let err = log.verify_chain(99, 100, &kms).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn query_filters_by_actor_and_sequence_range() {
        let kms = LocalKms::from_passphrase(b"audit test passphrase 5");
        let key_ref = kms.generate(Alg::Ed25519, KeyPurpose::AuditSigning).await.unwrap();
        let log = AuditLog::new();
        for actor in ["did:key:zA", "did:key:zB", "did:key:zA"] {
            log.append(actor, "credential.issued", Severity::Info, &json!({}), &key_ref, &kms).await.unwrap();
        }

        let results = log.query(&AuditQuery { actor: Some("did:key:zA".to_string()), ..Default::default() });
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sequence, 1);
        assert_eq!(results[1].sequence, 3);

        let ranged = log.query(&AuditQuery { sequence_range: Some((2, 3)), ..Default::default() });
        assert_eq!(ranged.len(), 2);
    }
}
