//! # Revocation Manager (C8)
//!
//! Owns the mutable state behind a `StatusList2021Credential`: the
//! bitstring itself, the next unallocated index, and the metadata needed
//! to (re)publish it as a signed VC (spec §4.8). Each list is guarded by
//! its own [`futures::lock::Mutex`] (an async-aware lock, so a slow KMS
//! call during `set_status` doesn't block other lists) rather than a
//! single lock over the whole manager, matching the "cross-list operations
//! are independent" ordering guarantee (spec §5).

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex};

use futures::lock::Mutex as AsyncMutex;
use serde_json::json;

use crate::audit::{AuditLog, Severity};
use crate::error::{Error, Result};
use crate::kms::{KeyManager, KeyReference};
use crate::resolver::UniversalResolver;
use crate::status::{Bitstring, StatusEntryType, StatusList2021Entry, StatusPurpose};
use crate::vc::verifier::{Clock, StatusListFetcher, VerifyOptions};
use crate::vc::{CredentialTemplate, VerifiableCredential, issuer};

/// The meaning of a set bit, resolved against a list's `status_purpose`
/// (spec §4.8 `check_status`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevocationStatus {
    /// Bit unset.
    Active,
    /// Bit set, `status_purpose = revocation`.
    Revoked,
    /// Bit set, `status_purpose = suspension`.
    Suspended,
}

struct ListState {
    issuer_did: String,
    credential_url: String,
    status_purpose: StatusPurpose,
    bitstring: Bitstring,
    next_index: usize,
}

/// Owns zero or more Status List 2021 bitstrings (spec §4.8).
pub struct RevocationManager {
    lists: SyncMutex<HashMap<String, Arc<AsyncMutex<ListState>>>>,
}

impl RevocationManager {
    /// An empty manager with no lists.
    #[must_use]
    pub fn new() -> Self {
        Self { lists: SyncMutex::new(HashMap::new()) }
    }

    fn list_handle(&self, list_id: &str) -> Option<Arc<AsyncMutex<ListState>>> {
        self.lists.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(list_id).cloned()
    }

    /// Create `list_id` if it doesn't already exist. `credential_url` is
    /// the URL the list's `StatusList2021Credential` will be published at
    /// and is what embedded entries reference. Idempotent: calling this
    /// again for an existing `list_id` is a no-op, even with different
    /// arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `length` fails
    /// [`Bitstring::new`]'s validation.
    pub fn initialize(
        &self, list_id: &str, issuer_did: &str, credential_url: &str, status_purpose: StatusPurpose, length: usize,
    ) -> Result<()> {
        let mut lists = self.lists.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if lists.contains_key(list_id) {
            return Ok(());
        }
        let state = ListState {
            issuer_did: issuer_did.to_string(),
            credential_url: credential_url.to_string(),
            status_purpose,
            bitstring: Bitstring::new(length)?,
            next_index: 0,
        };
        lists.insert(list_id.to_string(), Arc::new(AsyncMutex::new(state)));
        Ok(())
    }

    /// Atomically assign and return the next unused index as an embeddable
    /// [`StatusList2021Entry`] (spec §4.8 `allocate_index`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `list_id` was never initialized, or
    /// [`Error::ListExhausted`] once every index has been handed out.
    pub async fn allocate_index(&self, list_id: &str) -> Result<StatusList2021Entry> {
        let handle = self.list_handle(list_id).ok_or_else(|| Error::NotFound {
            message: format!("status list {list_id} not initialized"),
        })?;
        let mut state = handle.lock().await;
        if state.next_index == state.bitstring.len() {
            return Err(Error::ListExhausted { list_id: list_id.to_string() });
        }
        let index = state.next_index;
        state.next_index += 1;

        Ok(StatusList2021Entry {
            id: format!("{}#{}", state.credential_url, index),
            type_: StatusEntryType::StatusList2021Entry,
            status_purpose: state.status_purpose,
            status_list_index: index.to_string(),
            status_list_credential: state.credential_url.clone(),
        })
    }

    /// Set bit `index` to `value`, recording `actor` as responsible and
    /// appending an audit entry (spec §4.8 `set_status`). A write that
    /// doesn't change the bit is idempotent and emits no audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `list_id` is unknown, or
    /// [`Error::InvalidInput`] if `index` is out of range. Propagates any
    /// error from the audit log's KMS signing call.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_status(
        &self, list_id: &str, index: usize, value: bool, actor: &str, audit_log: &AuditLog,
        audit_key: &KeyReference, kms: &dyn KeyManager,
    ) -> Result<()> {
        let handle = self.list_handle(list_id).ok_or_else(|| Error::NotFound {
            message: format!("status list {list_id} not initialized"),
        })?;

        let changed = {
            let mut state = handle.lock().await;
            let previous = state.bitstring.get(index)?;
            if previous == value {
                false
            } else {
                state.bitstring.set(index, value)?;
                true
            }
        };

        if !changed {
            tracing::debug!(list_id, index, value, "set_status no-op, value unchanged");
            return Ok(());
        }
        tracing::info!(list_id, index, value, "revocation status changed");

        audit_log
            .append(
                actor,
                "status.set",
                Severity::Info,
                &json!({"list_id": list_id, "index": index, "value": value}),
                audit_key,
                kms,
            )
            .await?;
        Ok(())
    }

    /// Read the status of `index` in `list_id` (spec §4.8 `check_status`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `list_id` is unknown, or
    /// [`Error::InvalidInput`] if `index` is out of range.
    pub async fn check_status(&self, list_id: &str, index: usize) -> Result<RevocationStatus> {
        let handle = self.list_handle(list_id).ok_or_else(|| Error::NotFound {
            message: format!("status list {list_id} not initialized"),
        })?;
        let state = handle.lock().await;
        let bit = state.bitstring.get(index)?;
        let status = resolve_status(bit, state.status_purpose);
        tracing::trace!(list_id, index, ?status, "checked revocation status");
        Ok(status)
    }

    /// Build and sign a `StatusList2021Credential` carrying the list's
    /// current bitstring (spec §4.8 `generate_credential`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `list_id` is unknown, or any error
    /// from [`issuer::issue`].
    pub async fn generate_credential(
        &self, list_id: &str, key_fragment: &str, key_ref: &KeyReference, kms: &dyn KeyManager,
    ) -> Result<VerifiableCredential> {
        let handle = self.list_handle(list_id).ok_or_else(|| Error::NotFound {
            message: format!("status list {list_id} not initialized"),
        })?;
        let (issuer_did, credential_url, status_purpose, encoded_list) = {
            let state = handle.lock().await;
            (
                state.issuer_did.clone(),
                state.credential_url.clone(),
                state.status_purpose,
                state.bitstring.encode()?,
            )
        };

        let template = CredentialTemplate {
            id: Some(credential_url.clone()),
            extra_types: vec!["StatusList2021Credential".to_string()],
            credential_subject: json!({
                "id": credential_url,
                "type": "StatusList2021",
                "statusPurpose": status_purpose,
                "encodedList": encoded_list,
            }),
            ..Default::default()
        };

        issuer::issue(template, &issuer_did, key_fragment, key_ref, kms).await
    }

    /// Fetch `entry.status_list_credential`, verify it as a VC, confirm its
    /// id matches the entry's expectation, and read the referenced bit
    /// (spec §4.8 `verify_remote`). Deliberately fetches the whole list
    /// rather than a single index: the privacy property of Status List
    /// 2021 requires the publisher be unable to tell which index a
    /// verifier cared about.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the fetched credential's `id` doesn't
    /// match `entry.status_list_credential`, [`Error::BadSignature`] if the
    /// credential fails VC verification, or any error the fetcher produces.
    pub async fn verify_remote(
        entry: &StatusList2021Entry, resolver: &UniversalResolver, fetcher: &dyn StatusListFetcher, clock: &dyn Clock,
    ) -> Result<RevocationStatus> {
        let status_vc = fetcher.fetch(&entry.status_list_credential).await?;
        if status_vc.id.as_deref() != Some(entry.status_list_credential.as_str()) {
            return Err(Error::NotFound {
                message: format!(
                    "fetched status list credential id does not match {}",
                    entry.status_list_credential
                ),
            });
        }

        let verification = crate::vc::verifier::verify(&status_vc, resolver, clock, None, VerifyOptions::default()).await;
        if !verification.valid {
            return Err(Error::BadSignature);
        }

        let encoded_list = status_vc
            .credential_subject
            .get("encodedList")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidInput { message: "status list credential missing encodedList".to_string() })?;
        let bitstring = Bitstring::decode(encoded_list)?;
        let index = entry.index()?;
        let bit = bitstring.get(index)?;
        let status = resolve_status(bit, entry.status_purpose);
        tracing::debug!(status_list_credential = %entry.status_list_credential, index, ?status, "checked remote revocation status");
        Ok(status)
    }
}

fn resolve_status(bit: bool, purpose: StatusPurpose) -> RevocationStatus {
    if !bit {
        return RevocationStatus::Active;
    }
    match purpose {
        StatusPurpose::Revocation => RevocationStatus::Revoked,
        StatusPurpose::Suspension => RevocationStatus::Suspended,
    }
}

impl Default for RevocationManager {
    fn default() -> Self {
        Self::new()
    }
}
