//! # DID Method Drivers (C4)
//!
//! Each driver maps a DID string to a [`ResolutionResult`] envelope. Drivers
//! never talk to the network or chain directly for default data; they take
//! injected collaborators (`HttpFetch`, `ChainReader`, `SidetreeClient`) so
//! the transport stays a host decision (spec §1 Non-goals).

pub mod ethr;
pub mod http;
pub mod ion;
pub mod key;
pub mod web;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A DID Document (spec §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DidDocument {
    /// The DID this document describes.
    pub id: String,
    /// `@context`, preserved in issuer-declared order.
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    /// Ordered sequence of key descriptors.
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
    /// `authentication` verificationMethod references (ids).
    #[serde(default)]
    pub authentication: Vec<String>,
    /// `assertionMethod` verificationMethod references (ids).
    #[serde(default)]
    pub assertion_method: Vec<String>,
    /// Optional service endpoints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<Service>,
}

impl DidDocument {
    /// Validate the invariant from spec §3: every `authentication` /
    /// `assertionMethod` reference resolves to a local `verificationMethod.id`.
    #[must_use]
    pub fn references_are_local(&self) -> bool {
        let ids: BTreeSet<&str> = self.verification_method.iter().map(|vm| vm.id.as_str()).collect();
        self.authentication.iter().all(|r| ids.contains(r.as_str()))
            && self.assertion_method.iter().all(|r| ids.contains(r.as_str()))
    }

    /// Find a verification method by id, first match in document order
    /// (spec §4.6 tie-break rule).
    #[must_use]
    pub fn verification_method(&self, id: &str) -> Option<&VerificationMethod> {
        self.verification_method.iter().find(|vm| vm.id == id)
    }

    /// Whether `method_id` is listed in `assertionMethod`.
    #[must_use]
    pub fn is_assertion_method(&self, method_id: &str) -> bool {
        self.assertion_method.iter().any(|r| r == method_id)
    }
}

/// One key descriptor inside a DID Document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// The method's own id, usually `{did}#{fragment}`.
    pub id: String,
    /// Cryptosuite/key type, e.g. `Ed25519VerificationKey2020`.
    #[serde(rename = "type")]
    pub type_: String,
    /// The DID that controls this key.
    pub controller: String,
    /// Multibase-encoded public key, if this is how the key is encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
    /// JWK-encoded public key, if this is how the key is encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<serde_json::Value>,
    /// Hex-encoded public key, if this is how the key is encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
}

/// A service endpoint entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Service {
    /// Service id.
    pub id: String,
    /// Service type.
    #[serde(rename = "type")]
    pub type_: String,
    /// Service endpoint URL.
    pub service_endpoint: String,
}

/// Closed error taxonomy for `did_resolution_metadata.error` (spec §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DidResolutionError {
    /// DID is not even syntactically valid, or the resolved document's
    /// `id` did not match the input DID.
    InvalidDid,
    /// The DID does not resolve to a document (404, no on-chain entry with
    /// no implicit key available, etc).
    NotFound,
    /// No driver is registered for the DID's method.
    MethodNotSupported,
    /// Transient I/O failure distinct from "not found" (5xx, connection
    /// refused, chain RPC failure).
    NetworkError,
    /// The requested `accept` media type cannot be produced.
    RepresentationNotSupported,
    /// Unexpected invariant violation inside a driver.
    InternalError,
}

/// Resolution metadata accompanying a [`ResolutionResult`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResolutionMetadata {
    /// Media type of `did_document`, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Error kind, when resolution did not produce a document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DidResolutionError>,
    /// Human-readable detail accompanying `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Document metadata accompanying a [`ResolutionResult`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// When the document was first created, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<chrono::DateTime<chrono::Utc>>,
    /// When the document was last updated, if known. The resolver cache
    /// (C5) uses this to derive a positive-entry TTL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<chrono::DateTime<chrono::Utc>>,
    /// Whether the subject has explicitly deactivated this DID.
    #[serde(default)]
    pub deactivated: bool,
}

/// The uniform envelope every driver (and the resolver) returns (spec §4.4).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// The resolved document, or `None` on error.
    pub did_document: Option<DidDocument>,
    /// Resolution-level metadata (content type / error).
    pub did_resolution_metadata: ResolutionMetadata,
    /// Document-level metadata (timestamps / deactivation).
    pub did_document_metadata: DocumentMetadata,
}

impl ResolutionResult {
    /// Build a failed result carrying `error` and `message`.
    #[must_use]
    pub fn error(error: DidResolutionError, message: impl Into<String>) -> Self {
        Self {
            did_document: None,
            did_resolution_metadata: ResolutionMetadata {
                content_type: None,
                error: Some(error),
                message: Some(message.into()),
            },
            did_document_metadata: DocumentMetadata::default(),
        }
    }

    /// Build a successful result.
    #[must_use]
    pub fn ok(document: DidDocument, document_metadata: DocumentMetadata) -> Self {
        Self {
            did_document: Some(document),
            did_resolution_metadata: ResolutionMetadata {
                content_type: Some("application/did+json".to_string()),
                error: None,
                message: None,
            },
            did_document_metadata: document_metadata,
        }
    }

    /// Whether this result carries a usable document.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.did_document.is_some()
    }
}

/// Resolution input options (spec §6.3).
#[derive(Clone, Debug)]
pub struct ResolutionOptions {
    /// Requested representation media type.
    pub accept: String,
    /// Bypass the resolver's cache for this call only (does not invalidate
    /// the cache for other callers, spec §4.5 ordering guarantee).
    pub force_refresh: bool,
    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self { accept: "application/did+json".to_string(), force_refresh: false, timeout_ms: 5_000 }
    }
}

/// A DID method driver. Dispatched dynamically by method name, hence a
/// `dyn`-friendly trait object via `async_trait`.
#[async_trait::async_trait]
pub trait DidDriver: Send + Sync {
    /// The method name this driver handles, e.g. `"web"`.
    fn method(&self) -> &'static str;

    /// Resolve `did` to a [`ResolutionResult`]. Must never panic or let an
    /// exception escape — every failure mode maps to a
    /// [`DidResolutionError`] inside the returned envelope (spec §4.4).
    async fn resolve(&self, did: &str, options: &ResolutionOptions) -> ResolutionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_local_detects_dangling_reference() {
        let doc = DidDocument {
            id: "did:example:1".into(),
            authentication: vec!["did:example:1#missing".into()],
            ..Default::default()
        };
        assert!(!doc.references_are_local());
    }

    #[test]
    fn references_are_local_accepts_matching_reference() {
        let doc = DidDocument {
            id: "did:example:1".into(),
            verification_method: vec![VerificationMethod {
                id: "did:example:1#key-0".into(),
                type_: "Ed25519VerificationKey2020".into(),
                controller: "did:example:1".into(),
                public_key_multibase: Some("z123".into()),
                public_key_jwk: None,
                public_key_hex: None,
            }],
            authentication: vec!["did:example:1#key-0".into()],
            assertion_method: vec!["did:example:1#key-0".into()],
            ..Default::default()
        };
        assert!(doc.references_are_local());
    }
}
