//! # Verifiable Credential data model (C6)
//!
//! A deliberately closed model: `issuer` is either a bare DID string or an
//! object carrying `id` (spec §3), `proof.type` is one of the three
//! supported cryptosuites, and unknown `credentialSubject` fields pass
//! through as an opaque JSON bag rather than being typed field-by-field
//! (spec §9: "escape-hatch extension bag").

pub mod issuer;
pub mod verifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::StatusList2021Entry;

/// The base `@context` entry every credential must start with (spec §4.6
/// step 1).
pub const BASE_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// `issuer` is either a bare DID string or an object carrying at least
/// `id` (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Issuer {
    /// `"issuer": "did:example:123"`.
    Did(String),
    /// `"issuer": {"id": "did:example:123", ...}`.
    Object {
        /// The issuer's DID.
        id: String,
        /// Any additional issuer metadata, preserved opaquely.
        #[serde(flatten)]
        extra: serde_json::Map<String, serde_json::Value>,
    },
}

impl Issuer {
    /// The issuer DID, regardless of which shape was used.
    #[must_use]
    pub fn did(&self) -> &str {
        match self {
            Self::Did(did) => did,
            Self::Object { id, .. } => id,
        }
    }
}

/// Supported proof cryptosuites (spec §3). `JsonWebSignature2020` is
/// explicitly out of scope (spec §4.6 ties and edge cases).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofType {
    /// Ed25519 over the 2020 cryptosuite.
    Ed25519Signature2020,
    /// Ed25519 over the legacy 2018 cryptosuite (same signing algorithm,
    /// different suite identifier for interop with older issuers).
    Ed25519Signature2018,
    /// secp256k1 ECDSA, SHA-256 prehash, low-s normalized.
    EcdsaSecp256k1Signature2019,
}

impl ProofType {
    /// The signature algorithm this proof type is backed by.
    #[must_use]
    pub const fn algorithm(self) -> crate::crypto::Algorithm {
        match self {
            Self::Ed25519Signature2020 | Self::Ed25519Signature2018 => crate::crypto::Algorithm::Ed25519,
            Self::EcdsaSecp256k1Signature2019 => crate::crypto::Algorithm::Secp256k1,
        }
    }
}

/// A Data Integrity-style proof attached to a credential (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proof {
    /// The cryptosuite used.
    #[serde(rename = "type")]
    pub type_: ProofType,
    /// When the proof was created; equals the credential's `issuanceDate`
    /// at issuance time (spec §4.6 step 2).
    pub created: DateTime<Utc>,
    /// `{issuer_did}#{key_fragment}`, the verification method that produced
    /// this proof.
    pub verification_method: String,
    /// Always `"assertionMethod"` for credentials this crate issues.
    pub proof_purpose: String,
    /// Multibase-encoded (`z`-prefixed base58btc) signature bytes. Absent
    /// on the proof-skeleton used as the signing input (spec §4.6 step 2-3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_value: Option<String>,
}

/// A Verifiable Credential (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifiableCredential {
    /// `@context`, order-preserving; must start with [`BASE_CONTEXT`].
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    /// Credential id, typically a URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `type`, must include `"VerifiableCredential"`.
    #[serde(rename = "type")]
    pub type_: Vec<String>,
    /// The issuer.
    pub issuer: Issuer,
    /// RFC 3339 issuance timestamp.
    pub issuance_date: DateTime<Utc>,
    /// Optional RFC 3339 expiration timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Non-standard extension some issuers set; this crate treats an
    /// unrecognized field as data, never failing on its presence (spec §9
    /// Open Question 2), but will enforce it when
    /// [`crate::vc::verifier::VerifyOptions::enforce_not_before`] is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    /// Subject claims. An open JSON object; `id` is optional within it.
    pub credential_subject: serde_json::Value,
    /// Optional status list reference (spec §4.8).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_status: Option<StatusList2021Entry>,
    /// The proof. `None` only on a template pre-issuance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

/// Unsigned credential inputs the issuer fills in (spec §4.6 step 1).
#[derive(Clone, Debug, Default)]
pub struct CredentialTemplate {
    /// Additional `@context` entries appended after [`BASE_CONTEXT`].
    pub extra_context: Vec<String>,
    /// Credential id.
    pub id: Option<String>,
    /// Additional `type` entries appended after `"VerifiableCredential"`.
    pub extra_types: Vec<String>,
    /// Optional expiration.
    pub expiration_date: Option<DateTime<Utc>>,
    /// Optional `notBefore`.
    pub not_before: Option<DateTime<Utc>>,
    /// Subject claims.
    pub credential_subject: serde_json::Value,
    /// Optional status list reference.
    pub credential_status: Option<StatusList2021Entry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_did_reads_through_both_shapes() {
        assert_eq!(Issuer::Did("did:example:1".into()).did(), "did:example:1");
        let object = Issuer::Object { id: "did:example:2".into(), extra: serde_json::Map::new() };
        assert_eq!(object.did(), "did:example:2");
    }

    #[test]
    fn proof_type_maps_to_algorithm() {
        assert_eq!(ProofType::Ed25519Signature2020.algorithm(), crate::crypto::Algorithm::Ed25519);
        assert_eq!(ProofType::EcdsaSecp256k1Signature2019.algorithm(), crate::crypto::Algorithm::Secp256k1);
    }
}
