//! # `did:key` driver
//!
//! Entirely stateless: the key material is encoded in the identifier itself,
//! so resolution never touches the network (spec §4.4.2).

use super::{
    DidDocument, DidDriver, DidResolutionError, DocumentMetadata, ResolutionOptions,
    ResolutionResult, VerificationMethod,
};
use crate::multibase;

/// The `did:key` method driver.
#[derive(Default)]
pub struct KeyDriver;

impl KeyDriver {
    /// Construct a new driver. Stateless; cheap to create per call.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn build_document(did: &str) -> Result<DidDocument, String> {
        let suffix = did
            .strip_prefix("did:key:")
            .ok_or_else(|| "missing did:key: prefix".to_string())?;
        let (key_type, public_key) =
            multibase::decode_multikey(suffix).map_err(|e| e.to_string())?;
        let method_id = format!("{did}#{suffix}");
        let vm = VerificationMethod {
            id: method_id.clone(),
            type_: key_type.verification_method_type().to_string(),
            controller: did.to_string(),
            public_key_multibase: Some(suffix.to_string()),
            public_key_jwk: None,
            public_key_hex: None,
        };
        // `public_key` is decoded only to validate the multicodec payload
        // length matches the key type; the document encodes the key back in
        // its original multibase form.
        let _ = public_key;
        Ok(DidDocument {
            id: did.to_string(),
            context: vec!["https://www.w3.org/ns/did/v1".to_string()],
            verification_method: vec![vm],
            authentication: vec![method_id.clone()],
            assertion_method: vec![method_id],
            service: vec![],
        })
    }
}

#[async_trait::async_trait]
impl DidDriver for KeyDriver {
    fn method(&self) -> &'static str {
        "key"
    }

    async fn resolve(&self, did: &str, _options: &ResolutionOptions) -> ResolutionResult {
        match Self::build_document(did) {
            Ok(document) => ResolutionResult::ok(document, DocumentMetadata::default()),
            Err(message) => ResolutionResult::error(DidResolutionError::InvalidDid, message),
        }
    }
}
