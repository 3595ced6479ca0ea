//! # `did:ethr` driver
//!
//! Resolves against the ERC-1056 `EthereumDIDRegistry` contract. Chain
//! access is injected via [`ChainReader`] so this crate never depends on a
//! specific RPC client or wallet stack (spec §1 Non-goals: no blockchain
//! client bundled).

use super::{
    DidDocument, DidDriver, DidResolutionError, DocumentMetadata, ResolutionOptions,
    ResolutionResult, VerificationMethod,
};
use crate::error::Result;

/// One delegate key addition recovered from the registry's event log.
#[derive(Clone, Debug)]
pub struct DelegateEntry {
    /// The delegate's public key material, hex-encoded (`0x`-prefixed),
    /// uncompressed secp256k1 point.
    pub public_key_hex: String,
    /// Whether this delegate may sign assertions (credentials), not just
    /// authenticate.
    pub assertion: bool,
}

/// Injected capability for reading ERC-1056 registry state. Hosts implement
/// this over whatever RPC client/provider they already use.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// Fetch delegate key entries currently valid for `identity` (a
    /// lowercase `0x`-prefixed address) on `network`.
    ///
    /// # Errors
    ///
    /// Returns an error for any chain RPC failure; the driver maps this to
    /// [`DidResolutionError::NetworkError`].
    async fn delegates(&self, network: &str, identity: &str) -> Result<Vec<DelegateEntry>>;
}

/// The `did:ethr` method driver.
pub struct EthrDriver<C: ChainReader> {
    chain: C,
}

impl<C: ChainReader> EthrDriver<C> {
    /// Construct a driver over the given [`ChainReader`].
    #[must_use]
    pub const fn new(chain: C) -> Self {
        Self { chain }
    }

    /// Parse `did:ethr[:network]:0x...` into `(network, address)`, defaulting
    /// the network to `mainnet` when omitted.
    fn parse(did: &str) -> Result<(String, String), String> {
        let rest = did.strip_prefix("did:ethr:").ok_or_else(|| "missing did:ethr: prefix".to_string())?;
        let (network, address) = match rest.rsplit_once(':') {
            Some((network, address)) => (network.to_string(), address.to_string()),
            None => ("mainnet".to_string(), rest.to_string()),
        };
        if !address.starts_with("0x") || address.len() != 42 {
            return Err(format!("not a 20-byte hex address: {address}"));
        }
        if !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("not a 20-byte hex address: {address}"));
        }
        Ok((network, address.to_lowercase()))
    }
}

#[async_trait::async_trait]
impl<C: ChainReader + 'static> DidDriver for EthrDriver<C> {
    fn method(&self) -> &'static str {
        "ethr"
    }

    async fn resolve(&self, did: &str, _options: &ResolutionOptions) -> ResolutionResult {
        let (network, address) = match Self::parse(did) {
            Ok(parsed) => parsed,
            Err(message) => return ResolutionResult::error(DidResolutionError::InvalidDid, message),
        };

        let delegates = match self.chain.delegates(&network, &address).await {
            Ok(delegates) => delegates,
            Err(e) => return ResolutionResult::error(DidResolutionError::NetworkError, e.to_string()),
        };

        let mut verification_method = Vec::new();
        let mut authentication = Vec::new();
        let mut assertion_method = Vec::new();

        // The implicit key derived from the address itself is always the
        // first verification method, controller-signed by construction
        // (spec §4.4.3). It is usable for both purposes until delegates
        // narrow assertion capability.
        let implicit_id = format!("{did}#controller");
        verification_method.push(VerificationMethod {
            id: implicit_id.clone(),
            type_: "EcdsaSecp256k1RecoveryMethod2020".to_string(),
            controller: did.to_string(),
            public_key_multibase: None,
            public_key_jwk: None,
            public_key_hex: Some(address.clone()),
        });
        authentication.push(implicit_id.clone());
        assertion_method.push(implicit_id);

        for (index, delegate) in delegates.iter().enumerate() {
            let id = format!("{did}#delegate-{index}");
            verification_method.push(VerificationMethod {
                id: id.clone(),
                type_: "EcdsaSecp256k1VerificationKey2019".to_string(),
                controller: did.to_string(),
                public_key_multibase: None,
                public_key_jwk: None,
                public_key_hex: Some(delegate.public_key_hex.clone()),
            });
            authentication.push(id.clone());
            if delegate.assertion {
                assertion_method.push(id);
            }
        }

        let document = DidDocument {
            id: did.to_string(),
            context: vec!["https://www.w3.org/ns/did/v1".to_string()],
            verification_method,
            authentication,
            assertion_method,
            service: vec![],
        };
        ResolutionResult::ok(document, DocumentMetadata::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct StubChain {
        delegates: Vec<DelegateEntry>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ChainReader for StubChain {
        async fn delegates(&self, _network: &str, _identity: &str) -> Result<Vec<DelegateEntry>> {
            if self.fail {
                Err(Error::NetworkError { message: "rpc timeout".into(), cause: None })
            } else {
                Ok(self.delegates.clone())
            }
        }
    }

    #[test]
    fn parses_default_network() {
        let (network, address) = EthrDriver::<StubChain>::parse(
            "did:ethr:0x1234567890123456789012345678901234567890",
        )
        .unwrap();
        assert_eq!(network, "mainnet");
        assert_eq!(address, "0x1234567890123456789012345678901234567890");
    }

    #[test]
    fn parses_explicit_network() {
        let (network, _) = EthrDriver::<StubChain>::parse(
            "did:ethr:sepolia:0x1234567890123456789012345678901234567890",
        )
        .unwrap();
        assert_eq!(network, "sepolia");
    }

    #[test]
    fn rejects_malformed_address() {
        assert!(EthrDriver::<StubChain>::parse("did:ethr:0xnothex").is_err());
    }

    #[tokio::test]
    async fn resolves_implicit_key_with_no_delegates() {
        let driver = EthrDriver::new(StubChain { delegates: vec![], fail: false });
        let did = "did:ethr:0x1234567890123456789012345678901234567890";
        let result = driver.resolve(did, &ResolutionOptions::default()).await;
        assert!(result.is_ok());
        let doc = result.did_document.unwrap();
        assert_eq!(doc.verification_method.len(), 1);
        assert!(doc.references_are_local());
    }

    #[tokio::test]
    async fn includes_assertion_delegates_only_when_flagged() {
        let driver = EthrDriver::new(StubChain {
            delegates: vec![
                DelegateEntry { public_key_hex: "0xaa".into(), assertion: true },
                DelegateEntry { public_key_hex: "0xbb".into(), assertion: false },
            ],
            fail: false,
        });
        let did = "did:ethr:0x1234567890123456789012345678901234567890";
        let result = driver.resolve(did, &ResolutionOptions::default()).await;
        let doc = result.did_document.unwrap();
        assert_eq!(doc.verification_method.len(), 3);
        assert_eq!(doc.assertion_method.len(), 2);
        assert_eq!(doc.authentication.len(), 3);
    }

    #[tokio::test]
    async fn chain_failure_maps_to_network_error() {
        let driver = EthrDriver::new(StubChain { delegates: vec![], fail: true });
        let did = "did:ethr:0x1234567890123456789012345678901234567890";
        let result = driver.resolve(did, &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::NetworkError));
    }
}
