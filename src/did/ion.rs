//! # `did:ion` driver
//!
//! ION is a Sidetree-based method with no single authoritative server;
//! resolution queries a configurable set of nodes in parallel and accepts
//! the first success (spec §4.4.4). A [`SidetreeClient`] is injected per
//! node so this crate carries no HTTP client opinion beyond what `did:web`
//! already needs.

use futures::future::join_all;

use super::{DidDriver, DidResolutionError, DocumentMetadata, ResolutionOptions, ResolutionResult};
use crate::error::{Error, Result};

/// Injected capability for querying one Sidetree node.
#[async_trait::async_trait]
pub trait SidetreeClient: Send + Sync {
    /// This client's node identifier, used only for diagnostics.
    fn node(&self) -> &str;

    /// Resolve `did` against this node's `/identifiers/{did}` endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if this node has no record of `did`, or
    /// any other error for a transport/node failure.
    async fn resolve(&self, did: &str) -> Result<ResolutionResult>;
}

/// The `did:ion` method driver, querying a fixed set of nodes.
pub struct IonDriver<C: SidetreeClient> {
    nodes: Vec<C>,
}

impl<C: SidetreeClient> IonDriver<C> {
    /// Construct a driver over `nodes`, queried in parallel on every
    /// resolution.
    #[must_use]
    pub fn new(nodes: Vec<C>) -> Self {
        Self { nodes }
    }
}

#[async_trait::async_trait]
impl<C: SidetreeClient + 'static> DidDriver for IonDriver<C> {
    fn method(&self) -> &'static str {
        "ion"
    }

    async fn resolve(&self, did: &str, _options: &ResolutionOptions) -> ResolutionResult {
        if self.nodes.is_empty() {
            return ResolutionResult::error(
                DidResolutionError::InternalError,
                "no Sidetree nodes configured".to_string(),
            );
        }

        let futures = self.nodes.iter().map(|node| node.resolve(did));
        let results = join_all(futures).await;

        // First successful response wins (spec §4.4.4); any node answering
        // `NotFound` does not by itself fail resolution if another node
        // succeeds, but if every node agrees the DID is absent, the overall
        // result is `notFound`. Only when every node reports a transport
        // failure (no node even knows whether the DID exists) does the
        // overall result become `networkError`.
        let mut saw_not_found = false;
        let mut last_network_message = None;

        for result in results {
            match result {
                Ok(resolution) => return resolution,
                Err(Error::NotFound { .. }) => saw_not_found = true,
                Err(e) => last_network_message = Some(e.to_string()),
            }
        }

        if saw_not_found {
            ResolutionResult::error(DidResolutionError::NotFound, "no node has a record for this DID")
        } else {
            ResolutionResult::error(
                DidResolutionError::NetworkError,
                last_network_message.unwrap_or_else(|| "all Sidetree nodes unreachable".to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::DidDocument;

    struct StubNode {
        name: &'static str,
        outcome: Result<ResolutionResult>,
    }

    #[async_trait::async_trait]
    impl SidetreeClient for StubNode {
        fn node(&self) -> &str {
            self.name
        }

        async fn resolve(&self, _did: &str) -> Result<ResolutionResult> {
            match &self.outcome {
                Ok(r) => Ok(ResolutionResult {
                    did_document: r.did_document.clone(),
                    did_resolution_metadata: r.did_resolution_metadata.clone(),
                    did_document_metadata: r.did_document_metadata.clone(),
                }),
                Err(Error::NotFound { message }) => Err(Error::NotFound { message: message.clone() }),
                Err(_) => Err(Error::NetworkError { message: "node unreachable".into(), cause: None }),
            }
        }
    }

    fn success_result(did: &str) -> ResolutionResult {
        ResolutionResult::ok(
            DidDocument { id: did.to_string(), ..Default::default() },
            DocumentMetadata::default(),
        )
    }

    #[tokio::test]
    async fn first_success_wins() {
        let driver = IonDriver::new(vec![
            StubNode { name: "a", outcome: Err(Error::NotFound { message: "absent".into() }) },
            StubNode { name: "b", outcome: Ok(success_result("did:ion:abc")) },
        ]);
        let result = driver.resolve("did:ion:abc", &ResolutionOptions::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn all_not_found_is_not_found() {
        let driver = IonDriver::new(vec![
            StubNode { name: "a", outcome: Err(Error::NotFound { message: "absent".into() }) },
            StubNode { name: "b", outcome: Err(Error::NotFound { message: "absent".into() }) },
        ]);
        let result = driver.resolve("did:ion:abc", &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::NotFound));
    }

    #[tokio::test]
    async fn all_network_failures_is_network_error() {
        let driver = IonDriver::new(vec![
            StubNode { name: "a", outcome: Err(Error::NetworkError { message: "timeout".into(), cause: None }) },
            StubNode { name: "b", outcome: Err(Error::NetworkError { message: "timeout".into(), cause: None }) },
        ]);
        let result = driver.resolve("did:ion:abc", &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::NetworkError));
    }

    #[tokio::test]
    async fn no_nodes_configured_is_internal_error() {
        let driver: IonDriver<StubNode> = IonDriver::new(vec![]);
        let result = driver.resolve("did:ion:abc", &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::InternalError));
    }
}
