//! # `did:web` driver
//!
//! Maps a `did:web` identifier to an HTTPS `.well-known` or path-based
//! lookup per the did:web method spec, with DNS failures deliberately
//! downgraded to `notFound` rather than `networkError` (spec §4.4.1) — a
//! caller cannot distinguish "the domain doesn't exist" from "this DID was
//! never published" and both should read as absent, not transient.

use super::http::HttpFetch;
use super::{
    DidDocument, DidDriver, DidResolutionError, DocumentMetadata, ResolutionOptions,
    ResolutionResult,
};

/// The `did:web` method driver.
pub struct WebDriver<H: HttpFetch> {
    http: H,
}

impl<H: HttpFetch> WebDriver<H> {
    /// Construct a driver over the given [`HttpFetch`] implementation.
    #[must_use]
    pub const fn new(http: H) -> Self {
        Self { http }
    }

    /// Turn `did:web:example.com:users:alice` into
    /// `https://example.com/users/alice/did.json`, or `did:web:example.com`
    /// into `https://example.com/.well-known/did.json`. A `%3A`-encoded port
    /// segment (e.g. `example.com%3A8443`) decodes back to `example.com:8443`.
    fn resolve_url(did: &str) -> Result<String, String> {
        let path = did.strip_prefix("did:web:").ok_or_else(|| "missing did:web: prefix".to_string())?;
        if path.is_empty() {
            return Err("empty did:web path".to_string());
        }
        let mut segments = path.split(':');
        let host_segment = segments.next().ok_or_else(|| "missing host".to_string())?;
        let host = host_segment.replace("%3A", ":").replace("%3a", ":");
        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            Ok(format!("https://{host}/.well-known/did.json"))
        } else {
            let joined = rest.join("/");
            Ok(format!("https://{host}/{joined}/did.json"))
        }
    }
}

#[async_trait::async_trait]
impl<H: HttpFetch + 'static> DidDriver for WebDriver<H> {
    fn method(&self) -> &'static str {
        "web"
    }

    async fn resolve(&self, did: &str, options: &ResolutionOptions) -> ResolutionResult {
        let url = match Self::resolve_url(did) {
            Ok(url) => url,
            Err(message) => return ResolutionResult::error(DidResolutionError::InvalidDid, message),
        };

        let outcome = self.http.get(&url, options.timeout_ms).await;
        if let Some((error, message)) = outcome.classify_non_success() {
            return ResolutionResult::error(error, message);
        }

        let super::http::FetchOutcome::Response { content_type, body, .. } = outcome else {
            unreachable!("classify_non_success returned None only for Response variants");
        };

        if let Some(ct) = &content_type {
            let ct = ct.split(';').next().unwrap_or(ct).trim();
            if ct != "application/did+json" && ct != "application/json" {
                return ResolutionResult::error(
                    DidResolutionError::RepresentationNotSupported,
                    format!("unexpected content-type {ct}"),
                );
            }
        }

        let document: DidDocument = match serde_json::from_slice(&body) {
            Ok(document) => document,
            Err(e) => {
                return ResolutionResult::error(
                    DidResolutionError::InvalidDid,
                    format!("document did not parse: {e}"),
                );
            }
        };

        if document.id != did {
            return ResolutionResult::error(
                DidResolutionError::InvalidDid,
                format!("document id {} did not match requested DID {did}", document.id),
            );
        }

        ResolutionResult::ok(document, DocumentMetadata::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_bare_domain_to_well_known() {
        assert_eq!(
            WebDriver::<super::super::http::ReqwestFetch>::resolve_url("did:web:example.com").unwrap(),
            "https://example.com/.well-known/did.json"
        );
    }

    #[test]
    fn maps_path_segments() {
        assert_eq!(
            WebDriver::<super::super::http::ReqwestFetch>::resolve_url("did:web:example.com:users:alice").unwrap(),
            "https://example.com/users/alice/did.json"
        );
    }

    #[test]
    fn decodes_percent_encoded_port() {
        assert_eq!(
            WebDriver::<super::super::http::ReqwestFetch>::resolve_url("did:web:example.com%3A8443").unwrap(),
            "https://example.com:8443/.well-known/did.json"
        );
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(WebDriver::<super::super::http::ReqwestFetch>::resolve_url("did:key:abc").is_err());
    }

    struct StubFetch(super::super::http::FetchOutcome);

    #[async_trait::async_trait]
    impl HttpFetch for StubFetch {
        async fn get(&self, _url: &str, _timeout_ms: u64) -> super::super::http::FetchOutcome {
            match &self.0 {
                super::super::http::FetchOutcome::Response { status, content_type, body } => {
                    super::super::http::FetchOutcome::Response {
                        status: *status,
                        content_type: content_type.clone(),
                        body: body.clone(),
                    }
                }
                super::super::http::FetchOutcome::DnsFailure => super::super::http::FetchOutcome::DnsFailure,
                super::super::http::FetchOutcome::NetworkFailure { message } => {
                    super::super::http::FetchOutcome::NetworkFailure { message: message.clone() }
                }
            }
        }
    }

    #[tokio::test]
    async fn dns_failure_maps_to_not_found() {
        let driver = WebDriver::new(StubFetch(super::super::http::FetchOutcome::DnsFailure));
        let result = driver.resolve("did:web:nonexistent.invalid", &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::NotFound));
    }

    #[tokio::test]
    async fn http_404_maps_to_not_found() {
        let driver = WebDriver::new(StubFetch(super::super::http::FetchOutcome::Response {
            status: 404,
            content_type: None,
            body: vec![],
        }));
        let result = driver.resolve("did:web:example.com", &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::NotFound));
    }

    #[tokio::test]
    async fn http_503_maps_to_network_error() {
        let driver = WebDriver::new(StubFetch(super::super::http::FetchOutcome::Response {
            status: 503,
            content_type: None,
            body: vec![],
        }));
        let result = driver.resolve("did:web:example.com", &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::NetworkError));
    }

    #[tokio::test]
    async fn mismatched_document_id_is_invalid() {
        let body = serde_json::to_vec(&serde_json::json!({"id": "did:web:other.com"})).unwrap();
        let driver = WebDriver::new(StubFetch(super::super::http::FetchOutcome::Response {
            status: 200,
            content_type: Some("application/did+json".to_string()),
            body,
        }));
        let result = driver.resolve("did:web:example.com", &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::InvalidDid));
    }

    #[tokio::test]
    async fn matching_document_resolves() {
        let body = serde_json::to_vec(&serde_json::json!({"id": "did:web:example.com"})).unwrap();
        let driver = WebDriver::new(StubFetch(super::super::http::FetchOutcome::Response {
            status: 200,
            content_type: Some("application/did+json".to_string()),
            body,
        }));
        let result = driver.resolve("did:web:example.com", &ResolutionOptions::default()).await;
        assert!(result.is_ok());
    }
}
