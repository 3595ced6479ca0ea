//! # Injected HTTP transport
//!
//! `did:web` and `did:ion` need HTTPS fetches; spec §1 Non-goals forbids
//! mandating a specific transport, so both drivers take an `HttpFetch`
//! implementation rather than calling a hardcoded client. A `reqwest`-backed
//! default is provided behind the `reqwest-client` feature (on by default),
//! following the same inject-the-capability pattern `KeyManager` uses
//! instead of hardcoding a crypto or chain backend.

use super::DidResolutionError;

/// Outcome of an HTTP fetch, already classified into the DID error taxonomy
/// where the failure is unambiguous. `Ok` bodies and status codes are
/// handled by the caller (different methods need different status-code
/// policies).
pub enum FetchOutcome {
    /// Request completed; caller inspects `status` and `body`.
    Response {
        /// HTTP status code.
        status: u16,
        /// Response content-type header, if present.
        content_type: Option<String>,
        /// Response body bytes.
        body: Vec<u8>,
    },
    /// DNS resolution failed (`ENOTFOUND`/`EAI_AGAIN`-equivalent). Spec §4.4.1
    /// mandates this map to `notFound`, never `networkError`.
    DnsFailure,
    /// Any other transport-level failure (connection refused, TLS error,
    /// timeout).
    NetworkFailure {
        /// Human-readable detail.
        message: String,
    },
}

/// Injected HTTP client capability.
#[async_trait::async_trait]
pub trait HttpFetch: Send + Sync {
    /// Perform a GET request against `url`, bounded by `timeout_ms`.
    async fn get(&self, url: &str, timeout_ms: u64) -> FetchOutcome;
}

impl FetchOutcome {
    /// Classify this outcome into a [`DidResolutionError`] when it is not a
    /// usable 2xx response, or `None` if the caller should proceed to parse
    /// `body`.
    #[must_use]
    pub fn classify_non_success(&self) -> Option<(DidResolutionError, String)> {
        match self {
            Self::Response { status, .. } if (200..300).contains(status) => None,
            Self::Response { status: 404, .. } => {
                Some((DidResolutionError::NotFound, "HTTP 404".to_string()))
            }
            Self::Response { status, .. } => {
                Some((DidResolutionError::NetworkError, format!("HTTP {status}")))
            }
            Self::DnsFailure => Some((DidResolutionError::NotFound, "DNS resolution failed".to_string())),
            Self::NetworkFailure { message } => {
                Some((DidResolutionError::NetworkError, message.clone()))
            }
        }
    }
}

/// Default [`HttpFetch`] implementation backed by `reqwest`.
#[cfg(feature = "reqwest-client")]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest-client")]
impl ReqwestFetch {
    /// Construct with a fresh default `reqwest::Client`.
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[cfg(feature = "reqwest-client")]
impl Default for ReqwestFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "reqwest-client")]
#[async_trait::async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, url: &str, timeout_ms: u64) -> FetchOutcome {
        let request = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .header("accept", "application/did+json, application/json");

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(ToString::to_string);
                let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                FetchOutcome::Response { status, content_type, body }
            }
            Err(e) => {
                if e.is_connect() && is_dns_error(&e) {
                    FetchOutcome::DnsFailure
                } else {
                    FetchOutcome::NetworkFailure { message: e.to_string() }
                }
            }
        }
    }
}

#[cfg(feature = "reqwest-client")]
fn is_dns_error(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        let msg = e.to_string().to_lowercase();
        if msg.contains("dns") || msg.contains("name resolution") || msg.contains("nodename nor servname") {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_404_as_not_found() {
        let outcome = FetchOutcome::Response { status: 404, content_type: None, body: vec![] };
        let (err, _) = outcome.classify_non_success().unwrap();
        assert_eq!(err, DidResolutionError::NotFound);
    }

    #[test]
    fn classifies_5xx_as_network_error() {
        let outcome = FetchOutcome::Response { status: 503, content_type: None, body: vec![] };
        let (err, _) = outcome.classify_non_success().unwrap();
        assert_eq!(err, DidResolutionError::NetworkError);
    }

    #[test]
    fn classifies_dns_failure_as_not_found() {
        let outcome = FetchOutcome::DnsFailure;
        let (err, _) = outcome.classify_non_success().unwrap();
        assert_eq!(err, DidResolutionError::NotFound);
    }

    #[test]
    fn classifies_2xx_as_success() {
        let outcome = FetchOutcome::Response { status: 200, content_type: None, body: vec![] };
        assert!(outcome.classify_non_success().is_none());
    }
}
