//! # Closed error taxonomy
//!
//! Every public operation in this crate returns either a typed success or a
//! member of this closed enum, carrying a stable `code()` string and a human
//! message. See spec §7 for the full propagation policy: network/timeout
//! errors are recoverable at the resolver cache level, signature/expiry/
//! revocation errors are terminal, `ChainBroken` is fatal to the audit
//! writer, and `Internal` should never occur in practice.

use std::fmt;

use thiserror::Error;

/// Closed set of error kinds surfaced by this crate's public API.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed DID, VC, or status entry syntactically.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human-readable detail.
        message: String,
    },

    /// DID parses but fails method-specific validation.
    #[error("invalid DID: {message}")]
    InvalidDid {
        /// Human-readable detail.
        message: String,
    },

    /// Resource absent: DID doc 404, DNS resolution failure, unknown key id.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable detail.
        message: String,
    },

    /// DID method has no registered driver.
    #[error("method not supported: {method}")]
    MethodNotSupported {
        /// The unsupported method name.
        method: String,
    },

    /// Transient I/O failure (connection refused, 5xx, TLS).
    #[error("network error: {message}")]
    NetworkError {
        /// Human-readable detail.
        message: String,
        /// Optional nested cause.
        #[source]
        cause: Option<Box<Error>>,
    },

    /// Deadline exceeded.
    #[error("timeout after {elapsed_ms} ms")]
    Timeout {
        /// Elapsed milliseconds before the operation was abandoned.
        elapsed_ms: u64,
    },

    /// Input cannot be canonicalized.
    #[error("canonicalization error: {message}")]
    Canonicalization {
        /// Human-readable detail.
        message: String,
    },

    /// Signature bytes do not verify.
    #[error("bad signature")]
    BadSignature,

    /// Credential past `expirationDate`.
    #[error("credential expired")]
    Expired,

    /// `notBefore` is in the future.
    #[error("credential not yet valid")]
    NotYetValid,

    /// Status-list bit is set.
    #[error("credential revoked")]
    Revoked,

    /// Issuer DID document has `deactivated: true`.
    #[error("issuer deactivated")]
    IssuerDeactivated,

    /// KMS rejected the operation: key id unknown.
    #[error("key not found: {key_id}")]
    KeyNotFound {
        /// The key id that was not found.
        key_id: String,
    },

    /// KMS rejected the operation: key disabled.
    #[error("key disabled: {key_id}")]
    KeyDisabled {
        /// The key id that is disabled.
        key_id: String,
    },

    /// KMS backend failure.
    #[error("KMS unavailable: {message}")]
    KmsUnavailable {
        /// Human-readable detail.
        message: String,
    },

    /// Revocation list has no remaining indices.
    #[error("status list {list_id} exhausted")]
    ListExhausted {
        /// The exhausted list's id.
        list_id: String,
    },

    /// Audit chain verification failed.
    #[error("audit chain broken at sequence {first_broken_sequence}")]
    ChainBroken {
        /// First sequence number whose signature or linkage failed to verify.
        first_broken_sequence: u64,
    },

    /// Unsupported VC proof type.
    #[error("unsupported proof type: {proof_type}")]
    UnsupportedProofType {
        /// The proof type string encountered.
        proof_type: String,
    },

    /// Unexpected invariant violation. Should never occur; carries enough
    /// context to reproduce.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable detail, ideally including enough context to
        /// reproduce the violated invariant.
        message: String,
    },
}

impl Error {
    /// Stable machine-readable error code, part of the external error
    /// envelope (`{code, message, cause?}`, spec §6.6).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalidInput",
            Self::InvalidDid { .. } => "invalidDid",
            Self::NotFound { .. } => "notFound",
            Self::MethodNotSupported { .. } => "methodNotSupported",
            Self::NetworkError { .. } => "networkError",
            Self::Timeout { .. } => "timeout",
            Self::Canonicalization { .. } => "canonicalizationError",
            Self::BadSignature => "badSignature",
            Self::Expired => "expired",
            Self::NotYetValid => "notYetValid",
            Self::Revoked => "revoked",
            Self::IssuerDeactivated => "issuerDeactivated",
            Self::KeyNotFound { .. } => "keyNotFound",
            Self::KeyDisabled { .. } => "keyDisabled",
            Self::KmsUnavailable { .. } => "kmsUnavailable",
            Self::ListExhausted { .. } => "listExhausted",
            Self::ChainBroken { .. } => "chainBroken",
            Self::UnsupportedProofType { .. } => "unsupportedProofType",
            Self::Internal { .. } => "internalError",
        }
    }

    /// Whether a caller may usefully retry the operation that produced this
    /// error (spec §7 propagation policy).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NetworkError { .. } | Self::Timeout { .. })
    }

    /// Construct an `Internal` error, the variant implementations should use
    /// whenever an invariant they believed to be load-bearing is violated.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

/// The external error envelope described in spec §6.6: `{code, message,
/// cause?}`, serializable for hosts that surface it over a wire protocol.
#[derive(Debug, serde::Serialize)]
pub struct ErrorEnvelope {
    /// Stable machine-readable code, see [`Error::code`].
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional nested cause, one level deep (chains flatten to a string).
    pub cause: Option<String>,
}

impl From<&Error> for ErrorEnvelope {
    fn from(err: &Error) -> Self {
        let cause = match err {
            Error::NetworkError { cause: Some(c), .. } => Some(c.to_string()),
            _ => std::error::Error::source(err).map(ToString::to_string),
        };
        Self { code: err.code(), message: err.to_string(), cause }
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{code: {}, message: {}}}", self.code, self.message)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::BadSignature.code(), "badSignature");
        assert_eq!(Error::Revoked.code(), "revoked");
        assert_eq!(
            Error::ListExhausted { list_id: "l1".into() }.code(),
            "listExhausted"
        );
    }

    #[test]
    fn network_and_timeout_are_recoverable() {
        assert!(Error::Timeout { elapsed_ms: 5000 }.is_recoverable());
        assert!(Error::NetworkError { message: "refused".into(), cause: None }.is_recoverable());
        assert!(!Error::BadSignature.is_recoverable());
    }
}
