//! A trust protocol core for AI agent ecosystems: canonicalization and
//! signature primitives, a key management abstraction, DID resolution
//! across `web`/`key`/`ethr`/`ion`, Verifiable Credential issuance and
//! verification, Status List 2021 revocation, a weighted trust scoring
//! engine, and a hash-chained audit log.
//!
//! # Feature flags
//!
//! * `reqwest-client` (default) — the built-in [`reqwest`]-backed
//!   `HttpFetch` implementation used by the `did:web` and `did:ion`
//!   drivers, and the GCP KMS backend's token exchange. Hosts that inject
//!   their own transport can disable it.
//! * `aws-kms` — the AWS KMS [`kms::KeyManager`] backend. Off by default to
//!   keep the AWS SDK out of hosts that don't need it.

pub mod audit;
pub mod canon;
pub mod config;
pub mod crypto;
pub mod did;
pub mod error;
pub mod kms;
pub mod multibase;
pub mod resolver;
pub mod revocation;
pub mod status;
pub mod trust;
pub mod vc;

pub use error::{Error, ErrorEnvelope, Result};
