//! Plain, serde-(de)serializable configuration structs consumed by a host
//! process. No CLI or file-format loader lives in this crate — reading a
//! config file or environment into these structs is the host's job; this
//! module only defines the inert data shape and its defaults.

use serde::{Deserialize, Serialize};

use crate::resolver::{DEFAULT_CACHE_CAPACITY, DEFAULT_NEGATIVE_TTL_SECS, DEFAULT_POSITIVE_TTL_SECS};
use crate::status::{DEFAULT_LENGTH, StatusPurpose};

/// Tuning knobs for a [`crate::resolver::UniversalResolver`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Maximum number of cached resolutions before LRU eviction.
    pub cache_capacity: u64,
    /// TTL, in seconds, for a successfully resolved DID document.
    pub positive_ttl_secs: u64,
    /// TTL, in seconds, for a cached `notFound` result.
    pub negative_ttl_secs: u64,
    /// Per-call deadline handed to each [`crate::did::DidDriver::resolve`],
    /// in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            positive_ttl_secs: DEFAULT_POSITIVE_TTL_SECS,
            negative_ttl_secs: DEFAULT_NEGATIVE_TTL_SECS,
            timeout_ms: 5_000,
        }
    }
}

/// Tuning knobs for [`crate::revocation::RevocationManager`] list creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListConfig {
    /// Bit length for newly initialized lists. Must be a power of two and
    /// at least 16384, per [`crate::status::Bitstring::new`].
    pub list_length: usize,
    /// Purpose assigned to a list when none is specified explicitly.
    pub default_purpose: StatusPurpose,
}

impl Default for StatusListConfig {
    fn default() -> Self {
        Self { list_length: DEFAULT_LENGTH, default_purpose: StatusPurpose::Revocation }
    }
}

/// Which [`crate::kms::KeyManager`] backend a host should construct, plus
/// that backend's connection fields. Selecting a variant here does not, by
/// itself, enable the corresponding Cargo feature — `Aws`/`Gcp` are only
/// constructible when `aws-kms`/`reqwest-client` are compiled in.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "camelCase")]
pub enum KmsConfig {
    /// In-process key storage, encrypted at rest under a master key derived
    /// via HKDF-SHA256.
    Local {
        /// Hex-encoded master key input keying material.
        master_key_hex: String,
    },
    /// AWS Key Management Service, behind the `aws-kms` feature.
    Aws {
        /// AWS region, e.g. `"us-east-1"`.
        region: String,
        /// Optional named profile; `None` uses the default credential
        /// chain.
        profile: Option<String>,
    },
    /// Google Cloud KMS, reached over the Cloud KMS v1 REST API.
    Gcp {
        /// GCP project id.
        project_id: String,
        /// KMS key ring location, e.g. `"global"`.
        location: String,
        /// KMS key ring id.
        key_ring: String,
    },
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self::Local { master_key_hex: String::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_config_defaults_match_resolver_constants() {
        let config = ResolverConfig::default();
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.positive_ttl_secs, DEFAULT_POSITIVE_TTL_SECS);
        assert_eq!(config.negative_ttl_secs, DEFAULT_NEGATIVE_TTL_SECS);
    }

    #[test]
    fn status_list_config_default_length_is_valid() {
        let config = StatusListConfig::default();
        assert!(config.list_length >= 16_384);
        assert!(config.list_length.is_power_of_two());
    }

    #[test]
    fn kms_config_round_trips_through_json() {
        let config = KmsConfig::Aws { region: "us-east-1".to_string(), profile: None };
        let json = serde_json::to_string(&config).unwrap();
        let back: KmsConfig = serde_json::from_str(&json).unwrap();
        match back {
            KmsConfig::Aws { region, profile } => {
                assert_eq!(region, "us-east-1");
                assert!(profile.is_none());
            }
            _ => panic!("expected Aws variant"),
        }
    }
}
