//! # Multibase / multicodec decoding (C1)
//!
//! Decodes `z<base58btc>`-prefixed multibase strings (the only prefix this
//! crate's DID methods use for key material) and strips the two-byte
//! multicodec varint prefix identifying the key type. Also provides the
//! `u`-prefixed base64url multibase used by Status List 2021's
//! `encodedList`.

use base64ct::{Base64UrlUnpadded, Encoding as _};

use crate::error::{Error, Result};

/// Key type identified by a multicodec prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    /// Ed25519 public key, multicodec `0xed01`.
    Ed25519,
    /// secp256k1 compressed public key, multicodec `0xe701`.
    Secp256k1,
    /// X25519 public key, multicodec `0xec01`.
    X25519,
    /// P-256 public key, multicodec `0x8024`.
    P256,
    /// P-384 public key, multicodec `0x8124`.
    P384,
}

impl KeyType {
    /// The `verificationMethod.type` string a did:key driver assigns for
    /// this key type.
    #[must_use]
    pub const fn verification_method_type(self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519VerificationKey2020",
            Self::Secp256k1 => "EcdsaSecp256k1VerificationKey2019",
            Self::X25519 => "X25519KeyAgreementKey2020",
            Self::P256 => "P256Key2021",
            Self::P384 => "P384Key2021",
        }
    }

    const fn multicodec_prefix(self) -> [u8; 2] {
        match self {
            Self::Ed25519 => [0xed, 0x01],
            Self::Secp256k1 => [0xe7, 0x01],
            Self::X25519 => [0xec, 0x01],
            Self::P256 => [0x80, 0x24],
            Self::P384 => [0x81, 0x24],
        }
    }

    fn from_prefix(prefix: [u8; 2]) -> Option<Self> {
        for candidate in [Self::Ed25519, Self::Secp256k1, Self::X25519, Self::P256, Self::P384] {
            if candidate.multicodec_prefix() == prefix {
                return Some(candidate);
            }
        }
        None
    }
}

/// Decode a `z`-prefixed multibase string into its multicodec key type and
/// raw key bytes (prefix stripped).
///
/// # Errors
///
/// Returns [`Error::InvalidDid`] if the string is missing the `z` prefix,
/// fails base58btc decoding, is too short to contain a multicodec prefix, or
/// carries an unrecognized multicodec prefix.
pub fn decode_multikey(multibase: &str) -> Result<(KeyType, Vec<u8>)> {
    let Some(suffix) = multibase.strip_prefix('z') else {
        return Err(Error::InvalidDid {
            message: format!("expected base58btc multibase prefix 'z', got {multibase}"),
        });
    };
    let decoded = decode_base58btc(suffix)?;
    if decoded.len() < 2 {
        return Err(Error::InvalidDid { message: "multicodec value too short".into() });
    }
    let prefix = [decoded[0], decoded[1]];
    let key_type = KeyType::from_prefix(prefix)
        .ok_or_else(|| Error::InvalidDid { message: format!("unknown multicodec prefix {prefix:02x?}") })?;
    Ok((key_type, decoded[2..].to_vec()))
}

/// Encode raw key bytes as a `z`-prefixed multibase multicodec string.
#[must_use]
pub fn encode_multikey(key_type: KeyType, key_bytes: &[u8]) -> String {
    let mut buf = Vec::with_capacity(2 + key_bytes.len());
    buf.extend_from_slice(&key_type.multicodec_prefix());
    buf.extend_from_slice(key_bytes);
    format!("z{}", encode_base58btc(&buf))
}

/// Decode a base58btc string, preserving one leading `0x00` byte for every
/// leading `'1'` character in the input (spec §8 property 11; §4.1).
///
/// # Errors
///
/// Returns [`Error::InvalidDid`] on a character outside the base58
/// alphabet.
pub fn decode_base58btc(s: &str) -> Result<Vec<u8>> {
    bs58::decode(s)
        .into_vec()
        .map_err(|e| Error::InvalidDid { message: format!("invalid base58btc: {e}") })
}

/// Encode bytes as base58btc, emitting one leading `'1'` for every leading
/// `0x00` byte.
#[must_use]
pub fn encode_base58btc(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode a `u`-prefixed multibase base64url (no padding) string, as used
/// by Status List 2021's `encodedList` (spec §6.2).
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the `u` prefix is missing or the
/// remainder is not valid unpadded base64url.
pub fn decode_base64url_multibase(s: &str) -> Result<Vec<u8>> {
    let Some(suffix) = s.strip_prefix('u') else {
        return Err(Error::InvalidInput {
            message: format!("expected base64url multibase prefix 'u', got {s}"),
        });
    };
    Base64UrlUnpadded::decode_vec(suffix)
        .map_err(|e| Error::InvalidInput { message: format!("invalid base64url: {e}") })
}

/// Encode bytes as a `u`-prefixed multibase base64url (no padding) string.
#[must_use]
pub fn encode_base64url_multibase(bytes: &[u8]) -> String {
    format!("u{}", Base64UrlUnpadded::encode_string(bytes))
}
