//! # Status List 2021 codec (C3)
//!
//! A GZIP-compressed bitstring encoded as the `encodedList` field of a
//! `StatusList2021Credential` (spec §4.3, §6.2). Bit `i` lives at
//! `(byte[i>>3] >> (7 - (i & 7))) & 1` — MSB-first within each byte, per the
//! W3C Status List 2021 spec. Compression is deterministic (level 9, no
//! filename/comment/mtime) so identical bitstrings always produce
//! byte-identical `encodedList` strings.

use std::io::Write as _;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::multibase::{decode_base64url_multibase, encode_base64url_multibase};

/// Default bitstring length in bits: 131,072 (16 KiB uncompressed).
pub const DEFAULT_LENGTH: usize = 131_072;

/// Semantic meaning of a status list (spec §3, Glossary).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusPurpose {
    /// Permanent revocation.
    Revocation,
    /// Reversible suspension.
    Suspension,
}

/// A `StatusList2021Entry` embedded in a credential's `credentialStatus`
/// (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusList2021Entry {
    /// Entry id, typically `{statusListCredential}#{statusListIndex}`.
    pub id: String,
    /// Fixed type discriminant.
    #[serde(rename = "type")]
    pub type_: StatusEntryType,
    /// The purpose this entry's list serves.
    pub status_purpose: StatusPurpose,
    /// Index into the referenced list's bitstring, serialized as a decimal
    /// string per the W3C data model.
    pub status_list_index: String,
    /// URL of the `StatusList2021Credential` this entry's index lives in.
    pub status_list_credential: String,
}

/// Fixed `type` discriminant for a `StatusList2021Entry`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusEntryType {
    /// The only defined value, `"StatusList2021Entry"`.
    #[serde(rename = "StatusList2021Entry")]
    StatusList2021Entry,
}

impl StatusList2021Entry {
    /// Parse `status_list_index` as a `usize`, validating it is a
    /// non-negative decimal integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the field is not a valid decimal
    /// integer.
    pub fn index(&self) -> Result<usize> {
        self.status_list_index.parse().map_err(|_| Error::InvalidInput {
            message: format!("statusListIndex is not a valid index: {}", self.status_list_index),
        })
    }
}

/// A fixed-length, power-of-two bitstring backing a status list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitstring {
    bytes: Vec<u8>,
}

impl Bitstring {
    /// Allocate a zeroed bitstring of `length` bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless `length` is a multiple of 8,
    /// a power of two, and at least 16,384 (the W3C spec's 16 KiB minimum).
    pub fn new(length: usize) -> Result<Self> {
        Self::validate_length(length)?;
        Ok(Self { bytes: vec![0u8; length / 8] })
    }

    fn validate_length(length: usize) -> Result<()> {
        if length < 16_384 || length % 8 != 0 || !length.is_power_of_two() {
            return Err(Error::InvalidInput {
                message: format!(
                    "status list length must be a power of two, a multiple of 8, and >= 16384, got {length}"
                ),
            });
        }
        Ok(())
    }

    /// Number of bits in this bitstring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Whether the bitstring has zero length (never true for a validly
    /// constructed instance, provided for API symmetry).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Set bit `index` to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `index >= len()`.
    pub fn set(&mut self, index: usize, value: bool) -> Result<()> {
        self.check_index(index)?;
        let byte = &mut self.bytes[index / 8];
        let mask = 1u8 << (7 - (index % 8));
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        Ok(())
    }

    /// Read bit `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        let byte = self.bytes[index / 8];
        let mask = 1u8 << (7 - (index % 8));
        Ok(byte & mask != 0)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(Error::InvalidInput {
                message: format!("status index {index} out of range for length {}", self.len()),
            });
        }
        Ok(())
    }

    /// GZIP-compress (level 9, deterministic header) then multibase
    /// base64url-encode this bitstring, producing the `encodedList` value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the GZIP encoder fails, which should
    /// not happen for an in-memory `Vec` sink.
    pub fn encode(&self) -> Result<String> {
        let compressed = gzip_deterministic(&self.bytes)?;
        Ok(encode_base64url_multibase(&compressed))
    }

    /// Inverse of [`Bitstring::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] (mapped to `MalformedStatusList` by
    /// callers) on bad base64url, bad GZIP, or a decompressed length that is
    /// not itself a valid bitstring length.
    pub fn decode(encoded: &str) -> Result<Self> {
        let compressed = decode_base64url_multibase(encoded)?;
        let bytes = gunzip(&compressed)?;
        Self::validate_length(bytes.len() * 8)?;
        Ok(Self { bytes })
    }
}

fn gzip_deterministic(data: &[u8]) -> Result<Vec<u8>> {
    // `flate2`'s `GzEncoder` writes a gzip header with mtime=0 and no
    // filename/comment by default, matching spec §6.2's determinism
    // requirement; we fix the compression level explicitly.
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(9));
    encoder
        .write_all(data)
        .map_err(|e| Error::internal(format!("gzip write failed: {e}")))?;
    encoder.finish().map_err(|e| Error::internal(format!("gzip finish failed: {e}")))
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read as _;
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::InvalidInput { message: format!("malformed gzip data: {e}") })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn new_rejects_bad_lengths() {
        assert!(Bitstring::new(100).is_err());
        assert!(Bitstring::new(16_000).is_err());
        assert!(Bitstring::new(DEFAULT_LENGTH).is_ok());
    }

    #[test]
    fn set_get_msb_first() {
        let mut bs = Bitstring::new(DEFAULT_LENGTH).unwrap();
        bs.set(0, true).unwrap();
        assert!(bs.get(0).unwrap());
        assert!(!bs.get(1).unwrap());
        // bit 0 is the MSB of byte 0.
        assert_eq!(bs.bytes[0], 0b1000_0000);
    }

    #[test]
    fn set_does_not_affect_other_bits() {
        let mut bs = Bitstring::new(DEFAULT_LENGTH).unwrap();
        bs.set(42, true).unwrap();
        for i in 0..DEFAULT_LENGTH {
            let expected = i == 42;
            assert_eq!(bs.get(i).unwrap(), expected, "bit {i}");
        }
    }

    #[test]
    fn out_of_range_is_error() {
        let bs = Bitstring::new(DEFAULT_LENGTH).unwrap();
        assert!(bs.get(DEFAULT_LENGTH).is_err());
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut bs = Bitstring::new(DEFAULT_LENGTH).unwrap();
        bs.set(42, true).unwrap();
        bs.set(1000, true).unwrap();
        let encoded = bs.encode().unwrap();
        let decoded = Bitstring::decode(&encoded).unwrap();
        assert_eq!(bs, decoded);
    }

    #[test]
    fn all_zero_list_compresses_small() {
        let bs = Bitstring::new(DEFAULT_LENGTH).unwrap();
        let encoded = bs.encode().unwrap();
        assert!(encoded.len() < 200, "expected small encoding, got {} bytes", encoded.len());
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut a = Bitstring::new(DEFAULT_LENGTH).unwrap();
        let mut b = Bitstring::new(DEFAULT_LENGTH).unwrap();
        for idx in [1, 5, 99, 8191] {
            a.set(idx, true).unwrap();
            b.set(idx, true).unwrap();
        }
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    proptest! {
        #[test]
        fn prop_set_then_get_round_trips(idx in 0usize..DEFAULT_LENGTH, value: bool) {
            let mut bs = Bitstring::new(DEFAULT_LENGTH).unwrap();
            bs.set(idx, value).unwrap();
            prop_assert_eq!(bs.get(idx).unwrap(), value);
        }

        #[test]
        fn prop_set_does_not_affect_other_indices(
            i in 0usize..DEFAULT_LENGTH, j in 0usize..DEFAULT_LENGTH, value: bool,
        ) {
            prop_assume!(i != j);
            let mut bs = Bitstring::new(DEFAULT_LENGTH).unwrap();
            let before = bs.get(j).unwrap();
            bs.set(i, value).unwrap();
            prop_assert_eq!(bs.get(j).unwrap(), before);
        }

        #[test]
        fn prop_encode_decode_round_trips(indices in proptest::collection::vec(0usize..DEFAULT_LENGTH, 0..50)) {
            let mut bs = Bitstring::new(DEFAULT_LENGTH).unwrap();
            for idx in &indices {
                bs.set(*idx, true).unwrap();
            }
            let encoded = bs.encode().unwrap();
            let decoded = Bitstring::decode(&encoded).unwrap();
            prop_assert_eq!(bs, decoded);
        }
    }
}
