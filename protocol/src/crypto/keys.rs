//! # Key Management
//!
//! secp256k1 keypairs, addresses and recoverable signatures for approver
//! identities.
//!
//! An approver is identified by an [`Address`], not by a public key. The
//! address is derived from the public key (low 20 bytes of its Keccak-256
//! hash), and a recoverable signature carries enough information to rebuild
//! the public key, so the verifier only ever needs to know the address it
//! expects.
//!
//! ## Security considerations
//!
//! - Secret keys are zeroized on drop (thanks, k256).
//! - `OsRng` is used for key generation. Production keys come from the
//!   approver's own wallet; `generate` exists for tests and the demo.
//! - Key bytes are never logged. `Debug` prints the address only.

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::hash::{keccak256, Hash32};
use crate::config::{ADDRESS_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* a secret key was rejected.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid address: expected {ADDRESS_LENGTH} hex-encoded bytes")]
    InvalidAddress,

    #[error("invalid signature encoding: expected {SIGNATURE_LENGTH} hex-encoded bytes")]
    InvalidSignatureEncoding,

    #[error("signing failed")]
    SigningFailed,
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte approver or account identity.
///
/// Displayed and serialized as `0x`-prefixed lowercase hex. The all-zero
/// address is the null identity and is never a valid approver or recipient.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The null identity.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wrap raw address bytes.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derive the address of a secp256k1 public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let encoded = key.to_encoded_point(false);
        // Skip the 0x04 SEC1 tag; only the 64 coordinate bytes are hashed.
        let hash = keccak256(&encoded.as_bytes()[1..]);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Take the low 20 bytes of a 32-byte hash. Used for program addresses.
    pub fn from_hash(hash: &Hash32) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// `true` for the null identity.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidAddress)?;
        let arr: [u8; ADDRESS_LENGTH] = bytes.try_into().map_err(|_| KeyError::InvalidAddress)?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Recoverable signature
// ---------------------------------------------------------------------------

/// A 65-byte recoverable ECDSA signature: `r || s || v`.
///
/// `v` is stored in the 27/28 form most wallets emit. The recovery path
/// also accepts 0/1, so signatures from libraries that skip the offset
/// verify just the same.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoverableSignature([u8; SIGNATURE_LENGTH]);

impl RecoverableSignature {
    /// Assemble from a k256 signature and its recovery id.
    pub fn from_parts(signature: &Signature, recovery_id: RecoveryId) -> Self {
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        Self(bytes)
    }

    /// Wrap raw bytes without validating them. Validation happens at
    /// recovery time, where a bad encoding is just a failed approval.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse from a byte slice of exactly 65 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; SIGNATURE_LENGTH] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidSignatureEncoding)?;
        Ok(Self(arr))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for RecoverableSignature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidSignatureEncoding)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverableSignature({})", self.to_hex())
    }
}

impl Serialize for RecoverableSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecoverableSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// An approver keypair wrapping a secp256k1 signing key.
///
/// `CosignKeypair` intentionally does NOT implement `Serialize`. Exporting a
/// secret key should be a deliberate act: use
/// [`secret_key_bytes`](Self::secret_key_bytes).
///
/// # Examples
///
/// ```
/// use cosign_protocol::crypto::keys::CosignKeypair;
///
/// let kp = CosignKeypair::generate();
/// let digest = cosign_protocol::crypto::keccak256(b"approve transfer 0");
/// let sig = kp.sign_prehash(&digest).unwrap();
/// assert_eq!(sig.as_bytes().len(), 65);
/// ```
pub struct CosignKeypair {
    signing_key: SigningKey,
}

impl CosignKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Reconstruct a keypair from raw 32-byte secret key material.
    ///
    /// Fails for the zero scalar and for values at or above the group order.
    pub fn from_bytes(secret_key_bytes: &[u8; SECRET_KEY_LENGTH]) -> Result<Self, KeyError> {
        let signing_key =
            SigningKey::from_slice(secret_key_bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Reconstruct a keypair from a hex-encoded secret key (`0x` optional).
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let stripped = hex_str.trim().strip_prefix("0x").unwrap_or(hex_str.trim());
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_bytes(&arr)
    }

    /// The public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from(&self.signing_key)
    }

    /// The identity this keypair signs as.
    pub fn address(&self) -> Address {
        Address::from_verifying_key(&self.verifying_key())
    }

    /// Sign a 32-byte digest directly, with no further hashing.
    ///
    /// This is a low-level primitive: approvals must go through
    /// [`crate::crypto::signatures::sign_approval`], which applies the
    /// signing-context prefix first.
    pub fn sign_prehash(&self, digest: &Hash32) -> Result<RecoverableSignature, KeyError> {
        let (signature, recovery_id): (Signature, RecoveryId) = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|_| KeyError::SigningFailed)?;
        Ok(RecoverableSignature::from_parts(&signature, recovery_id))
    }

    /// Export the raw 32-byte secret key. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes().into()
    }
}

impl Clone for CosignKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
        }
    }
}

impl fmt::Debug for CosignKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material in debug output.
        write!(f, "CosignKeypair(address={})", self.address())
    }
}
