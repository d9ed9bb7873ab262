//! # Digital Signatures
//!
//! Recoverable secp256k1 signing and signer recovery for approvals.
//!
//! Verification here never takes a public key. It takes a digest and a
//! signature, rebuilds the signer's public key from them, derives the
//! address and hands it back. Whether that address is the *right* one is
//! the caller's decision (see [`crate::verifier`]).
//!
//! ## Strictness
//!
//! We reject high-`s` signatures. For every valid `(r, s)` there is a twin
//! `(r, n - s)` that recovers the same key; accepting both would let anyone
//! mint a second, different-looking valid signature from the first. Stricter
//! is safer, and every wallet we care about emits low-`s` already.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;

use super::hash::Hash32;
use super::keys::{Address, CosignKeypair, KeyError, RecoverableSignature};
use crate::config::{SECP256K1_HALF_ORDER, SIGNATURE_LENGTH};
use crate::digest::signing_digest;

/// Errors during signer recovery.
///
/// Intentionally coarse: callers should not be able to tell a forged
/// signature from a corrupted one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature length: expected {SIGNATURE_LENGTH} bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid recovery id")]
    InvalidRecoveryId,

    #[error("malleable signature: s is in the upper half of the curve order")]
    MalleableSignature,

    #[error("signature verification failed")]
    VerificationFailed,
}

/// Sign an approval for a canonical digest.
///
/// Applies the signing-context prefix ([`signing_digest`]) and signs the
/// result. The ledger applies the identical wrapping before verifying, so
/// this is the only way an approver should ever produce an approval.
///
/// # Example
///
/// ```
/// use cosign_protocol::crypto::keys::CosignKeypair;
/// use cosign_protocol::crypto::signatures::{recover_signer, sign_approval};
/// use cosign_protocol::digest::signing_digest;
///
/// let approver = CosignKeypair::generate();
/// let canonical = cosign_protocol::crypto::keccak256(b"transfer 0");
/// let sig = sign_approval(&approver, &canonical).unwrap();
///
/// let signer = recover_signer(&signing_digest(&canonical), sig.as_bytes()).unwrap();
/// assert_eq!(signer, approver.address());
/// ```
pub fn sign_approval(
    keypair: &CosignKeypair,
    canonical: &Hash32,
) -> Result<RecoverableSignature, KeyError> {
    keypair.sign_prehash(&signing_digest(canonical))
}

/// Recover the address that produced `signature` over `digest`.
///
/// `digest` is used as-is; no prefix is applied here. Accepts `v` in both
/// the 0/1 and 27/28 conventions.
pub fn recover_signer(digest: &Hash32, signature: &[u8]) -> Result<Address, SignatureError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(SignatureError::InvalidLength(signature.len()));
    }

    let (rs, v) = signature.split_at(64);
    let v = match v[0] {
        0 | 1 => v[0],
        27 | 28 => v[0] - 27,
        _ => return Err(SignatureError::InvalidRecoveryId),
    };
    let recovery_id = RecoveryId::from_byte(v).ok_or(SignatureError::InvalidRecoveryId)?;

    // Big-endian byte arrays of equal length compare numerically.
    if rs[32..] > SECP256K1_HALF_ORDER[..] {
        return Err(SignatureError::MalleableSignature);
    }

    let signature = Signature::from_slice(rs).map_err(|_| SignatureError::VerificationFailed)?;
    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|_| SignatureError::VerificationFailed)?;

    Ok(Address::from_verifying_key(&key))
}

/// `true` if `signature` over `digest` recovers to `expected`.
///
/// Every failure mode collapses to `false`.
pub fn verify_signer(expected: &Address, digest: &Hash32, signature: &[u8]) -> bool {
    match recover_signer(digest, signature) {
        Ok(signer) => signer == *expected,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;

    fn keypair(byte: u8) -> CosignKeypair {
        CosignKeypair::from_bytes(&[byte; 32]).unwrap()
    }

    #[test]
    fn test_sign_and_recover() {
        let kp = keypair(1);
        let digest = keccak256(b"hello, world");
        let sig = kp.sign_prehash(&digest).unwrap();
        assert_eq!(recover_signer(&digest, sig.as_bytes()).unwrap(), kp.address());
    }

    #[test]
    fn test_wrong_digest_recovers_someone_else() {
        let kp = keypair(2);
        let sig = kp.sign_prehash(&keccak256(b"correct")).unwrap();
        // Recovery "succeeds" but yields an unrelated address.
        assert!(!verify_signer(&kp.address(), &keccak256(b"wrong"), sig.as_bytes()));
    }

    #[test]
    fn test_approval_is_bound_to_prefix() {
        let kp = keypair(3);
        let canonical = keccak256(b"transfer");
        let sig = sign_approval(&kp, &canonical).unwrap();
        assert!(verify_signer(&kp.address(), &signing_digest(&canonical), sig.as_bytes()));
        // The same bytes are not a valid signature over the raw digest.
        assert!(!verify_signer(&kp.address(), &canonical, sig.as_bytes()));
    }

    #[test]
    fn test_zero_one_recovery_id_accepted() {
        let kp = keypair(4);
        let digest = keccak256(b"legacy v");
        let sig = kp.sign_prehash(&digest).unwrap();
        let mut raw = sig.as_bytes().to_vec();
        raw[64] -= 27;
        assert_eq!(recover_signer(&digest, &raw).unwrap(), kp.address());
    }

    #[test]
    fn test_bad_recovery_id_rejected() {
        let kp = keypair(5);
        let digest = keccak256(b"v = 35");
        let mut raw = kp.sign_prehash(&digest).unwrap().as_bytes().to_vec();
        raw[64] = 35;
        assert_eq!(
            recover_signer(&digest, &raw),
            Err(SignatureError::InvalidRecoveryId)
        );
    }

    #[test]
    fn test_wrong_length_rejected() {
        let digest = keccak256(b"short");
        assert_eq!(
            recover_signer(&digest, &[0u8; 64]),
            Err(SignatureError::InvalidLength(64))
        );
        assert_eq!(
            recover_signer(&digest, &[]),
            Err(SignatureError::InvalidLength(0))
        );
    }

    #[test]
    fn test_high_s_rejected() {
        let digest = keccak256(b"malleable");
        let mut raw = [0u8; 65];
        raw[0] = 1;
        raw[32..64].copy_from_slice(&[0xFF; 32]);
        raw[64] = 27;
        assert_eq!(
            recover_signer(&digest, &raw),
            Err(SignatureError::MalleableSignature)
        );
    }

    #[test]
    fn test_all_zero_signature_rejected() {
        let digest = keccak256(b"zeros");
        let mut raw = [0u8; 65];
        raw[64] = 27;
        assert!(recover_signer(&digest, &raw).is_err());
    }
}
