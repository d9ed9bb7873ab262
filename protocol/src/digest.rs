//! # Canonical Transfer Digests
//!
//! The one function the ledger and the off-ledger signer must agree on,
//! byte for byte.
//!
//! A transfer is approved in two hops:
//!
//! ```text
//! canonical = Keccak256(vault[20] || id[32] || recipient[20] || amount[32])
//! signing   = Keccak256("\x19Ethereum Signed Message:\n32" || canonical)
//! ```
//!
//! The canonical digest is computed once when the transfer is initiated and
//! stored next to it. The signing digest is what approver B actually signs
//! and what the verifier checks. Keeping the two distinct means a signature
//! collected for this protocol can never be replayed as a signature over a
//! raw 32-byte hash somewhere else, and vice versa.
//!
//! Integers are packed as 32-byte big-endian words and addresses as their
//! raw 20 bytes, so the preimage has a fixed 104-byte layout and no two
//! distinct `(vault, id, recipient, amount)` tuples share one.

use crate::config::SIGNED_DIGEST_PREFIX;
use crate::crypto::hash::{keccak256_multi, u64_word, Hash32};
use crate::crypto::keys::Address;

/// Sequential identifier of a transfer within one vault.
pub type TransferId = u64;

/// Compute the canonical digest binding a transfer to its vault.
///
/// Pure and deterministic: the same inputs always give the same digest, and
/// changing any one of them (including the vault address) changes it.
pub fn canonical_transfer_digest(
    vault: &Address,
    id: TransferId,
    recipient: &Address,
    amount: u64,
) -> Hash32 {
    keccak256_multi(&[
        vault.as_bytes(),
        &u64_word(id),
        recipient.as_bytes(),
        &u64_word(amount),
    ])
}

/// Wrap a digest in the signing-context prefix.
///
/// Both the vault (before verifying) and the coordinator (before signing)
/// call this exact function. There is no second implementation anywhere.
pub fn signing_digest(digest: &Hash32) -> Hash32 {
    keccak256_multi(&[SIGNED_DIGEST_PREFIX, digest])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = canonical_transfer_digest(&addr(1), 0, &addr(2), 5);
        let b = canonical_transfer_digest(&addr(1), 0, &addr(2), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_binds_every_field() {
        let base = canonical_transfer_digest(&addr(1), 0, &addr(2), 5);
        assert_ne!(base, canonical_transfer_digest(&addr(9), 0, &addr(2), 5));
        assert_ne!(base, canonical_transfer_digest(&addr(1), 1, &addr(2), 5));
        assert_ne!(base, canonical_transfer_digest(&addr(1), 0, &addr(3), 5));
        assert_ne!(base, canonical_transfer_digest(&addr(1), 0, &addr(2), 6));
    }

    #[test]
    fn test_digest_matches_packed_layout() {
        let mut preimage = Vec::with_capacity(104);
        preimage.extend_from_slice(addr(1).as_bytes());
        preimage.extend_from_slice(&u64_word(7));
        preimage.extend_from_slice(addr(2).as_bytes());
        preimage.extend_from_slice(&u64_word(1_000));
        assert_eq!(preimage.len(), 104);
        assert_eq!(
            canonical_transfer_digest(&addr(1), 7, &addr(2), 1_000),
            keccak256(&preimage)
        );
    }

    #[test]
    fn test_signing_digest_differs_from_raw() {
        let raw = canonical_transfer_digest(&addr(1), 0, &addr(2), 5);
        let wrapped = signing_digest(&raw);
        assert_ne!(raw, wrapped);
        // Wrapping is not idempotent either: a signature over the wrapped
        // form can't be fed back in as a "raw" digest.
        assert_ne!(wrapped, signing_digest(&wrapped));
    }

    #[test]
    fn test_signing_digest_known_vector() {
        // personal_sign over 32 zero bytes, as produced by any EIP-191 wallet.
        let wrapped = signing_digest(&[0u8; 32]);
        let mut preimage = b"\x19Ethereum Signed Message:\n32".to_vec();
        preimage.extend_from_slice(&[0u8; 32]);
        assert_eq!(wrapped, keccak256(&preimage));
    }
}
