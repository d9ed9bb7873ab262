//! # Protocol Configuration & Constants
//!
//! Every magic number in the cosign vault lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong.
//!
//! Two groups of values matter more than the rest: the signing prefix and
//! the acceptance code. Both are shared between the on-ledger verifier and
//! the off-ledger coordinator, and a single byte of drift between the two
//! makes every approval fail. Change them in one place or not at all.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string of the approval protocol.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Protocol fingerprint, logged by the `cosign` binary at startup.
pub const PROTOCOL_FINGERPRINT: &str = "ALAS-COSIGN-2026";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Secret key length in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Recoverable signature length: `r (32) || s (32) || v (1)`.
pub const SIGNATURE_LENGTH: usize = 65;

/// Identity (address) length in bytes. The low 20 bytes of the Keccak-256
/// hash of the uncompressed public key.
pub const ADDRESS_LENGTH: usize = 20;

/// Hash output length in bytes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Width of an integer field inside the canonical digest preimage. Ids and
/// amounts are left-padded big-endian words, so a `u64` today can grow into
/// a wider integer later without changing any digest.
pub const DIGEST_WORD_LENGTH: usize = 32;

/// Half of the secp256k1 group order, big-endian. Signatures with `s` above
/// this value are the malleable twin of a valid low-`s` signature and are
/// rejected by the recovery path.
pub const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

// ---------------------------------------------------------------------------
// Signing Context
// ---------------------------------------------------------------------------

/// Domain-separation prefix mixed in front of a canonical digest before it
/// is signed. This is the EIP-191 "personal message" header for a 32-byte
/// payload, which means any standard wallet can produce approver B's
/// signature without custom tooling, and a signature over the wrapped form
/// can never be mistaken for a signature over the raw digest.
pub const SIGNED_DIGEST_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Acceptance code a programmable identity returns when it vouches for a
/// signature. Anything else, including a fault, is a rejection.
pub const SIGNATURE_ACCEPTED: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

/// Rejection code returned by the vault's own signature delegate.
pub const SIGNATURE_REJECTED: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Maximum depth of nested ledger calls. A receive hook that re-enters a
/// program counts as one level. Past this depth the call faults instead of
/// recursing forever.
pub const MAX_CALL_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Renders a 4-byte signature check code for logs.
pub fn code_name(code: [u8; 4]) -> String {
    match code {
        SIGNATURE_ACCEPTED => "accepted".to_string(),
        SIGNATURE_REJECTED => "rejected".to_string(),
        other => format!("unknown(0x{})", hex::encode(other)),
    }
}
