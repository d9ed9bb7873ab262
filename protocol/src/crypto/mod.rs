//! # Cryptographic Primitives
//!
//! Every hash, address and approval signature in the cosign vault flows
//! through here.
//!
//! - **Keccak-256** for digests and addresses.
//! - **secp256k1 ECDSA with recovery** for approvals.
//!
//! Everything is a thin, type-safe wrapper around audited implementations
//! (`k256`, `sha3`). If you're tempted to optimize these functions, please
//! reconsider.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{keccak256, keccak256_multi, Hash32};
pub use keys::{Address, CosignKeypair, RecoverableSignature};
pub use signatures::{recover_signer, sign_approval, verify_signer};
