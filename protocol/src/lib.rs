// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cosign Protocol — Core Library
//!
//! Everything the two-approver vault needs below the contract itself: the
//! digest both approvers agree on, the signatures that prove approval, the
//! verifier that judges them, and an in-memory ledger to run it all on.
//!
//! The protocol takes a pragmatic stance: secp256k1 with public-key recovery
//! for approvals (because every wallet on earth already speaks it), Keccak-256
//! for hashing, and the EIP-191 personal-message prefix as the signing
//! context (so approver B can sign with whatever wallet they already have).
//!
//! ## Architecture
//!
//! - **config** — Protocol constants. Every magic number lives here.
//! - **crypto** — Keccak-256, secp256k1 keypairs, recoverable signatures.
//! - **digest** — The canonical transfer digest and its signing context.
//! - **ledger** — Atomic calls, value transfer with receive hooks, storage, events.
//! - **verifier** — Key-or-program approval checks. Fails closed.
//!
//! ## Design Philosophy
//!
//! 1. One implementation of the signing context, shared by signer and verifier.
//! 2. No unsafe code. Anywhere.
//! 3. Verification never panics and never errors: it answers yes or no.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod digest;
pub mod ledger;
pub mod verifier;

pub use digest::{canonical_transfer_digest, signing_digest, TransferId};
