//! # Cosign Vault Programs
//!
//! Ledger-resident code for the cosign custody scheme:
//!
//! - **Custodian Vault** — holds value and releases it only when approver A
//!   calls in *and* presents approver B's signature over the transfer's
//!   canonical digest. Replay-safe, atomic, and immune to re-entrant
//!   completion.
//! - **Vault View** — the read-only face of a vault, which is all that
//!   off-ledger tooling gets to depend on.
//! - **Owner Wallet** — a programmable identity that vouches for its owner
//!   key's signatures, for when approver B should not be a raw key.
//!
//! ## Design Principles
//!
//! 1. Every state change is one [`Ledger::transact`] call: it commits fully
//!    or not at all. There is no half-initiated transfer.
//! 2. State that must survive a re-entrant call is written to storage before
//!    control leaves the vault.
//! 3. Signature checks fail closed. Anything short of a clean verification
//!    is a rejection.
//!
//! [`Ledger::transact`]: cosign_protocol::ledger::Ledger::transact

pub mod custodian;
pub mod owner_wallet;
pub mod vault_view;

pub use custodian::{
    Approvers, CustodianVault, ErrorKind, PendingTransfer, VaultError, VaultEvent, VaultHandle,
};
pub use owner_wallet::OwnerWallet;
pub use vault_view::{VaultReader, VaultView};
