//! # Cosign Coordinator
//!
//! Off-ledger tooling for the two-approver vault: the
//! [`ApprovalCoordinator`] that turns a vault's stored transfers into
//! signable artifacts, the artifacts themselves, and the helpers that check
//! and recombine them for submission.
//!
//! The `cosign` binary in this crate is a thin command-line wrapper over
//! these pieces.

pub mod artifacts;
pub mod coordinator;
pub mod error;

pub use artifacts::{Approval, SignatureRecord, TransferRecord, TransferStatus};
pub use coordinator::{assemble, check_signature, sign, sign_transfer, ApprovalCoordinator};
pub use error::CoordinatorError;
