//! Errors raised by the off-ledger side of the approval flow.

use thiserror::Error;

use cosign_contracts::VaultError;
use cosign_protocol::crypto::keys::Address;
use cosign_protocol::crypto::signatures::SignatureError;
use cosign_protocol::digest::TransferId;

/// Errors from the approval coordinator and its artifacts.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The vault has no record of this transfer.
    #[error("transfer {0} has not been initiated")]
    UnknownTransfer(TransferId),

    /// The transfer already paid out; there is nothing left to approve.
    #[error("transfer {0} is already completed")]
    AlreadyCompleted(TransferId),

    /// Two artifacts, or an artifact and its own fields, disagree.
    #[error("artifact mismatch: {0}")]
    ArtifactMismatch(String),

    /// A signature artifact was not signed by the identity it names.
    #[error("signature was produced by {recovered}, not by declared signer {declared}")]
    SignerMismatch {
        /// The signer the artifact claims.
        declared: Address,
        /// The signer the signature recovers to.
        recovered: Address,
    },

    /// An artifact could not be parsed or encoded.
    #[error("malformed artifact: {0}")]
    Malformed(String),

    /// The signing key failed to produce a signature.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The signature bytes do not recover to anyone.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// The vault could not be read.
    #[error(transparent)]
    Vault(#[from] VaultError),
}
