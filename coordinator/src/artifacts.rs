//! # Off-Ledger Artifacts
//!
//! The JSON documents that travel between the people running the approval
//! flow. Approver A exports a [`TransferRecord`], approver B signs it and
//! returns a [`SignatureRecord`], and the two are recombined into an
//! [`Approval`] for submission.
//!
//! Every byte field is `0x`-prefixed hex, so the documents can be read and
//! pasted by hand:
//!
//! ```json
//! {
//!   "vault": "0x5fbd…",
//!   "id": 0,
//!   "recipient": "0x7099…",
//!   "amount": 5,
//!   "digest": "0x2c6e…",
//!   "status": "pending"
//! }
//! ```
//!
//! Artifacts are untrusted input. Nothing here is believed until it has
//! been checked: [`TransferRecord::verify_digest`] recomputes the digest
//! from the record's own fields, and the coordinator's `check_signature`
//! recovers the real signer of a signature record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use cosign_contracts::PendingTransfer;
use cosign_protocol::crypto::hash::{self, Hash32};
use cosign_protocol::crypto::keys::{Address, RecoverableSignature};
use cosign_protocol::digest::{canonical_transfer_digest, TransferId};

use crate::error::CoordinatorError;

/// Where a transfer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Initiated, waiting for approver B.
    Pending,
    /// Paid out. Terminal.
    Completed,
}

/// A transfer as exported for approver B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// The vault holding the funds.
    pub vault: Address,
    /// Transfer id within the vault.
    pub id: TransferId,
    /// Who gets paid.
    pub recipient: Address,
    /// How much.
    pub amount: u64,
    /// The canonical digest approver B signs.
    #[serde(with = "hash::serde_hex")]
    pub digest: Hash32,
    /// Pending or completed.
    pub status: TransferStatus,
}

impl TransferRecord {
    /// Build the artifact for a stored transfer of `vault`.
    pub fn from_pending(vault: Address, transfer: &PendingTransfer) -> Self {
        Self {
            vault,
            id: transfer.id,
            recipient: transfer.recipient,
            amount: transfer.amount,
            digest: transfer.canonical_digest,
            status: if transfer.completed {
                TransferStatus::Completed
            } else {
                TransferStatus::Pending
            },
        }
    }

    /// Check that `digest` really is the canonical digest of the record's
    /// vault, id, recipient and amount. A signer must call this before
    /// signing anything it did not read from the ledger itself.
    pub fn verify_digest(&self) -> Result<(), CoordinatorError> {
        let expected =
            canonical_transfer_digest(&self.vault, self.id, &self.recipient, self.amount);
        if expected != self.digest {
            return Err(CoordinatorError::ArtifactMismatch(format!(
                "transfer {} carries digest {} but its fields hash to {}",
                self.id,
                hash::to_hex(&self.digest),
                hash::to_hex(&expected),
            )));
        }
        Ok(())
    }
}

/// Approver B's signature over a transfer's digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Transfer id the signature is for.
    pub id: TransferId,
    /// The key that signed.
    pub signer: Address,
    /// The canonical digest that was signed (before prefixing).
    #[serde(with = "hash::serde_hex")]
    pub digest: Hash32,
    /// 65-byte `r ‖ s ‖ v` signature.
    pub signature: RecoverableSignature,
}

/// A matched transfer and signature, ready for the vault's `complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// The transfer to complete.
    pub id: TransferId,
    /// Approver B's signature.
    pub signature: RecoverableSignature,
}

/// Render an artifact as pretty-printed JSON.
pub fn to_json<T: Serialize>(artifact: &T) -> Result<String, CoordinatorError> {
    serde_json::to_string_pretty(artifact).map_err(|e| CoordinatorError::Malformed(e.to_string()))
}

/// Parse an artifact from JSON.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, CoordinatorError> {
    serde_json::from_str(json).map_err(|e| CoordinatorError::Malformed(e.to_string()))
}
