//! # Approval Coordinator
//!
//! The off-ledger half of the protocol. Approver B never calls the vault;
//! it needs three things instead:
//!
//! 1. the exact digest to sign for a transfer id,
//! 2. a way to sign it under the same domain-separation prefix the vault
//!    verifies with,
//! 3. a way to hand the signature back so approver A can submit it.
//!
//! The coordinator does those and nothing else. It sees the vault only
//! through [`VaultReader`], so it cannot change vault state, and the digest
//! it hands out is the one the vault *stored* at initiation, never a
//! recomputation.
//!
//! ```text
//!   approver A                coordinator                 approver B
//!   ──────────                ───────────                 ──────────
//!   initiate ──► vault
//!                transfer_record(id) ───── TransferRecord ──►
//!                                                  sign_transfer(key, record)
//!                ◄───────────────────────────── SignatureRecord
//!                check_signature, assemble ──► Approval
//!   complete(Approval) ──► vault
//! ```

use tracing::{debug, info};

use cosign_contracts::{PendingTransfer, VaultReader};
use cosign_protocol::crypto::hash::{self, Hash32};
use cosign_protocol::crypto::keys::{CosignKeypair, RecoverableSignature};
use cosign_protocol::crypto::signatures::{recover_signer, sign_approval};
use cosign_protocol::digest::{signing_digest, TransferId};

use crate::artifacts::{Approval, SignatureRecord, TransferRecord, TransferStatus};
use crate::error::CoordinatorError;

/// Reads a vault and produces approval artifacts for it.
#[derive(Debug)]
pub struct ApprovalCoordinator<R> {
    reader: R,
}

impl<R: VaultReader> ApprovalCoordinator<R> {
    /// Coordinate approvals for the vault behind `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// The underlying vault reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// The canonical digest stored for `id`, if the transfer still needs
    /// approving.
    pub fn digest_to_sign(&self, id: TransferId) -> Result<Hash32, CoordinatorError> {
        Ok(self.pending(id)?.canonical_digest)
    }

    /// Export transfer `id` as an artifact, whatever its status.
    pub fn transfer_record(&self, id: TransferId) -> Result<TransferRecord, CoordinatorError> {
        let transfer = self.lookup(id)?;
        Ok(TransferRecord::from_pending(self.reader.vault_address(), &transfer))
    }

    /// Fetch the digest for `id` and sign it with `keypair`.
    pub fn approve(
        &self,
        keypair: &CosignKeypair,
        id: TransferId,
    ) -> Result<SignatureRecord, CoordinatorError> {
        let digest = self.digest_to_sign(id)?;
        let signature = sign(keypair, &digest)?;
        info!(
            vault = %self.reader.vault_address(),
            id,
            signer = %keypair.address(),
            "transfer approved"
        );
        Ok(SignatureRecord {
            id,
            signer: keypair.address(),
            digest,
            signature,
        })
    }

    fn lookup(&self, id: TransferId) -> Result<PendingTransfer, CoordinatorError> {
        match self.reader.transfer_details(id)? {
            Some(transfer) if transfer.initiated => Ok(transfer),
            _ => Err(CoordinatorError::UnknownTransfer(id)),
        }
    }

    fn pending(&self, id: TransferId) -> Result<PendingTransfer, CoordinatorError> {
        let transfer = self.lookup(id)?;
        if transfer.completed {
            return Err(CoordinatorError::AlreadyCompleted(id));
        }
        Ok(transfer)
    }
}

/// Sign a canonical digest the way the vault expects: prefixed, then signed.
pub fn sign(
    keypair: &CosignKeypair,
    digest: &Hash32,
) -> Result<RecoverableSignature, CoordinatorError> {
    sign_approval(keypair, digest).map_err(|e| CoordinatorError::Signing(e.to_string()))
}

/// Sign an exported transfer record without access to the ledger.
///
/// The record is checked first: its digest must match its own fields, and
/// it must still be pending.
pub fn sign_transfer(
    keypair: &CosignKeypair,
    record: &TransferRecord,
) -> Result<SignatureRecord, CoordinatorError> {
    record.verify_digest()?;
    if record.status == TransferStatus::Completed {
        return Err(CoordinatorError::AlreadyCompleted(record.id));
    }
    let signature = sign(keypair, &record.digest)?;
    info!(
        vault = %record.vault,
        id = record.id,
        signer = %keypair.address(),
        "transfer record signed"
    );
    Ok(SignatureRecord {
        id: record.id,
        signer: keypair.address(),
        digest: record.digest,
        signature,
    })
}

/// Local pre-flight: does the signature recover to the signer the record
/// names?
///
/// This only proves who signed. Whether that signer is the vault's
/// approver B is for the vault to decide.
pub fn check_signature(record: &SignatureRecord) -> Result<(), CoordinatorError> {
    let recovered = recover_signer(&signing_digest(&record.digest), record.signature.as_bytes())?;
    if recovered != record.signer {
        return Err(CoordinatorError::SignerMismatch {
            declared: record.signer,
            recovered,
        });
    }
    debug!(id = record.id, signer = %recovered, "signature record checks out");
    Ok(())
}

/// Pair a transfer with its signature, refusing artifacts that belong to
/// different transfers.
pub fn assemble(
    transfer: &TransferRecord,
    signature: &SignatureRecord,
) -> Result<Approval, CoordinatorError> {
    if transfer.id != signature.id {
        return Err(CoordinatorError::ArtifactMismatch(format!(
            "transfer is {} but signature is for {}",
            transfer.id, signature.id
        )));
    }
    if transfer.digest != signature.digest {
        return Err(CoordinatorError::ArtifactMismatch(format!(
            "transfer {} digest {} differs from signed digest {}",
            transfer.id,
            hash::to_hex(&transfer.digest),
            hash::to_hex(&signature.digest),
        )));
    }
    if transfer.status == TransferStatus::Completed {
        return Err(CoordinatorError::AlreadyCompleted(transfer.id));
    }

    Ok(Approval {
        id: transfer.id,
        signature: signature.signature.clone(),
    })
}
