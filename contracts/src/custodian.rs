//! # Custodian Vault
//!
//! A value store that pays out only when two approvers agree. The two
//! approvals arrive by different roads:
//!
//! 1. **Approver A** calls [`VaultHandle::initiate`] directly. The ledger
//!    attests the caller, so the call itself is the approval.
//! 2. **Approver B** never touches the ledger. It signs the transfer's
//!    canonical digest off-line, and approver A submits that signature with
//!    [`VaultHandle::complete`].
//!
//! Each transfer moves through `UNINITIATED → PENDING → COMPLETED` exactly
//! once. The canonical digest is computed at initiation and stored, so the
//! signature approver B produced is checked against the very bytes it was
//! shown, not a recomputation.
//!
//! ## Re-entrancy
//!
//! Paying the recipient runs its receive hook, and that hook may call back
//! into the vault with approver A's identity (a recipient program can be
//! anything). `complete` therefore writes `completed = true` to storage
//! *before* the transfer leaves. A re-entrant `complete` for the same id
//! sees the flag and fails with [`VaultError::AlreadyCompleted`].
//!
//! ## Storage layout
//!
//! All state lives in the vault account's storage, bincode-encoded:
//!
//! | Key                     | Value              |
//! |-------------------------|--------------------|
//! | `approvers`             | [`Approvers`]      |
//! | `next_transfer_id`      | `u64`              |
//! | `transfer/<id as u64be>`| [`PendingTransfer`]|

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use cosign_protocol::config::{SIGNATURE_ACCEPTED, SIGNATURE_REJECTED};
use cosign_protocol::crypto::hash::{self, Hash32};
use cosign_protocol::crypto::keys::Address;
use cosign_protocol::digest::{canonical_transfer_digest, signing_digest, TransferId};
use cosign_protocol::ledger::{CallContext, Ledger, LedgerError, Program, ProgramFault};
use cosign_protocol::verifier::is_valid_approval;

use crate::vault_view::VaultView;

/// Program name the vault registers under.
pub const PROGRAM_NAME: &str = "custodian-vault";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Broad category of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller is not allowed to do this.
    Authorization,
    /// An argument is malformed.
    Validation,
    /// The transfer is in the wrong state for this operation.
    State,
    /// The vault cannot cover the amount.
    Balance,
    /// Approver B's signature did not verify.
    Signature,
    /// The ledger or vault storage failed underneath us.
    Ledger,
}

/// Errors returned by vault operations. Every one of them is an atomic
/// rejection: the ledger restores its pre-call state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VaultError {
    /// Only approver A may initiate or complete transfers.
    #[error("unauthorized: {caller} is not approver A")]
    Unauthorized {
        /// The attested caller.
        caller: Address,
    },

    /// The approver pair is unusable.
    #[error("invalid approvers: {0}")]
    InvalidApprovers(&'static str),

    /// Funds cannot be sent to the null identity.
    #[error("invalid recipient: the null address cannot receive transfers")]
    InvalidRecipient,

    /// Transfers must move a positive amount.
    #[error("invalid amount: must be greater than zero")]
    InvalidAmount,

    /// No transfer with this id was ever initiated.
    #[error("transfer {0} has not been initiated")]
    NotInitiated(TransferId),

    /// The transfer already paid out.
    #[error("transfer {0} is already completed")]
    AlreadyCompleted(TransferId),

    /// The vault balance does not cover the amount.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount the operation needs.
        required: u64,
        /// Vault balance at the time of the call.
        available: u64,
    },

    /// The submitted signature is not approver B's approval of this transfer.
    #[error("signature for transfer {0} is not a valid approval by approver B")]
    InvalidSignature(TransferId),

    /// There is no vault at this address.
    #[error("no custodian vault deployed at {0}")]
    NotDeployed(Address),

    /// Vault storage held bytes we could not decode, or vice versa.
    #[error("vault storage error: {0}")]
    Storage(String),

    /// The ledger rejected a primitive operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl VaultError {
    /// The error's category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Unauthorized { .. } => ErrorKind::Authorization,
            VaultError::InvalidApprovers(_)
            | VaultError::InvalidRecipient
            | VaultError::InvalidAmount => ErrorKind::Validation,
            VaultError::NotInitiated(_)
            | VaultError::AlreadyCompleted(_)
            | VaultError::NotDeployed(_) => ErrorKind::State,
            VaultError::InsufficientBalance { .. } => ErrorKind::Balance,
            VaultError::InvalidSignature(_) => ErrorKind::Signature,
            VaultError::Storage(_) | VaultError::Ledger(_) => ErrorKind::Ledger,
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The two identities a vault answers to. Fixed at deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approvers {
    /// Initiates and completes transfers by calling the vault.
    pub approver_a: Address,
    /// Approves transfers off-line by signing their digests.
    pub approver_b: Address,
}

impl Approvers {
    /// Validate an approver pair: both non-null, and distinct.
    pub fn new(approver_a: Address, approver_b: Address) -> Result<Self, VaultError> {
        if approver_a.is_zero() || approver_b.is_zero() {
            return Err(VaultError::InvalidApprovers("approvers must not be the null address"));
        }
        if approver_a == approver_b {
            return Err(VaultError::InvalidApprovers("approvers must be distinct"));
        }
        Ok(Self {
            approver_a,
            approver_b,
        })
    }
}

/// A transfer record. Created by `initiate`, flipped once by `complete`,
/// never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    /// Sequential id, unique within the vault.
    pub id: TransferId,
    /// Who gets paid.
    pub recipient: Address,
    /// How much, in the ledger's native unit.
    pub amount: u64,
    /// `Keccak256(vault ‖ id ‖ recipient ‖ amount)`, computed at initiation.
    #[serde(with = "hash::serde_hex")]
    pub canonical_digest: Hash32,
    /// Always `true` for a stored record.
    pub initiated: bool,
    /// Set once, right before the payout leaves the vault.
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events the vault appends to the ledger log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// Approver A opened a transfer.
    TransferInitiated {
        /// The new transfer's id.
        id: TransferId,
        /// Who will be paid.
        recipient: Address,
        /// How much.
        amount: u64,
        /// The digest approver B must sign.
        #[serde(with = "hash::serde_hex")]
        canonical_digest: Hash32,
    },
    /// Both approvals were presented and the funds left.
    TransferCompleted {
        /// The transfer's id.
        id: TransferId,
        /// Who was paid.
        recipient: Address,
        /// How much.
        amount: u64,
    },
    /// Value arrived, by `deposit` or by a plain transfer.
    Deposit {
        /// Who sent it.
        source: Address,
        /// How much.
        amount: u64,
    },
}

impl VaultEvent {
    /// Log name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::TransferInitiated { .. } => "TransferInitiated",
            VaultEvent::TransferCompleted { .. } => "TransferCompleted",
            VaultEvent::Deposit { .. } => "Deposit",
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

mod slots {
    use cosign_protocol::digest::TransferId;

    pub const APPROVERS: &[u8] = b"approvers";
    pub const NEXT_TRANSFER_ID: &[u8] = b"next_transfer_id";

    pub fn transfer(id: TransferId) -> Vec<u8> {
        let mut key = b"transfer/".to_vec();
        key.extend_from_slice(&id.to_be_bytes());
        key
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, VaultError> {
    bincode::deserialize(bytes).map_err(|e| VaultError::Storage(e.to_string()))
}

fn read_slot<T: DeserializeOwned>(
    ledger: &Ledger,
    vault: &Address,
    key: &[u8],
) -> Result<Option<T>, VaultError> {
    ledger.storage_get(vault, key).map(decode::<T>).transpose()
}

fn write_slot<T: Serialize>(
    ctx: &mut CallContext<'_>,
    key: Vec<u8>,
    value: &T,
) -> Result<(), VaultError> {
    let bytes = bincode::serialize(value).map_err(|e| VaultError::Storage(e.to_string()))?;
    ctx.storage_set(key, bytes);
    Ok(())
}

fn load_approvers(ledger: &Ledger, vault: &Address) -> Result<Approvers, VaultError> {
    read_slot(ledger, vault, slots::APPROVERS)?.ok_or(VaultError::NotDeployed(*vault))
}

fn load_next_id(ledger: &Ledger, vault: &Address) -> Result<TransferId, VaultError> {
    Ok(read_slot(ledger, vault, slots::NEXT_TRANSFER_ID)?.unwrap_or(0))
}

fn load_transfer(
    ledger: &Ledger,
    vault: &Address,
    id: TransferId,
) -> Result<Option<PendingTransfer>, VaultError> {
    read_slot(ledger, vault, &slots::transfer(id))
}

fn emit(ctx: &mut CallContext<'_>, event: &VaultEvent) -> Result<(), VaultError> {
    ctx.emit(event.name(), event)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// The vault's code. Stateless: everything it knows is in the storage of
/// the account it runs on.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustodianVault;

impl Program for CustodianVault {
    fn name(&self) -> &'static str {
        PROGRAM_NAME
    }

    /// Lets the vault itself serve as approver B of another vault: it vouches
    /// for whatever its own approver B vouches for.
    fn is_valid_signature(
        &self,
        ledger: &Ledger,
        this: &Address,
        digest: &Hash32,
        signature: &[u8],
    ) -> Result<[u8; 4], ProgramFault> {
        let approvers =
            load_approvers(ledger, this).map_err(|e| ProgramFault::Reverted(e.to_string()))?;
        Ok(signature_code(ledger, &approvers, digest, signature))
    }

    fn on_receive(&self, ctx: &mut CallContext<'_>) -> Result<(), ProgramFault> {
        record_deposit(ctx).map_err(|e| ProgramFault::Reverted(e.to_string()))
    }
}

fn signature_code(
    ledger: &Ledger,
    approvers: &Approvers,
    hash: &Hash32,
    signature: &[u8],
) -> [u8; 4] {
    if is_valid_approval(ledger, &approvers.approver_b, &signing_digest(hash), signature) {
        SIGNATURE_ACCEPTED
    } else {
        SIGNATURE_REJECTED
    }
}

fn initialize(ctx: &mut CallContext<'_>, approvers: &Approvers) -> Result<(), VaultError> {
    let this = ctx.this();
    if approvers.approver_a == this || approvers.approver_b == this {
        return Err(VaultError::InvalidApprovers("a vault cannot be its own approver"));
    }
    write_slot(ctx, slots::APPROVERS.to_vec(), approvers)?;
    write_slot(ctx, slots::NEXT_TRANSFER_ID.to_vec(), &0u64)
}

fn require_approver_a(ctx: &CallContext<'_>) -> Result<Approvers, VaultError> {
    let approvers = load_approvers(ctx.ledger(), &ctx.this())?;
    if ctx.sender() != approvers.approver_a {
        return Err(VaultError::Unauthorized {
            caller: ctx.sender(),
        });
    }
    Ok(approvers)
}

fn initiate_transfer(
    ctx: &mut CallContext<'_>,
    recipient: Address,
    amount: u64,
) -> Result<TransferId, VaultError> {
    require_approver_a(ctx)?;

    // A self-payment would close the record without moving funds.
    if recipient.is_zero() || recipient == ctx.this() {
        return Err(VaultError::InvalidRecipient);
    }
    if amount == 0 {
        return Err(VaultError::InvalidAmount);
    }
    let available = ctx.balance();
    if amount > available {
        return Err(VaultError::InsufficientBalance {
            required: amount,
            available,
        });
    }

    let vault = ctx.this();
    let id = load_next_id(ctx.ledger(), &vault)?;
    let next = id
        .checked_add(1)
        .ok_or(VaultError::Storage("transfer id space exhausted".into()))?;

    let record = PendingTransfer {
        id,
        recipient,
        amount,
        canonical_digest: canonical_transfer_digest(&vault, id, &recipient, amount),
        initiated: true,
        completed: false,
    };
    write_slot(ctx, slots::transfer(id), &record)?;
    write_slot(ctx, slots::NEXT_TRANSFER_ID.to_vec(), &next)?;

    emit(
        ctx,
        &VaultEvent::TransferInitiated {
            id,
            recipient,
            amount,
            canonical_digest: record.canonical_digest,
        },
    )?;

    info!(
        %vault,
        id,
        %recipient,
        amount,
        digest = %hash::to_hex(&record.canonical_digest),
        "transfer initiated"
    );
    Ok(id)
}

fn complete_transfer(
    ctx: &mut CallContext<'_>,
    id: TransferId,
    signature: &[u8],
) -> Result<(), VaultError> {
    let approvers = require_approver_a(ctx)?;
    let vault = ctx.this();

    let mut record = match load_transfer(ctx.ledger(), &vault, id)? {
        Some(record) if record.initiated => record,
        _ => return Err(VaultError::NotInitiated(id)),
    };
    if record.completed {
        return Err(VaultError::AlreadyCompleted(id));
    }
    let available = ctx.balance();
    if available < record.amount {
        return Err(VaultError::InsufficientBalance {
            required: record.amount,
            available,
        });
    }

    let context_digest = signing_digest(&record.canonical_digest);
    if !is_valid_approval(ctx.ledger(), &approvers.approver_b, &context_digest, signature) {
        return Err(VaultError::InvalidSignature(id));
    }

    // Flag first: the transfer below hands control to the recipient.
    record.completed = true;
    write_slot(ctx, slots::transfer(id), &record)?;
    ctx.transfer(&record.recipient, record.amount)?;

    emit(
        ctx,
        &VaultEvent::TransferCompleted {
            id,
            recipient: record.recipient,
            amount: record.amount,
        },
    )?;

    info!(%vault, id, recipient = %record.recipient, amount = record.amount, "transfer completed");
    Ok(())
}

fn record_deposit(ctx: &mut CallContext<'_>) -> Result<(), VaultError> {
    let source = ctx.sender();
    let amount = ctx.value();
    emit(ctx, &VaultEvent::Deposit { source, amount })?;
    debug!(vault = %ctx.this(), %source, amount, "deposit received");
    Ok(())
}

fn rejected(operation: &'static str, vault: &Address, err: VaultError) -> VaultError {
    debug!(%vault, operation, kind = ?err.kind(), error = %err, "vault call rejected");
    err
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A deployed vault, addressed by its account.
///
/// The handle holds no state of its own. Mutating operations take the ledger
/// mutably and run as one atomic call; reads take it shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VaultHandle {
    address: Address,
}

impl VaultHandle {
    /// Deploy a new vault owned by `approver_a` and `approver_b`.
    ///
    /// Deployment and initialization are one atomic call: if the approvers
    /// are rejected, no program is left behind.
    pub fn deploy(
        ledger: &mut Ledger,
        deployer: &Address,
        approver_a: Address,
        approver_b: Address,
    ) -> Result<Self, VaultError> {
        let approvers = Approvers::new(approver_a, approver_b)?;

        let address = ledger.transact(deployer, deployer, 0, |ctx| -> Result<Address, VaultError> {
            let address = ctx.ledger_mut().deploy(deployer, Arc::new(CustodianVault))?;
            ctx.ledger_mut()
                .transact(deployer, &address, 0, |inner| initialize(inner, &approvers))?;
            Ok(address)
        })?;

        info!(vault = %address, %deployer, %approver_a, %approver_b, "custodian vault deployed");
        Ok(Self { address })
    }

    /// Attach to an existing vault, checking that one is actually there.
    pub fn attach(ledger: &Ledger, address: Address) -> Result<Self, VaultError> {
        match ledger.program_at(&address) {
            Some(program) if program.name() == PROGRAM_NAME => {
                load_approvers(ledger, &address)?;
                Ok(Self { address })
            }
            _ => Err(VaultError::NotDeployed(address)),
        }
    }

    /// The vault's account.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Open a transfer of `amount` to `recipient`. Approver A only.
    ///
    /// Returns the transfer id. A failed call does not consume an id.
    pub fn initiate(
        &self,
        ledger: &mut Ledger,
        caller: &Address,
        recipient: &Address,
        amount: u64,
    ) -> Result<TransferId, VaultError> {
        let recipient = *recipient;
        ledger
            .transact(caller, &self.address, 0, |ctx| initiate_transfer(ctx, recipient, amount))
            .map_err(|e| rejected("initiate", &self.address, e))
    }

    /// Complete transfer `id` with approver B's `signature` over its digest.
    /// Approver A only.
    pub fn complete(
        &self,
        ledger: &mut Ledger,
        caller: &Address,
        id: TransferId,
        signature: &[u8],
    ) -> Result<(), VaultError> {
        ledger
            .transact(caller, &self.address, 0, |ctx| complete_transfer(ctx, id, signature))
            .map_err(|e| rejected("complete", &self.address, e))
    }

    /// Move `amount` from `source` into the vault. Anyone may deposit.
    pub fn deposit(
        &self,
        ledger: &mut Ledger,
        source: &Address,
        amount: u64,
    ) -> Result<(), VaultError> {
        ledger
            .transact(source, &self.address, amount, record_deposit)
            .map_err(|e| rejected("deposit", &self.address, e))
    }

    /// Current native balance.
    pub fn balance(&self, ledger: &Ledger) -> u64 {
        ledger.balance_of(&self.address)
    }

    /// The stored record for `id`, if it was ever initiated.
    pub fn transfer_details(
        &self,
        ledger: &Ledger,
        id: TransferId,
    ) -> Result<Option<PendingTransfer>, VaultError> {
        load_transfer(ledger, &self.address, id)
    }

    /// The canonical digest approver B must sign for `id`, as stored at
    /// initiation.
    pub fn digest_to_sign(&self, ledger: &Ledger, id: TransferId) -> Result<Hash32, VaultError> {
        match load_transfer(ledger, &self.address, id)? {
            Some(record) if record.initiated => Ok(record.canonical_digest),
            _ => Err(VaultError::NotInitiated(id)),
        }
    }

    /// Delegate-style check: does approver B vouch for `signature` over
    /// `hash`? `hash` is wrapped with the signing prefix before checking.
    pub fn is_valid_signature(&self, ledger: &Ledger, hash: &Hash32, signature: &[u8]) -> [u8; 4] {
        match load_approvers(ledger, &self.address) {
            Ok(approvers) => signature_code(ledger, &approvers, hash, signature),
            Err(_) => SIGNATURE_REJECTED,
        }
    }

    /// The vault's approver pair.
    pub fn approvers(&self, ledger: &Ledger) -> Result<Approvers, VaultError> {
        load_approvers(ledger, &self.address)
    }

    /// The id the next successful `initiate` will return.
    pub fn next_transfer_id(&self, ledger: &Ledger) -> Result<TransferId, VaultError> {
        load_next_id(ledger, &self.address)
    }

    /// Every event this vault emitted, oldest first.
    pub fn events(&self, ledger: &Ledger) -> Result<Vec<VaultEvent>, VaultError> {
        ledger
            .logs_from(&self.address)
            .map(|entry| {
                serde_json::from_value(entry.data.clone()).map_err(|e| {
                    VaultError::Storage(format!("undecodable {} event: {e}", entry.name))
                })
            })
            .collect()
    }

    /// A read-only view of this vault over `ledger`.
    pub fn view<'a>(&self, ledger: &'a Ledger) -> VaultView<'a> {
        VaultView::new(ledger, *self)
    }
}
