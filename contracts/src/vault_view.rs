//! Read-only access to a vault.
//!
//! Off-ledger tooling only ever needs to *look* at a vault: which transfers
//! exist, what digest each one wants signed, what the balance is. The
//! [`VaultReader`] trait is that surface and nothing more, so code built on
//! it cannot mutate vault state even by accident.

use cosign_protocol::crypto::hash::Hash32;
use cosign_protocol::crypto::keys::Address;
use cosign_protocol::digest::TransferId;
use cosign_protocol::ledger::Ledger;

use crate::custodian::{PendingTransfer, VaultError, VaultHandle};

/// The read interface of a custodian vault.
pub trait VaultReader {
    /// The vault's account.
    fn vault_address(&self) -> Address;

    /// Current native balance.
    fn balance(&self) -> u64;

    /// The stored transfer record, if `id` was ever initiated.
    fn transfer_details(&self, id: TransferId) -> Result<Option<PendingTransfer>, VaultError>;

    /// The canonical digest stored for `id`.
    fn digest_to_sign(&self, id: TransferId) -> Result<Hash32, VaultError>;

    /// The id the next initiation will get.
    fn next_transfer_id(&self) -> Result<TransferId, VaultError>;
}

/// A vault seen through a shared borrow of the ledger.
#[derive(Clone, Copy)]
pub struct VaultView<'a> {
    ledger: &'a Ledger,
    handle: VaultHandle,
}

impl<'a> VaultView<'a> {
    /// View `handle` over `ledger`.
    pub fn new(ledger: &'a Ledger, handle: VaultHandle) -> Self {
        Self { ledger, handle }
    }

    /// The ledger being viewed.
    pub fn ledger(&self) -> &'a Ledger {
        self.ledger
    }
}

impl std::fmt::Debug for VaultView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultView")
            .field("vault", &self.handle.address())
            .finish_non_exhaustive()
    }
}

impl VaultReader for VaultView<'_> {
    fn vault_address(&self) -> Address {
        self.handle.address()
    }

    fn balance(&self) -> u64 {
        self.handle.balance(self.ledger)
    }

    fn transfer_details(&self, id: TransferId) -> Result<Option<PendingTransfer>, VaultError> {
        self.handle.transfer_details(self.ledger, id)
    }

    fn digest_to_sign(&self, id: TransferId) -> Result<Hash32, VaultError> {
        self.handle.digest_to_sign(self.ledger, id)
    }

    fn next_transfer_id(&self) -> Result<TransferId, VaultError> {
        self.handle.next_transfer_id(self.ledger)
    }
}
