//! # Programs and Call Contexts
//!
//! A [`Program`] is the code behind a programmable account. The ledger calls
//! into it at exactly two points:
//!
//! - **`is_valid_signature`** — a read-only "do you vouch for this signature
//!   over this digest?" query. This is how a non-keypair identity (a
//!   multisig, another vault) acts as an approver.
//! - **`on_receive`** — runs whenever native value lands in the account via
//!   a transfer. The hook gets a mutable [`CallContext`] and may call back
//!   into any program on the ledger, including the one that is paying it.
//!   Programs that move value must be written with that in mind.
//!
//! Everything else a program exposes is an ordinary Rust function that
//! receives a `CallContext` from [`Ledger::transact`].

use serde::Serialize;
use thiserror::Error;

use super::{Ledger, LedgerError};
use crate::crypto::hash::Hash32;
use crate::crypto::keys::Address;

/// Why a program call did not return normally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProgramFault {
    /// The program does not implement the requested entry point.
    #[error("entry point not supported: {0}")]
    Unsupported(&'static str),

    /// The program rejected the call.
    #[error("reverted: {0}")]
    Reverted(String),
}

/// Code attached to a programmable account.
pub trait Program: Send + Sync {
    /// Short name, for logs and `Debug` output.
    fn name(&self) -> &'static str;

    /// Delegate-style signature check. Returns a 4-byte code; only
    /// [`crate::config::SIGNATURE_ACCEPTED`] counts as a yes.
    fn is_valid_signature(
        &self,
        _ledger: &Ledger,
        _this: &Address,
        _digest: &Hash32,
        _signature: &[u8],
    ) -> Result<[u8; 4], ProgramFault> {
        Err(ProgramFault::Unsupported("is_valid_signature"))
    }

    /// Called after `ctx.value()` has been credited to `ctx.this()`.
    /// Returning an error reverts the transfer and everything the hook did.
    fn on_receive(&self, _ctx: &mut CallContext<'_>) -> Result<(), ProgramFault> {
        Ok(())
    }
}

/// The view a program gets of the call it is executing.
///
/// `sender` is attested by the ledger: a program can trust it the way a
/// contract trusts `msg.sender`.
pub struct CallContext<'a> {
    ledger: &'a mut Ledger,
    sender: Address,
    this: Address,
    value: u64,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(ledger: &'a mut Ledger, sender: Address, this: Address, value: u64) -> Self {
        Self {
            ledger,
            sender,
            this,
            value,
        }
    }

    /// The attested caller.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// The account whose program is executing.
    pub fn this(&self) -> Address {
        self.this
    }

    /// Native value attached to this call (already credited to `this`).
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Current native balance of `this`.
    pub fn balance(&self) -> u64 {
        self.ledger.balance_of(&self.this)
    }

    /// Read-only access to the whole ledger.
    pub fn ledger(&self) -> &Ledger {
        &*self.ledger
    }

    /// Mutable access to the ledger, for calls out of this program.
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut *self.ledger
    }

    /// Read a storage slot of `this`.
    pub fn storage_get(&self, key: &[u8]) -> Option<&[u8]> {
        self.ledger.storage_get(&self.this, key)
    }

    /// Write a storage slot of `this`. Visible immediately to any nested
    /// call, including re-entrant ones.
    pub fn storage_set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let this = self.this;
        self.ledger.storage_set(&this, key, value);
    }

    /// Append an event to the ledger log under `this`.
    pub fn emit<E: Serialize>(&mut self, name: &str, event: &E) -> Result<(), LedgerError> {
        let data =
            serde_json::to_value(event).map_err(|e| LedgerError::Encoding(e.to_string()))?;
        let this = self.this;
        self.ledger.push_log(this, name, data);
        Ok(())
    }

    /// Send native value from `this` to `to`, running `to`'s receive hook.
    ///
    /// Control leaves this program for the duration of the hook. Any state
    /// the hook must not be able to exploit has to be written to storage
    /// *before* calling this.
    pub fn transfer(&mut self, to: &Address, amount: u64) -> Result<(), LedgerError> {
        let this = self.this;
        self.ledger.send(&this, to, amount)
    }
}
