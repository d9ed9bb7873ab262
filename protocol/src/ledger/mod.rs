//! # In-Memory Ledger
//!
//! The execution environment programs run on. It supplies the four
//! primitives the vault takes for granted and nothing more:
//!
//! - **Atomic calls** — [`Ledger::transact`] snapshots the world, runs the
//!   call, and restores the snapshot if the call returns an error. Nested
//!   calls snapshot independently, so an inner failure that the outer call
//!   handles does not poison the outer call.
//! - **Sender attestation** — the `sender` a program sees in its
//!   [`CallContext`] is whatever the ledger was told, and programs trust it.
//! - **Native value transfer** — [`Ledger::send`] and
//!   [`CallContext::transfer`] move value and run the recipient's
//!   `on_receive` hook, which may re-enter the caller.
//! - **Event log** — append-only, rolled back together with state.
//!
//! Calls take `&mut Ledger`, so they are totally ordered by construction:
//! no two calls interleave and each sees everything committed before it.

pub mod program;
pub mod state;

use std::cell::Cell;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::MAX_CALL_DEPTH;
use crate::crypto::hash::{keccak256_multi, u64_word};
use crate::crypto::keys::Address;

pub use program::{CallContext, Program, ProgramFault};
pub use state::{AccountState, WorldState};

/// Errors raised by the ledger itself, as opposed to by a program.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The paying account does not hold enough native value.
    #[error("insufficient funds in {account}: balance {balance}, required {required}")]
    InsufficientFunds {
        /// The paying account.
        account: Address,
        /// Its balance at the time of the call.
        balance: u64,
        /// The amount that was requested.
        required: u64,
    },

    /// Crediting the account would overflow its balance.
    #[error("balance overflow in {account}")]
    BalanceOverflow {
        /// The account being credited.
        account: Address,
    },

    /// A program is already deployed at the derived address.
    #[error("address already in use: {0}")]
    AddressInUse(Address),

    /// Too many nested calls.
    #[error("call depth exceeded (max {0})")]
    CallDepthExceeded(usize),

    /// A program hook faulted.
    #[error("program at {address} faulted: {reason}")]
    ProgramFault {
        /// The program's account.
        address: Address,
        /// The fault, rendered.
        reason: String,
    },

    /// An event or storage value could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// One event emitted by a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The program account that emitted it.
    pub emitter: Address,
    /// Event name.
    pub name: String,
    /// Event payload.
    pub data: serde_json::Value,
}

/// Restore point for a call.
struct Snapshot {
    state: WorldState,
    log_len: usize,
}

/// The ledger: world state, event log, and the call machinery on top.
#[derive(Clone, Default)]
pub struct Ledger {
    state: WorldState,
    logs: Vec<LogEntry>,
    depth: usize,
    static_depth: Cell<usize>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // -- genesis ------------------------------------------------------------

    /// Credit an account at genesis. Not a transfer: no hook runs and no
    /// sender is debited.
    pub fn credit_genesis(&mut self, address: &Address, amount: u64) -> Result<(), LedgerError> {
        self.state.credit(address, amount)?;
        debug!(account = %address, amount, "genesis credit");
        Ok(())
    }

    /// Deploy a program. The address is derived from the deployer and its
    /// deployment nonce, so the same deployer never gets the same address
    /// twice.
    pub fn deploy(
        &mut self,
        deployer: &Address,
        program: Arc<dyn Program>,
    ) -> Result<Address, LedgerError> {
        let nonce = self.state.get(deployer).map(|a| a.nonce).unwrap_or(0);
        let address = Address::from_hash(&keccak256_multi(&[
            deployer.as_bytes(),
            &u64_word(nonce),
        ]));

        if self.state.get(&address).is_some_and(|a| a.is_programmable()) {
            return Err(LedgerError::AddressInUse(address));
        }

        self.state.get_or_create(deployer).nonce = nonce + 1;
        let name = program.name();
        self.state.get_or_create(&address).program = Some(program);

        info!(%deployer, %address, program = name, "program deployed");
        Ok(address)
    }

    // -- reads --------------------------------------------------------------

    /// Native balance of an account.
    pub fn balance_of(&self, address: &Address) -> u64 {
        self.state.balance_of(address)
    }

    /// Deployment nonce of an account.
    pub fn nonce_of(&self, address: &Address) -> u64 {
        self.state.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    /// The program at an address, if it is programmable.
    pub fn program_at(&self, address: &Address) -> Option<Arc<dyn Program>> {
        self.state.get(address).and_then(|a| a.program.clone())
    }

    /// Read a storage slot.
    pub fn storage_get(&self, address: &Address, key: &[u8]) -> Option<&[u8]> {
        self.state
            .get(address)
            .and_then(|a| a.storage.get(key))
            .map(Vec::as_slice)
    }

    /// The full event log, oldest first.
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Events emitted by one program, oldest first.
    pub fn logs_from<'a>(
        &'a self,
        emitter: &'a Address,
    ) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.logs.iter().filter(move |entry| entry.emitter == *emitter)
    }

    /// Read-only view of the world state.
    pub fn world(&self) -> &WorldState {
        &self.state
    }

    // -- calls --------------------------------------------------------------

    /// Execute one atomic call.
    ///
    /// Moves `value` from `sender` to `to`, then runs `f` with a context
    /// whose attested sender is `sender`. If either step fails, every change
    /// made since entry (balances, storage, nonces, logs) is discarded and
    /// the error is returned.
    pub fn transact<T, E, F>(
        &mut self,
        sender: &Address,
        to: &Address,
        value: u64,
        f: F,
    ) -> Result<T, E>
    where
        E: From<LedgerError>,
        F: FnOnce(&mut CallContext<'_>) -> Result<T, E>,
    {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(LedgerError::CallDepthExceeded(MAX_CALL_DEPTH).into());
        }

        let snapshot = self.snapshot();
        self.depth += 1;

        let result = self
            .state
            .move_value(sender, to, value)
            .map_err(E::from)
            .and_then(|()| {
                let mut ctx = CallContext::new(self, *sender, *to, value);
                f(&mut ctx)
            });

        self.depth -= 1;
        if result.is_err() {
            debug!(%sender, %to, value, depth = self.depth, "call reverted, restoring snapshot");
            self.restore(snapshot);
        }
        result
    }

    /// Plain value transfer: move `amount` and run the recipient's receive
    /// hook. Atomic: a faulting hook undoes the move.
    pub fn send(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), LedgerError> {
        let recipient = *to;
        self.transact(from, to, amount, |ctx| {
            let Some(program) = ctx.ledger().program_at(&recipient) else {
                return Ok(());
            };
            program.on_receive(ctx).map_err(|fault| LedgerError::ProgramFault {
                address: recipient,
                reason: fault.to_string(),
            })
        })
    }

    /// Run a read-only query against a program, such as a signature check.
    ///
    /// Queries can nest (a vault asking a vault asking a vault), so they
    /// share the call depth limit with [`transact`](Self::transact).
    pub fn static_call<T>(
        &self,
        f: impl FnOnce(&Ledger) -> Result<T, ProgramFault>,
    ) -> Result<T, ProgramFault> {
        let depth = self.static_depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(ProgramFault::Reverted(format!(
                "static call depth exceeded (max {MAX_CALL_DEPTH})"
            )));
        }
        self.static_depth.set(depth + 1);
        let result = f(self);
        self.static_depth.set(depth);
        result
    }

    // -- internals ----------------------------------------------------------

    pub(crate) fn storage_set(&mut self, address: &Address, key: Vec<u8>, value: Vec<u8>) {
        self.state.get_or_create(address).storage.insert(key, value);
    }

    pub(crate) fn push_log(&mut self, emitter: Address, name: &str, data: serde_json::Value) {
        self.logs.push(LogEntry {
            emitter,
            name: name.to_string(),
            data,
        });
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            log_len: self.logs.len(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.state = snapshot.state;
        self.logs.truncate(snapshot.log_len);
    }
}
