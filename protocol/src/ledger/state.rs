//! # World State
//!
//! Maps addresses to account states. Every ledger call snapshots this map
//! before running and puts it back if the call fails, so there is no such
//! thing as a half-applied call.
//!
//! ## Value moves
//!
//! A move of `A` from `from` to `to`:
//!
//! 1. Verify `from.balance >= A`.
//! 2. Verify `to.balance + A` does not overflow.
//! 3. `from.balance -= A`
//! 4. `to.balance += A`
//!
//! Both checks happen before either write, so a failed move touches nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::program::Program;
use super::LedgerError;
use crate::crypto::keys::Address;

// ---------------------------------------------------------------------------
// AccountState
// ---------------------------------------------------------------------------

/// The ledger-side state of a single account.
///
/// Accounts without a program are keypair identities. Accounts with one are
/// programmable: they can hold storage, react to incoming value and vouch
/// for signatures.
#[derive(Clone, Default)]
pub struct AccountState {
    /// Number of programs deployed by this account.
    pub nonce: u64,
    /// Native balance.
    pub balance: u64,
    /// Program key/value storage. Empty for keypair accounts.
    pub storage: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Program code, if any.
    pub program: Option<Arc<dyn Program>>,
}

impl AccountState {
    /// Create a keypair account with the given balance.
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// `true` if this account runs a program.
    pub fn is_programmable(&self) -> bool {
        self.program.is_some()
    }
}

impl fmt::Debug for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountState")
            .field("nonce", &self.nonce)
            .field("balance", &self.balance)
            .field("storage_entries", &self.storage.len())
            .field("program", &self.program.as_ref().map(|p| p.name()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// All accounts known to the ledger, ordered by address.
#[derive(Clone, Debug, Default)]
pub struct WorldState {
    accounts: BTreeMap<Address, AccountState>,
}

impl WorldState {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the account state for an address.
    pub fn get(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    /// Retrieve the account, creating an empty one on first touch.
    pub fn get_or_create(&mut self, address: &Address) -> &mut AccountState {
        self.accounts.entry(*address).or_default()
    }

    /// Native balance, zero for unknown accounts.
    pub fn balance_of(&self, address: &Address) -> u64 {
        self.get(address).map(|a| a.balance).unwrap_or(0)
    }

    /// Number of known accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// `true` if no account has been touched yet.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Add `amount` to an account out of thin air. Genesis only.
    pub fn credit(&mut self, address: &Address, amount: u64) -> Result<(), LedgerError> {
        let account = self.get_or_create(address);
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow { account: *address })?;
        Ok(())
    }

    /// Move `amount` between two accounts. All-or-nothing.
    pub fn move_value(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            return Ok(());
        }

        let available = self.balance_of(from);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                account: *from,
                balance: available,
                required: amount,
            });
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow { account: *to })?;

        self.get_or_create(from).balance = available - amount;
        self.get_or_create(to).balance = credited;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn test_unknown_account_has_zero_balance() {
        let world = WorldState::new();
        assert_eq!(world.balance_of(&addr(1)), 0);
        assert!(world.is_empty());
    }

    #[test]
    fn test_move_value_happy_path() {
        let mut world = WorldState::new();
        world.credit(&addr(1), 100).unwrap();
        world.move_value(&addr(1), &addr(2), 40).unwrap();
        assert_eq!(world.balance_of(&addr(1)), 60);
        assert_eq!(world.balance_of(&addr(2)), 40);
    }

    #[test]
    fn test_move_value_insufficient_leaves_state_alone() {
        let mut world = WorldState::new();
        world.credit(&addr(1), 10).unwrap();
        let err = world.move_value(&addr(1), &addr(2), 11).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { balance: 10, required: 11, .. }));
        assert_eq!(world.balance_of(&addr(1)), 10);
        assert_eq!(world.balance_of(&addr(2)), 0);
    }

    #[test]
    fn test_move_value_overflow_rejected() {
        let mut world = WorldState::new();
        world.credit(&addr(1), 10).unwrap();
        world.credit(&addr(2), u64::MAX).unwrap();
        assert!(matches!(
            world.move_value(&addr(1), &addr(2), 1),
            Err(LedgerError::BalanceOverflow { .. })
        ));
        assert_eq!(world.balance_of(&addr(1)), 10);
    }

    #[test]
    fn test_self_move_is_noop() {
        let mut world = WorldState::new();
        world.credit(&addr(1), 5).unwrap();
        world.move_value(&addr(1), &addr(1), 5).unwrap();
        assert_eq!(world.balance_of(&addr(1)), 5);
    }

    #[test]
    fn test_debug_reports_program_name_only() {
        let account = AccountState::with_balance(3);
        let debug = format!("{:?}", account);
        assert!(debug.contains("balance: 3"));
        assert!(debug.contains("program: None"));
        assert!(!account.is_programmable());
    }
}
