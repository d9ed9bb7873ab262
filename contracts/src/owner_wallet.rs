//! # Owner Wallet
//!
//! The smallest useful programmable identity: an account with no key of its
//! own that vouches for whatever its owner key signs. Put one in the
//! approver B slot of a vault and the owner key can be swapped out (by
//! deploying a new wallet) without the vault ever seeing a raw key.
//!
//! The wallet accepts incoming value like any account.

use std::sync::Arc;

use tracing::{debug, info};

use cosign_protocol::config::{SIGNATURE_ACCEPTED, SIGNATURE_REJECTED};
use cosign_protocol::crypto::hash::Hash32;
use cosign_protocol::crypto::keys::Address;
use cosign_protocol::crypto::signatures::recover_signer;
use cosign_protocol::ledger::{Ledger, LedgerError, Program, ProgramFault};

/// Vouches for signatures made by `owner`.
#[derive(Debug, Clone, Copy)]
pub struct OwnerWallet {
    owner: Address,
}

impl OwnerWallet {
    /// Deploy a wallet for `owner` and return its address.
    pub fn deploy(
        ledger: &mut Ledger,
        deployer: &Address,
        owner: Address,
    ) -> Result<Address, LedgerError> {
        let address = ledger.deploy(deployer, Arc::new(Self { owner }))?;
        info!(wallet = %address, %owner, "owner wallet deployed");
        Ok(address)
    }

    /// The key this wallet speaks for.
    pub fn owner(&self) -> Address {
        self.owner
    }
}

impl Program for OwnerWallet {
    fn name(&self) -> &'static str {
        "owner-wallet"
    }

    fn is_valid_signature(
        &self,
        _ledger: &Ledger,
        this: &Address,
        digest: &Hash32,
        signature: &[u8],
    ) -> Result<[u8; 4], ProgramFault> {
        match recover_signer(digest, signature) {
            Ok(signer) if signer == self.owner => Ok(SIGNATURE_ACCEPTED),
            Ok(signer) => {
                debug!(wallet = %this, %signer, "signature is not the owner's");
                Ok(SIGNATURE_REJECTED)
            }
            Err(e) => Err(ProgramFault::Reverted(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosign_protocol::crypto::hash::keccak256;
    use cosign_protocol::crypto::keys::CosignKeypair;
    use cosign_protocol::verifier::is_valid_approval;

    #[test]
    fn wallet_vouches_for_owner_only() {
        let mut ledger = Ledger::new();
        let owner = CosignKeypair::from_bytes(&[4; 32]).unwrap();
        let other = CosignKeypair::from_bytes(&[5; 32]).unwrap();
        let wallet = OwnerWallet::deploy(&mut ledger, &owner.address(), owner.address()).unwrap();

        let digest = keccak256(b"release");
        let good = owner.sign_prehash(&digest).unwrap();
        let bad = other.sign_prehash(&digest).unwrap();
        assert!(is_valid_approval(&ledger, &wallet, &digest, good.as_bytes()));
        assert!(!is_valid_approval(&ledger, &wallet, &digest, bad.as_bytes()));
        assert!(!is_valid_approval(&ledger, &wallet, &digest, &[1, 2, 3]));
    }

    #[test]
    fn wallet_address_is_not_the_owner_key() {
        let mut ledger = Ledger::new();
        let owner = CosignKeypair::from_bytes(&[4; 32]).unwrap();
        let wallet = OwnerWallet::deploy(&mut ledger, &owner.address(), owner.address()).unwrap();
        assert_ne!(wallet, owner.address());
        assert_eq!(ledger.program_at(&wallet).map(|p| p.name()), Some("owner-wallet"));
    }
}
