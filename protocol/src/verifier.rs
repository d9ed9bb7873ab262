//! # Approval Verifier
//!
//! Answers one question: did `claimed` approve `digest`, given `signature`?
//!
//! How that question is answered depends on what kind of identity `claimed`
//! is, and the ledger is the authority on that:
//!
//! | Identity kind  | How it approves                                        |
//! |----------------|--------------------------------------------------------|
//! | `Key`          | signs with its secp256k1 key; we recover and compare   |
//! | `Programmable` | its program vouches via `is_valid_signature`           |
//!
//! A programmable identity is asked, and *only* asked: we never fall back to
//! key recovery for it, because a program address has no private key and
//! anything that recovers to it is a coincidence at best.
//!
//! The verifier fails closed. A malformed signature, a program fault, an
//! unexpected return code all come out as `false`, never as a panic or an
//! error the caller has to remember to treat as a rejection.

use std::sync::Arc;

use tracing::debug;

use crate::config::{code_name, SIGNATURE_ACCEPTED};
use crate::crypto::hash::Hash32;
use crate::crypto::keys::Address;
use crate::crypto::signatures::verify_signer;
use crate::ledger::{Ledger, Program};

/// An identity, classified by how it proves approval.
#[derive(Clone)]
pub enum IdentityKind {
    /// A plain keypair identity.
    Key(Address),
    /// An account whose program answers signature checks itself.
    Programmable {
        /// The program's account.
        address: Address,
        /// The code to ask.
        program: Arc<dyn Program>,
    },
}

impl IdentityKind {
    /// Classify `address` according to the ledger.
    pub fn resolve(ledger: &Ledger, address: &Address) -> Self {
        match ledger.program_at(address) {
            Some(program) => IdentityKind::Programmable {
                address: *address,
                program,
            },
            None => IdentityKind::Key(*address),
        }
    }

    /// The identity's address, whatever its kind.
    pub fn address(&self) -> &Address {
        match self {
            IdentityKind::Key(address) => address,
            IdentityKind::Programmable { address, .. } => address,
        }
    }
}

impl std::fmt::Debug for IdentityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityKind::Key(address) => write!(f, "Key({address})"),
            IdentityKind::Programmable { address, program } => {
                write!(f, "Programmable({address}, {})", program.name())
            }
        }
    }
}

/// Decide whether `signature` over `digest` is a valid approval by `claimed`.
///
/// `digest` is checked as given: callers pass the signing-context digest,
/// not the canonical one.
pub fn is_valid_approval(
    ledger: &Ledger,
    claimed: &Address,
    digest: &Hash32,
    signature: &[u8],
) -> bool {
    if claimed.is_zero() {
        return false;
    }

    let identity = IdentityKind::resolve(ledger, claimed);
    let accepted = match &identity {
        IdentityKind::Key(expected) => verify_signer(expected, digest, signature),
        IdentityKind::Programmable { address, program } => {
            let answer =
                ledger.static_call(|l| program.is_valid_signature(l, address, digest, signature));
            match answer {
                Ok(code) if code == SIGNATURE_ACCEPTED => true,
                Ok(code) => {
                    debug!(%address, code = %code_name(code), "programmable identity declined");
                    false
                }
                Err(fault) => {
                    debug!(%address, %fault, "programmable identity faulted");
                    false
                }
            }
        }
    };

    if !accepted {
        debug!(claimed = %identity.address(), kind = ?identity, "approval rejected");
    }
    accepted
}
