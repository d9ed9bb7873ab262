//! Integration tests for the custodian vault.
//!
//! These run the vault on a real in-memory ledger with real secp256k1 keys:
//! the reference scenarios, replay and wrong-signer attempts, balance
//! starvation, shuffled interleavings, and identities that are programs
//! rather than keys.

use cosign_contracts::{ErrorKind, OwnerWallet, VaultError, VaultEvent, VaultHandle};
use cosign_protocol::config::SIGNATURE_REJECTED;
use cosign_protocol::crypto::keys::{Address, CosignKeypair};
use cosign_protocol::crypto::signatures::sign_approval;
use cosign_protocol::digest::{signing_digest, TransferId};
use cosign_protocol::ledger::Ledger;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

struct Fixture {
    ledger: Ledger,
    vault: VaultHandle,
    a: CosignKeypair,
    b: CosignKeypair,
}

impl Fixture {
    fn with_balance(balance: u64) -> Self {
        let mut ledger = Ledger::new();
        let a = CosignKeypair::from_bytes(&[0xA1; 32]).unwrap();
        let b = CosignKeypair::from_bytes(&[0xB2; 32]).unwrap();
        let deployer = Address::new([0xDE; 20]);
        let vault = VaultHandle::deploy(&mut ledger, &deployer, a.address(), b.address()).unwrap();
        ledger.credit_genesis(&vault.address(), balance).unwrap();
        Self { ledger, vault, a, b }
    }

    fn initiate(&mut self, recipient: &Address, amount: u64) -> Result<TransferId, VaultError> {
        let caller = self.a.address();
        self.vault.initiate(&mut self.ledger, &caller, recipient, amount)
    }

    /// Approver B's signature for `id`, made the way the off-ledger side does.
    fn b_signs(&self, id: TransferId) -> Vec<u8> {
        let digest = self.vault.digest_to_sign(&self.ledger, id).unwrap();
        sign_approval(&self.b, &digest).unwrap().as_bytes().to_vec()
    }

    fn complete(&mut self, id: TransferId, signature: &[u8]) -> Result<(), VaultError> {
        let caller = self.a.address();
        self.vault.complete(&mut self.ledger, &caller, id, signature)
    }

    fn balance(&self) -> u64 {
        self.vault.balance(&self.ledger)
    }
}

fn recipient(byte: u8) -> Address {
    Address::new([byte; 20])
}

// ---------------------------------------------------------------------------
// Reference Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_single_transfer() {
    let mut fx = Fixture::with_balance(10);
    let r = recipient(0x01);

    let id = fx.initiate(&r, 5).unwrap();
    assert_eq!(id, 0);

    let sig = fx.b_signs(id);
    fx.complete(id, &sig).unwrap();

    assert_eq!(fx.ledger.balance_of(&r), 5);
    assert_eq!(fx.balance(), 5);
    assert!(fx.vault.transfer_details(&fx.ledger, id).unwrap().unwrap().completed);
}

#[test]
fn scenario_b_failed_initiate_consumes_no_id() {
    let mut fx = Fixture::with_balance(10);
    let id = fx.initiate(&recipient(0x01), 5).unwrap();
    let sig = fx.b_signs(id);
    fx.complete(id, &sig).unwrap();
    assert_eq!(fx.balance(), 5);

    let err = fx.initiate(&recipient(0x02), 6).unwrap_err();
    assert_eq!(err, VaultError::InsufficientBalance { required: 6, available: 5 });
    assert_eq!(err.kind(), ErrorKind::Balance);
    assert_eq!(fx.vault.next_transfer_id(&fx.ledger).unwrap(), 1);
    assert_eq!(fx.vault.transfer_details(&fx.ledger, 1).unwrap(), None);

    assert_eq!(fx.initiate(&recipient(0x02), 5).unwrap(), 1);
}

#[test]
fn scenario_c_out_of_order_completion() {
    let mut fx = Fixture::with_balance(10);
    let r1 = recipient(0x01);
    let r2 = recipient(0x02);

    let id0 = fx.initiate(&r1, 5).unwrap();
    let id1 = fx.initiate(&r2, 3).unwrap();
    assert_eq!((id0, id1), (0, 1));

    let sig0 = fx.b_signs(id0);
    let sig1 = fx.b_signs(id1);
    fx.complete(id1, &sig1).unwrap();
    fx.complete(id0, &sig0).unwrap();

    assert_eq!(fx.ledger.balance_of(&r1), 5);
    assert_eq!(fx.ledger.balance_of(&r2), 3);
    assert_eq!(fx.balance(), 2);
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn replay_fails_and_moves_nothing() {
    let mut fx = Fixture::with_balance(10);
    let r = recipient(0x01);
    let id = fx.initiate(&r, 4).unwrap();
    let sig = fx.b_signs(id);
    fx.complete(id, &sig).unwrap();

    for _ in 0..3 {
        assert_eq!(fx.complete(id, &sig), Err(VaultError::AlreadyCompleted(id)));
    }
    assert_eq!(fx.ledger.balance_of(&r), 4);
    assert_eq!(fx.balance(), 6);
}

#[test]
fn never_initiated_is_a_state_error_every_time() {
    let mut fx = Fixture::with_balance(10);
    let sig = sign_approval(&fx.b, &[0u8; 32]).unwrap();
    for _ in 0..3 {
        let err = fx.complete(7, sig.as_bytes()).unwrap_err();
        assert_eq!(err, VaultError::NotInitiated(7));
        assert_eq!(err.kind(), ErrorKind::State);
    }
}

#[test]
fn approver_a_signature_is_not_approver_b() {
    let mut fx = Fixture::with_balance(10);
    let id = fx.initiate(&recipient(0x01), 5).unwrap();
    let digest = fx.vault.digest_to_sign(&fx.ledger, id).unwrap();
    let by_a = sign_approval(&fx.a, &digest).unwrap();

    let err = fx.complete(id, by_a.as_bytes()).unwrap_err();
    assert_eq!(err, VaultError::InvalidSignature(id));
    assert_eq!(err.kind(), ErrorKind::Signature);

    let record = fx.vault.transfer_details(&fx.ledger, id).unwrap().unwrap();
    assert!(!record.completed);
    assert_eq!(fx.balance(), 10);
}

#[test]
fn signature_for_one_transfer_does_not_complete_another() {
    let mut fx = Fixture::with_balance(10);
    let id0 = fx.initiate(&recipient(0x01), 2).unwrap();
    let id1 = fx.initiate(&recipient(0x01), 2).unwrap();
    let sig0 = fx.b_signs(id0);

    assert_eq!(fx.complete(id1, &sig0), Err(VaultError::InvalidSignature(id1)));
    fx.complete(id0, &sig0).unwrap();
}

#[test]
fn signature_for_another_vault_is_rejected() {
    let mut fx = Fixture::with_balance(10);
    let deployer = Address::new([0xDE; 20]);
    let twin =
        VaultHandle::deploy(&mut fx.ledger, &deployer, fx.a.address(), fx.b.address()).unwrap();
    fx.ledger.credit_genesis(&twin.address(), 10).unwrap();
    assert_ne!(twin.address(), fx.vault.address());

    let r = recipient(0x01);
    let id = fx.initiate(&r, 5).unwrap();
    let twin_id = twin.initiate(&mut fx.ledger, &fx.a.address(), &r, 5).unwrap();
    assert_eq!(id, twin_id);

    let twin_sig = {
        let digest = twin.digest_to_sign(&fx.ledger, twin_id).unwrap();
        sign_approval(&fx.b, &digest).unwrap()
    };
    assert_eq!(fx.complete(id, twin_sig.as_bytes()), Err(VaultError::InvalidSignature(id)));
}

#[test]
fn raw_canonical_signature_lacks_the_prefix() {
    let mut fx = Fixture::with_balance(10);
    let id = fx.initiate(&recipient(0x01), 5).unwrap();
    let digest = fx.vault.digest_to_sign(&fx.ledger, id).unwrap();
    let unwrapped = fx.b.sign_prehash(&digest).unwrap();
    assert_eq!(fx.complete(id, unwrapped.as_bytes()), Err(VaultError::InvalidSignature(id)));

    let wrapped = fx.b.sign_prehash(&signing_digest(&digest)).unwrap();
    fx.complete(id, wrapped.as_bytes()).unwrap();
}

#[test]
fn only_approver_a_may_call() {
    let mut fx = Fixture::with_balance(10);
    let b = fx.b.address();
    let vault = fx.vault;

    let err = vault.initiate(&mut fx.ledger, &b, &recipient(0x01), 1).unwrap_err();
    assert_eq!(err, VaultError::Unauthorized { caller: b });
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let id = fx.initiate(&recipient(0x01), 1).unwrap();
    let sig = fx.b_signs(id);
    let stranger = recipient(0x99);
    assert_eq!(
        vault.complete(&mut fx.ledger, &stranger, id, &sig),
        Err(VaultError::Unauthorized { caller: stranger })
    );
    assert_eq!(vault.next_transfer_id(&fx.ledger).unwrap(), 1);
}

#[test]
fn invalid_arguments_are_validation_errors() {
    let mut fx = Fixture::with_balance(10);
    assert_eq!(fx.initiate(&Address::ZERO, 1), Err(VaultError::InvalidRecipient));
    assert_eq!(fx.initiate(&recipient(0x01), 0), Err(VaultError::InvalidAmount));
    assert_eq!(fx.vault.next_transfer_id(&fx.ledger).unwrap(), 0);
    assert!(fx.vault.events(&fx.ledger).unwrap().is_empty());
}

#[test]
fn vault_cannot_pay_itself() {
    let mut fx = Fixture::with_balance(10);
    let own = fx.vault.address();

    let err = fx.initiate(&own, 5).unwrap_err();
    assert_eq!(err, VaultError::InvalidRecipient);
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(fx.vault.next_transfer_id(&fx.ledger).unwrap(), 0);
    assert_eq!(fx.vault.transfer_details(&fx.ledger, 0).unwrap(), None);
    assert!(fx.vault.events(&fx.ledger).unwrap().is_empty());
    assert_eq!(fx.balance(), 10);
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

#[test]
fn starved_transfer_completes_after_refill() {
    let mut fx = Fixture::with_balance(10);
    let id0 = fx.initiate(&recipient(0x01), 8).unwrap();
    let id1 = fx.initiate(&recipient(0x02), 5).unwrap();
    let sig0 = fx.b_signs(id0);
    let sig1 = fx.b_signs(id1);

    // No reservation at initiation: id0 drains what id1 counted on.
    fx.complete(id0, &sig0).unwrap();
    assert_eq!(fx.balance(), 2);

    let err = fx.complete(id1, &sig1).unwrap_err();
    assert_eq!(err, VaultError::InsufficientBalance { required: 5, available: 2 });
    assert!(!fx.vault.transfer_details(&fx.ledger, id1).unwrap().unwrap().completed);

    let funder = recipient(0xF0);
    fx.ledger.credit_genesis(&funder, 3).unwrap();
    fx.vault.deposit(&mut fx.ledger, &funder, 3).unwrap();

    fx.complete(id1, &sig1).unwrap();
    assert_eq!(fx.balance(), 0);
    assert_eq!(fx.ledger.balance_of(&recipient(0x02)), 5);
}

#[test]
fn deposits_by_call_and_by_plain_transfer() {
    let mut fx = Fixture::with_balance(0);
    let funder = recipient(0xF0);
    fx.ledger.credit_genesis(&funder, 20).unwrap();

    fx.vault.deposit(&mut fx.ledger, &funder, 7).unwrap();
    fx.ledger.send(&funder, &fx.vault.address(), 5).unwrap();
    assert_eq!(fx.balance(), 12);

    let events = fx.vault.events(&fx.ledger).unwrap();
    assert_eq!(
        events,
        vec![
            VaultEvent::Deposit { source: funder, amount: 7 },
            VaultEvent::Deposit { source: funder, amount: 5 },
        ]
    );

    let err = fx.vault.deposit(&mut fx.ledger, &funder, 100).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ledger);
    assert_eq!(fx.balance(), 12);
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Step {
    Initiate(u64),
    Overdraw,
    CompleteOldest,
    Deposit(u64),
}

#[test]
fn ids_are_dense_across_shuffled_interleavings() {
    for seed in 0..8u64 {
        let mut fx = Fixture::with_balance(1_000);
        let funder = recipient(0xF0);
        fx.ledger.credit_genesis(&funder, 1_000).unwrap();

        let mut steps = Vec::new();
        steps.extend((1..=12).map(Step::Initiate));
        steps.extend([Step::Overdraw; 4]);
        steps.extend([Step::CompleteOldest; 6]);
        steps.extend([Step::Deposit(25); 3]);
        steps.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut issued = Vec::new();
        let mut open: Vec<TransferId> = Vec::new();
        for step in steps {
            match step {
                Step::Initiate(amount) => {
                    let id = fx.initiate(&recipient(amount as u8), amount).unwrap();
                    issued.push(id);
                    open.push(id);
                }
                Step::Overdraw => {
                    let too_much = fx.balance() + 1;
                    assert!(fx.initiate(&recipient(0x01), too_much).is_err());
                }
                Step::CompleteOldest => {
                    if !open.is_empty() {
                        let id = open.remove(0);
                        let sig = fx.b_signs(id);
                        fx.complete(id, &sig).unwrap();
                    }
                }
                Step::Deposit(amount) => fx.vault.deposit(&mut fx.ledger, &funder, amount).unwrap(),
            }
        }

        let expected: Vec<TransferId> = (0..12).collect();
        assert_eq!(issued, expected, "seed {seed}");
        assert_eq!(fx.vault.next_transfer_id(&fx.ledger).unwrap(), 12);
    }
}

#[test]
fn events_follow_the_transfer_lifecycle() {
    let mut fx = Fixture::with_balance(10);
    let r = recipient(0x01);
    let id = fx.initiate(&r, 5).unwrap();
    let digest = fx.vault.digest_to_sign(&fx.ledger, id).unwrap();
    let sig = fx.b_signs(id);
    fx.complete(id, &sig).unwrap();

    let events = fx.vault.events(&fx.ledger).unwrap();
    assert_eq!(
        events,
        vec![
            VaultEvent::TransferInitiated { id, recipient: r, amount: 5, canonical_digest: digest },
            VaultEvent::TransferCompleted { id, recipient: r, amount: 5 },
        ]
    );
}

// ---------------------------------------------------------------------------
// Programmable Approvers
// ---------------------------------------------------------------------------

#[test]
fn owner_wallet_as_approver_b() {
    let mut ledger = Ledger::new();
    let a = CosignKeypair::from_bytes(&[0xA1; 32]).unwrap();
    let owner = CosignKeypair::from_bytes(&[0x0E; 32]).unwrap();
    let wallet = OwnerWallet::deploy(&mut ledger, &owner.address(), owner.address()).unwrap();
    let vault = VaultHandle::deploy(&mut ledger, &a.address(), a.address(), wallet).unwrap();
    ledger.credit_genesis(&vault.address(), 10).unwrap();

    let r = recipient(0x01);
    let id = vault.initiate(&mut ledger, &a.address(), &r, 6).unwrap();
    let digest = vault.digest_to_sign(&ledger, id).unwrap();

    // The wallet has no key; a stranger's signature must not pass for it.
    let stranger = sign_approval(&a, &digest).unwrap();
    assert_eq!(
        vault.complete(&mut ledger, &a.address(), id, stranger.as_bytes()),
        Err(VaultError::InvalidSignature(id))
    );

    let by_owner = sign_approval(&owner, &digest).unwrap();
    vault.complete(&mut ledger, &a.address(), id, by_owner.as_bytes()).unwrap();
    assert_eq!(ledger.balance_of(&r), 6);
}

#[test]
fn vault_as_approver_b_of_another_vault() {
    let mut ledger = Ledger::new();
    let deployer = Address::new([0xDE; 20]);
    let inner_a = CosignKeypair::from_bytes(&[0x11; 32]).unwrap();
    let inner_b = CosignKeypair::from_bytes(&[0x22; 32]).unwrap();
    let outer_a = CosignKeypair::from_bytes(&[0x33; 32]).unwrap();

    let inner =
        VaultHandle::deploy(&mut ledger, &deployer, inner_a.address(), inner_b.address()).unwrap();
    let outer =
        VaultHandle::deploy(&mut ledger, &deployer, outer_a.address(), inner.address()).unwrap();
    ledger.credit_genesis(&outer.address(), 10).unwrap();

    let r = recipient(0x01);
    let id = outer.initiate(&mut ledger, &outer_a.address(), &r, 4).unwrap();
    let digest = outer.digest_to_sign(&ledger, id).unwrap();

    // The outer vault hands the inner vault its signing-context digest, and
    // the inner vault wraps that once more before asking its own approver B.
    let nested = sign_approval(&inner_b, &signing_digest(&digest)).unwrap();
    let direct = sign_approval(&inner_b, &digest).unwrap();

    assert_eq!(
        outer.complete(&mut ledger, &outer_a.address(), id, direct.as_bytes()),
        Err(VaultError::InvalidSignature(id))
    );
    outer.complete(&mut ledger, &outer_a.address(), id, nested.as_bytes()).unwrap();
    assert_eq!(ledger.balance_of(&r), 4);
}

#[test]
fn approver_cycle_between_vaults_fails_closed() {
    let mut ledger = Ledger::new();
    let deployer_x = Address::new([0xD1; 20]);
    let deployer_y = Address::new([0xD2; 20]);
    let x_a = CosignKeypair::from_bytes(&[0x31; 32]).unwrap();
    let y_a = CosignKeypair::from_bytes(&[0x32; 32]).unwrap();
    let signer = CosignKeypair::from_bytes(&[0x33; 32]).unwrap();

    // X's address depends only on its deployer and nonce.
    let mut scratch = ledger.clone();
    let x_predicted = VaultHandle::deploy(&mut scratch, &deployer_x, x_a.address(), recipient(0x01))
        .unwrap()
        .address();

    let y = VaultHandle::deploy(&mut ledger, &deployer_y, y_a.address(), x_predicted).unwrap();
    let x = VaultHandle::deploy(&mut ledger, &deployer_x, x_a.address(), y.address()).unwrap();
    assert_eq!(x.address(), x_predicted);
    ledger.credit_genesis(&x.address(), 10).unwrap();

    let r = recipient(0x0F);
    let id = x.initiate(&mut ledger, &x_a.address(), &r, 4).unwrap();
    let digest = x.digest_to_sign(&ledger, id).unwrap();
    let signature = sign_approval(&signer, &digest).unwrap();
    let events_before = x.events(&ledger).unwrap().len();

    assert_eq!(
        x.complete(&mut ledger, &x_a.address(), id, signature.as_bytes()),
        Err(VaultError::InvalidSignature(id))
    );
    assert_eq!(x.is_valid_signature(&ledger, &digest, signature.as_bytes()), SIGNATURE_REJECTED);
    assert_eq!(x.balance(&ledger), 10);
    assert_eq!(ledger.balance_of(&r), 0);
    assert!(!x.transfer_details(&ledger, id).unwrap().unwrap().completed);
    assert_eq!(x.events(&ledger).unwrap().len(), events_before);
}

#[test]
fn vault_cannot_name_itself_approver() {
    let mut ledger = Ledger::new();
    let deployer = Address::new([0xDE; 20]);
    let a = CosignKeypair::from_bytes(&[0xA1; 32]).unwrap();

    // A deployment on a copy of the ledger reveals the address the real
    // deployment will get.
    let mut scratch = ledger.clone();
    let predicted = VaultHandle::deploy(&mut scratch, &deployer, a.address(), recipient(0x01))
        .unwrap()
        .address();

    let err = VaultHandle::deploy(&mut ledger, &deployer, a.address(), predicted).unwrap_err();
    assert_eq!(err, VaultError::InvalidApprovers("a vault cannot be its own approver"));
    assert!(ledger.program_at(&predicted).is_none());
    assert_eq!(ledger.nonce_of(&deployer), 0);
}
