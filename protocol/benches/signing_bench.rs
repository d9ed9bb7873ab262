// Signing & verification benchmarks for the cosign protocol.
//
// Covers canonical digest construction, approval signing, signer recovery,
// and the full verifier path for both identity kinds.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cosign_protocol::config::{SIGNATURE_ACCEPTED, SIGNATURE_REJECTED};
use cosign_protocol::crypto::hash::Hash32;
use cosign_protocol::crypto::keys::{Address, CosignKeypair};
use cosign_protocol::crypto::signatures::{recover_signer, sign_approval};
use cosign_protocol::digest::{canonical_transfer_digest, signing_digest};
use cosign_protocol::ledger::{Ledger, Program, ProgramFault};
use cosign_protocol::verifier::is_valid_approval;

struct OwnerDelegate {
    owner: Address,
}

impl Program for OwnerDelegate {
    fn name(&self) -> &'static str {
        "owner-delegate"
    }

    fn is_valid_signature(
        &self,
        _ledger: &Ledger,
        _this: &Address,
        digest: &Hash32,
        signature: &[u8],
    ) -> Result<[u8; 4], ProgramFault> {
        match recover_signer(digest, signature) {
            Ok(signer) if signer == self.owner => Ok(SIGNATURE_ACCEPTED),
            _ => Ok(SIGNATURE_REJECTED),
        }
    }
}

fn bench_canonical_digest(c: &mut Criterion) {
    let vault = Address::new([0x11; 20]);
    let recipient = Address::new([0x22; 20]);

    c.bench_function("digest/canonical_transfer", |b| {
        b.iter(|| canonical_transfer_digest(&vault, 42, &recipient, 1_000_000));
    });
}

fn bench_sign_approval(c: &mut Criterion) {
    let keypair = CosignKeypair::generate();
    let digest = canonical_transfer_digest(
        &Address::new([0x11; 20]),
        42,
        &Address::new([0x22; 20]),
        1_000_000,
    );

    c.bench_function("secp256k1/sign_approval", |b| {
        b.iter(|| sign_approval(&keypair, &digest).unwrap());
    });
}

fn bench_recover_signer(c: &mut Criterion) {
    let keypair = CosignKeypair::generate();
    let digest = canonical_transfer_digest(
        &Address::new([0x11; 20]),
        42,
        &Address::new([0x22; 20]),
        1_000_000,
    );
    let signature = sign_approval(&keypair, &digest).unwrap();
    let wrapped = signing_digest(&digest);

    c.bench_function("secp256k1/recover_signer", |b| {
        b.iter(|| recover_signer(&wrapped, signature.as_bytes()).unwrap());
    });
}

fn bench_verifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("verifier/is_valid_approval");

    let owner = CosignKeypair::generate();
    let mut ledger = Ledger::new();
    let delegate = ledger
        .deploy(&owner.address(), Arc::new(OwnerDelegate { owner: owner.address() }))
        .unwrap();

    for (label, claimed) in [("key", owner.address()), ("programmable", delegate)] {
        let digests: Vec<Hash32> = (0..100u64)
            .map(|i| {
                signing_digest(&canonical_transfer_digest(&claimed, i, &owner.address(), i + 1))
            })
            .collect();
        let signatures: Vec<_> = digests
            .iter()
            .map(|d| owner.sign_prehash(d).unwrap())
            .collect();

        group.throughput(Throughput::Elements(digests.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &claimed, |b, claimed| {
            b.iter(|| {
                for (digest, sig) in digests.iter().zip(&signatures) {
                    assert!(is_valid_approval(&ledger, claimed, digest, sig.as_bytes()));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_canonical_digest,
    bench_sign_approval,
    bench_recover_signer,
    bench_verifier,
);
criterion_main!(benches);
