//! # Ledger Benchmarks
//!
//! | Area | What is measured |
//! |------|------------------|
//! | lg-01 State Machine | Apply throughput, snapshot export/decode |
//! | lg-02 Envelope | Request verification per policy |

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lg_01_state_machine::{LedgerStateMachine, SnapshotBody};
use lg_02_envelope::{EnvelopeVerifier, LedgerClient, NonceRetention, VerificationPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::{Command, ContractId, ContractKeys};

fn accounts(n: usize) -> Vec<ContractId> {
    (0..n)
        .map(|i| ContractId::from_bytes(format!("acct-{i}").as_bytes()).unwrap())
        .collect()
}

fn funded_ledger(ids: &[ContractId]) -> LedgerStateMachine {
    let mut ledger = LedgerStateMachine::new();
    let mut seq = 0;
    for id in ids {
        seq += 1;
        let _ = ledger.apply(
            seq,
            &Command::CreateContract {
                id: id.clone(),
                public_key: vec![2; 33],
                shared_secret: None,
            },
        );
        seq += 1;
        let _ = ledger.apply(
            seq,
            &Command::LoadMoney {
                id: id.clone(),
                amount: 1_000_000,
            },
        );
    }
    ledger
}

// ============================================================================
// lg-01: State Machine
// ============================================================================

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("lg-01-apply");
    group.measurement_time(Duration::from_secs(5));

    for size in [100usize, 1_000] {
        let ids = accounts(size);
        let mut rng = StdRng::seed_from_u64(size as u64);
        let transfers: Vec<_> = (0..1_000)
            .map(|_| Command::SendTransaction {
                origin: ids[rng.gen_range(0..size)].clone(),
                destination: ids[rng.gen_range(0..size)].clone(),
                amount: rng.gen_range(1..100),
            })
            .collect();

        group.throughput(Throughput::Elements(transfers.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("transfers", size),
            &transfers,
            |b, transfers| {
                b.iter_batched(
                    || funded_ledger(&ids),
                    |mut ledger| {
                        let start = ledger.last_applied();
                        for (i, command) in transfers.iter().enumerate() {
                            black_box(ledger.apply(start + i as u64 + 1, command)).ok();
                        }
                        ledger
                    },
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("lg-01-snapshot");
    for size in [1_000usize, 10_000] {
        let ledger = funded_ledger(&accounts(size));
        let bytes = ledger.export().unwrap();

        group.bench_with_input(BenchmarkId::new("export", size), &ledger, |b, ledger| {
            b.iter(|| black_box(ledger.export().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(SnapshotBody::decode(bytes).unwrap()))
        });
    }
    group.finish();
}

// ============================================================================
// lg-02: Envelope Verification
// ============================================================================

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("lg-02-envelope");
    let destination = ContractId::from_bytes(b"dest").unwrap();

    for (name, policy, with_secret) in [
        ("signature", VerificationPolicy::signature_only(), false),
        ("signature+hmac", VerificationPolicy::hmac_augmented(), true),
    ] {
        let owner = LedgerClient::generate(ContractId::from_bytes(b"owner").unwrap(), with_secret);
        let keys = ContractKeys {
            public_key: owner.public_key().to_vec(),
            shared_secret: owner.shared_secret().map(<[u8]>::to_vec),
        };
        let request = owner.load_money(10);
        let verifier = EnvelopeVerifier::new(policy, NonceRetention::Unbounded);
        group.bench_function(BenchmarkId::new("load_money", name), |b| {
            b.iter(|| black_box(verifier.verify(&request, &keys).is_ok()))
        });

        // Fresh nonces so every iteration passes the replay guard.
        let mut n = 0u64;
        group.bench_function(BenchmarkId::new("send_transaction", name), |b| {
            b.iter_batched(
                || {
                    n += 1;
                    owner.send_transaction_with_nonce(&destination, 5, &n.to_string())
                },
                |request| black_box(verifier.verify(&request, &keys).is_ok()),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_apply, bench_snapshot, bench_envelope);
criterion_main!(benches);
