// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BENCHMARK SUITE - ubic-consensus
//
// Active-set recomputation and issuer lookup.
// Run: cargo bench -p ubic-consensus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ubic_consensus::schedule::rank_delegates;
use ubic_consensus::{Delegate, VoteStore};
use ubic_core::ConsensusParams;

fn delegates(count: u32) -> Vec<Delegate> {
    (0..count)
        .map(|i| {
            let mut key = vec![0u8; 32];
            key[..4].copy_from_slice(&i.to_be_bytes());
            let mut d = Delegate::new(key);
            d.total_vote = (i % 17) as u64 + 1;
            d
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────
// RANKING
// ─────────────────────────────────────────────────────────────────

fn bench_rank_delegates(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/rank_delegates");
    for count in [21u32, 100, 1_000] {
        let ds = delegates(count);
        group.bench_with_input(BenchmarkId::new("top21", count), &ds, |b, ds| {
            b.iter(|| black_box(rank_delegates(ds, 21)))
        });
    }
    group.finish();
}

// ─────────────────────────────────────────────────────────────────
// SCHEDULE
// ─────────────────────────────────────────────────────────────────

fn bench_validator_for_timestamp(c: &mut Criterion) {
    let store = VoteStore::from_delegates(
        ConsensusParams {
            active_delegate_count: 21,
            slot_duration_secs: 10,
        },
        delegates(100),
    );
    let mut ts = 1_700_000_000u64;

    c.bench_function("consensus/validator_for_timestamp", |b| {
        b.iter(|| {
            ts += 10;
            black_box(store.validator_for_timestamp(ts).map(|k| k.len()))
        })
    });
}

// ─────────────────────────────────────────────────────────────────

criterion_group!(benches, bench_rank_delegates, bench_validator_for_timestamp);
criterion_main!(benches);
