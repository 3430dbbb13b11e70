//! Benchmark harness using Criterion for latency measurement.
//!
//! Measures:
//! - Place order (no match)
//! - Place order (full match at depth)
//! - Snapshot and initialize
//! - Mixed workload

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use peer_lob::{MatchingEngine, Order};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Generate a random order around 10000.00
fn random_order(rng: &mut ChaCha8Rng) -> Order {
    let price = Decimal::new(rng.gen_range(990_000..1_010_000), 2);
    let qty = Decimal::new(rng.gen_range(1..10_000), 4);
    let amount = if rng.gen_bool(0.5) { qty } else { -qty };
    Order::new(Uuid::from_u128(rng.gen()), price, amount)
}

fn order(n: u64, price: i64, amount: i64) -> Order {
    Order::new(Uuid::from_u128(n as u128), Decimal::from(price), Decimal::from(amount))
}

/// Benchmark: Place order that rests (no matching)
fn bench_place_no_match(c: &mut Criterion) {
    let mut engine = MatchingEngine::new();
    let mut n = 0u64;

    c.bench_function("place_no_match", |b| {
        b.iter(|| {
            n += 1;
            // Below any asks; spread over levels so queues stay short
            black_box(engine.place_order(order(n, 9_000 - (n % 500) as i64, 100)))
        })
    });
}

/// Benchmark: Place order that fully matches
fn bench_place_full_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("place_full_match");

    for depth in [1u64, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let mut engine = MatchingEngine::new();
            for i in 0..depth {
                engine.place_order(order(i, 10_000, -100));
            }

            let mut n = 1_000u64;

            b.iter(|| {
                n += 2;
                let result = engine.place_order(order(n, 10_000, 100));
                // Replenish the matched maker
                engine.place_order(order(n + 1, 10_000, -100));
                black_box(result)
            })
        });
    }

    group.finish();
}

/// Benchmark: Snapshot then rebuild, the book sync path
fn bench_snapshot_initialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_initialize");

    for book_size in [100usize, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(book_size), book_size, |b, &book_size| {
            let mut source = MatchingEngine::new();
            for i in 0..book_size as u64 {
                let (price, amount) = if i % 2 == 0 {
                    (9_000 + (i % 100) as i64, 10)
                } else {
                    (11_000 + (i % 100) as i64, -10)
                };
                source.place_order(order(i, price, amount));
            }

            let mut copy = MatchingEngine::new();
            b.iter(|| {
                copy.initialize(source.snapshot());
                black_box(copy.resting_count())
            })
        });
    }

    group.finish();
}

/// Benchmark: Mixed workload
fn bench_mixed_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_workload");

    group.bench_function("random_crossing", |b| {
        let mut engine = MatchingEngine::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0xDEADBEEF);

        // Pre-populate
        for _ in 0..1000 {
            engine.place_order(random_order(&mut rng));
        }

        b.iter(|| black_box(engine.place_order(random_order(&mut rng))))
    });

    group.finish();
}

/// Benchmark: Throughput (orders per second)
fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.throughput(criterion::Throughput::Elements(1000));

    group.bench_function("1000_orders", |b| {
        let mut engine = MatchingEngine::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0xCAFEBABE);

        b.iter(|| {
            for _ in 0..1000 {
                black_box(engine.place_order(random_order(&mut rng)));
            }
            engine.book.clear();
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_place_no_match,
    bench_place_full_match,
    bench_snapshot_initialize,
    bench_mixed_workload,
    bench_throughput,
);

criterion_main!(benches);
