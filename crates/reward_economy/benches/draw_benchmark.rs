//! Benchmark for weighted selection and multi-draws.
//!
//! Run with: cargo bench --package reward_economy --bench draw_benchmark

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use reward_economy::draw::{DrawEngine, PityRule, PityState, SubEntry, WeightedEntry, WeightedTable};
use reward_economy::seed::{RngFactory, SecureSeed};

fn create_test_table() -> WeightedTable {
    WeightedTable::new(vec![
        WeightedEntry::item("common_sword", 70.0),
        WeightedEntry::item("uncommon_shield", 20.0),
        WeightedEntry::compound(
            "gems",
            8.0,
            vec![
                SubEntry {
                    name: "ruby".to_string(),
                    weight: 1.0,
                },
                SubEntry {
                    name: "sapphire".to_string(),
                    weight: 1.0,
                },
            ],
        ),
        WeightedEntry::item("epic_bow", 2.0),
    ])
}

fn benchmark_single_select(c: &mut Criterion) {
    let table = create_test_table();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    c.bench_function("single_select", |b| {
        b.iter(|| black_box(table.select(&mut rng).map(str::len)));
    });
}

fn benchmark_ten_draw_with_pity(c: &mut Criterion) {
    let table = create_test_table();
    let rule = PityRule {
        threshold: 90,
        guarantee: WeightedTable::new(vec![WeightedEntry::item("legendary", 1.0)]),
    };
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut state = PityState::default();

    let mut group = c.benchmark_group("multi_draw");
    group.throughput(Throughput::Elements(10));
    group.bench_function("10_draws_pity", |b| {
        b.iter(|| {
            black_box(DrawEngine::draw(
                &table,
                Some(&rule),
                &mut state,
                black_box(10),
                &mut rng,
            ))
        });
    });
    group.finish();
}

fn benchmark_seeded_rng(c: &mut Criterion) {
    let factory = RngFactory::new(SecureSeed::test_seed());

    c.bench_function("rng_per_request", |b| {
        b.iter(|| black_box(factory.rng_for(black_box("player-1"), black_box("standard"))));
    });
}

fn benchmark_statistics(c: &mut Criterion) {
    let table = create_test_table();
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    let mut group = c.benchmark_group("statistics");
    group.sample_size(10);
    group.bench_function("statistics_100k", |b| {
        b.iter(|| black_box(DrawEngine::run_statistics(&table, black_box(100_000), &mut rng)));
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_single_select,
    benchmark_ten_draw_with_pity,
    benchmark_seeded_rng,
    benchmark_statistics
);
criterion_main!(benches);
