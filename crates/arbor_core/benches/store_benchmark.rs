//! # Contiguous Store Benchmark
//!
//! Measures the allocation primitive behind every column:
//! 1. Appends with power-of-two growth
//! 2. Swap-removes at random positions
//! 3. Table row moves between types

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use arbor_core::{Id, TypedStore, World};

/// Generate deterministic "random" indices
fn generate_random_indices(count: usize, seed: u64) -> Vec<usize> {
    let mut indices = Vec::with_capacity(count);
    let mut state = seed;

    for _ in 0..count {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        indices.push(state as usize);
    }

    indices
}

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_push");

    for count in [1_000usize, 100_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut store: TypedStore<u64> = TypedStore::new(0);
                for i in 0..count as u64 {
                    store.push(i);
                }
                black_box(store.len())
            });
        });
    }

    group.finish();
}

fn bench_swap_remove(c: &mut Criterion) {
    const COUNT: usize = 100_000;
    let picks = generate_random_indices(COUNT, 0x1234_5678);

    c.bench_function("store_swap_remove_100k", |b| {
        b.iter(|| {
            let mut store: TypedStore<[f32; 4]> = TypedStore::new(COUNT);
            store.add_n(COUNT);
            for pick in &picks {
                let len = store.len();
                store.remove_index_swap_last(pick % len);
            }
            black_box(store.is_empty())
        });
    });
}

fn bench_table_moves(c: &mut Criterion) {
    const COUNT: usize = 10_000;

    c.bench_function("world_add_remove_component_10k", |b| {
        let mut world = World::default();
        let health = world.register_component::<f32>();
        let tag = world.register_tag();
        let entities: Vec<_> = (0..COUNT)
            .map(|i| {
                let e = world.spawn();
                world.set_component(e, health, i as f32).unwrap();
                e
            })
            .collect();

        b.iter(|| {
            for &e in &entities {
                world.add_id(e, Id::component(tag)).unwrap();
            }
            for &e in &entities {
                world.remove_id(e, Id::component(tag)).unwrap();
            }
            black_box(world.entity_count())
        });
    });
}

criterion_group!(benches, bench_push, bench_swap_remove, bench_table_moves);
criterion_main!(benches);
