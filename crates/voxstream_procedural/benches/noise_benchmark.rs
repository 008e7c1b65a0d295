//! Benchmark for heightfield noise.
//!
//! Every generated chunk column costs one octaved sample plus one
//! roughness sample, so these bound column throughput.
//!
//! Run with: cargo bench --package voxstream_procedural --bench noise_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use voxstream_procedural::noise::{SimplexNoise, WorldSeed};

fn benchmark_single_sample(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42));

    c.bench_function("single_noise_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.sample(black_box(x), black_box(x * 0.7)))
        });
    });
}

fn benchmark_octaved_noise(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42));

    let mut group = c.benchmark_group("octaved");
    group.throughput(Throughput::Elements(1));
    group.bench_function("octaved_noise_4_octaves", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.octaved(black_box(x), black_box(-x * 0.7), 4, 0.5, 2.0))
        });
    });
    group.finish();
}

fn benchmark_block_hash(c: &mut Criterion) {
    let seed = WorldSeed::new(42);

    c.bench_function("hash3_per_block", |b| {
        let mut i = 0i64;
        b.iter(|| {
            i = i.wrapping_add(1);
            black_box(seed.hash3(black_box(i), black_box(-i), black_box(i >> 3)))
        });
    });
}

criterion_group!(
    benches,
    benchmark_single_sample,
    benchmark_octaved_noise,
    benchmark_block_hash
);
criterion_main!(benches);
