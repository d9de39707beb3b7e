#![allow(missing_docs)]
//! Benchmarks for chunk generation.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use stratum_core::WorldConfig;
use stratum_core::chunk::{
    chunk_access::ChunkAccess, chunk_generator::ChunkGenerator,
    world_gen::world_gen_type::noise_generator::NoiseGenerator,
};
use stratum_registry::Registry;
use stratum_utils::ChunkPos;

const SEED: u64 = 12345;
const MIN_Y: i32 = -64;
const HEIGHT: i32 = 384;

fn create_generator() -> NoiseGenerator {
    let config = WorldConfig {
        seed: SEED,
        ..WorldConfig::default()
    };
    NoiseGenerator::new(&config, Arc::new(Registry::overworld())).expect("default blocks exist")
}

fn bench_fill_chunk(c: &mut Criterion) {
    let generator = create_generator();

    let mut group = c.benchmark_group("fill_from_noise");

    // Different positions see different terrain
    let positions = [(0, 0), (100, 100), (1000, 1000)];

    for (x, z) in positions {
        group.bench_with_input(
            BenchmarkId::new("chunk", format!("({x},{z})")),
            &(x, z),
            |b, &(x, z)| {
                b.iter(|| {
                    let chunk = ChunkAccess::new(ChunkPos::new(x, z), MIN_Y, HEIGHT);
                    generator.fill_from_noise(black_box(&chunk));
                    black_box(chunk);
                });
            },
        );
    }

    group.finish();
}

fn bench_generator_creation(c: &mut Criterion) {
    c.bench_function("generator_creation", |b| {
        b.iter(|| black_box(create_generator()));
    });
}

fn bench_biomes_and_noise(c: &mut Criterion) {
    let generator = create_generator();

    let mut group = c.benchmark_group("multiple_chunks");

    // Adjacent chunks, as an observer walking would request them
    for count in [4, 9, 16] {
        group.bench_with_input(BenchmarkId::new("adjacent", count), &count, |b, &count| {
            let side = f64::from(count).sqrt() as i32;
            b.iter(|| {
                for x in 0..side {
                    for z in 0..side {
                        let chunk = ChunkAccess::new(ChunkPos::new(x, z), MIN_Y, HEIGHT);
                        generator.create_biomes(&chunk);
                        generator.fill_from_noise(black_box(&chunk));
                        black_box(&chunk);
                    }
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fill_chunk,
    bench_generator_creation,
    bench_biomes_and_noise,
);
criterion_main!(benches);
