#![allow(missing_docs)]
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use stratum_utils::BlockStateId;
use stratum_utils::density::NoisePos;
use stratum_utils::noise_router::{
    AquiferSampler, FluidPicker, NoiseBasedAquifer, NoiseShape, SurfaceHeightEstimator,
    aquifer::AquiferBlocks, overworld::overworld,
};

const SEED: u64 = 12345;

fn bench_router_build(c: &mut Criterion) {
    c.bench_function("overworld_router_build", |b| {
        b.iter(|| black_box(overworld(black_box(SEED), &NoiseShape::OVERWORLD)));
    });
}

fn bench_density_sampling(c: &mut Criterion) {
    let router = overworld(SEED, &NoiseShape::OVERWORLD);

    c.bench_function("final_density_single", |b| {
        b.iter(|| {
            let pos = NoisePos::new(black_box(100), black_box(64), black_box(100));
            black_box(router.final_density.compute(pos))
        });
    });

    c.bench_function("final_density_cell_column", |b| {
        let shape = NoiseShape::OVERWORLD;
        b.iter(|| {
            let mut sum = 0.0;
            for cell_y in 0..=shape.cell_count_y() {
                let y = (shape.min_cell_y() + cell_y) * shape.cell_height;
                sum += router.final_density.compute(NoisePos::new(0, y, 0));
            }
            black_box(sum)
        });
    });
}

fn bench_aquifer(c: &mut Criterion) {
    let router = Arc::new(overworld(SEED, &NoiseShape::OVERWORLD));
    let blocks = AquiferBlocks {
        air: BlockStateId(0),
        water: BlockStateId(1),
        lava: BlockStateId(2),
    };
    let picker = FluidPicker::new(63, blocks.water, -54, blocks.lava);

    c.bench_function("aquifer_chunk_slice", |b| {
        b.iter(|| {
            let mut estimator = SurfaceHeightEstimator::new(
                router.initial_density_without_jaggedness.clone(),
                -64,
                320,
                8,
            );
            let mut aquifer = NoiseBasedAquifer::new(router.clone(), 0, 0, -64, 384, picker, blocks);
            for x in 0..16 {
                for z in 0..16 {
                    black_box(aquifer.compute_substance(NoisePos::new(x, 0, z), -0.2, &mut estimator));
                }
            }
        });
    });
}

criterion_group!(benches, bench_router_build, bench_density_sampling, bench_aquifer);
criterion_main!(benches);
