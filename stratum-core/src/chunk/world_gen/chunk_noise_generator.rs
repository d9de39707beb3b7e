//! Per-chunk density sampling with cell interpolation.
//!
//! The router's final density is evaluated exactly only at noise cell
//! corners. Everything between corners is trilinearly interpolated, and the
//! interpolation state is advanced incrementally, so callers must drive it in
//! a fixed order:
//!
//! ```text
//! sample_start_density()
//! for cell_x:
//!     sample_end_density(cell_x)
//!     for cell_z:
//!         for cell_y (top to bottom):
//!             on_sampled_cell_corners(cell_y, cell_z)
//!             for local_y (top to bottom):
//!                 interpolate_y(delta)
//!                 for local_x:
//!                     interpolate_x(delta)
//!                     for local_z:
//!                         interpolate_z(delta)
//!                         sample_block_state(x, y, z)
//!     swap_buffers()
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;
use stratum_utils::BlockStateId;
use stratum_utils::density::{DensityFunction, Marker, MarkerResolver, NoisePos};
use stratum_utils::math::{floor_div, lerp};
use stratum_utils::noise_router::aquifer::AquiferBlocks;
use stratum_utils::noise_router::{
    Aquifer, AquiferSampler, FluidPicker, NoiseBasedAquifer, NoiseRouter, NoiseShape, SeaLevelAquifer,
    SurfaceHeightEstimator,
};

/// Block states the density fill can place.
#[derive(Debug, Clone, Copy)]
pub struct TerrainBlocks {
    /// Placed wherever density is positive.
    pub default_block: BlockStateId,
    pub default_fluid: BlockStateId,
    pub lava: BlockStateId,
    pub air: BlockStateId,
}

impl TerrainBlocks {
    #[must_use]
    pub const fn to_aquifer_blocks(&self) -> AquiferBlocks {
        AquiferBlocks {
            air: self.air,
            water: self.default_fluid,
            lava: self.lava,
        }
    }
}

/// Interpolation state of one `Interpolated` node.
struct Interpolator {
    key: usize,
    input: Arc<DensityFunction>,
    /// Corner values at the current cell x, indexed `cell_z * stride + cell_y`.
    start: Box<[f64]>,
    /// Corner values at the next cell x.
    end: Box<[f64]>,
    stride: usize,
    corners: [f64; 8],
    after_y: [f64; 4],
    after_x: [f64; 2],
    value: f64,
}

impl Interpolator {
    fn new(key: usize, input: Arc<DensityFunction>, cells_z: usize, cells_y: usize) -> Self {
        let stride = cells_y + 1;
        let len = (cells_z + 1) * stride;
        Self {
            key,
            input,
            start: vec![0.0; len].into_boxed_slice(),
            end: vec![0.0; len].into_boxed_slice(),
            stride,
            corners: [0.0; 8],
            after_y: [0.0; 4],
            after_x: [0.0; 2],
            value: 0.0,
        }
    }

    /// Corner order is `[x][y][z]` packed as `x << 2 | y << 1 | z`.
    fn on_sampled_cell_corners(&mut self, cell_y: usize, cell_z: usize) {
        let stride = self.stride;
        let at = |slice: &[f64], z: usize, y: usize| slice[z * stride + y];
        self.corners = [
            at(&self.start, cell_z, cell_y),
            at(&self.start, cell_z + 1, cell_y),
            at(&self.start, cell_z, cell_y + 1),
            at(&self.start, cell_z + 1, cell_y + 1),
            at(&self.end, cell_z, cell_y),
            at(&self.end, cell_z + 1, cell_y),
            at(&self.end, cell_z, cell_y + 1),
            at(&self.end, cell_z + 1, cell_y + 1),
        ];
    }

    fn interpolate_y(&mut self, delta: f64) {
        let c = &self.corners;
        self.after_y = [
            lerp(delta, c[0b000], c[0b010]),
            lerp(delta, c[0b100], c[0b110]),
            lerp(delta, c[0b001], c[0b011]),
            lerp(delta, c[0b101], c[0b111]),
        ];
    }

    fn interpolate_x(&mut self, delta: f64) {
        let y = &self.after_y;
        self.after_x = [lerp(delta, y[0], y[1]), lerp(delta, y[2], y[3])];
    }

    fn interpolate_z(&mut self, delta: f64) {
        self.value = lerp(delta, self.after_x[0], self.after_x[1]);
    }

    fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
    }
}

/// Quart-column values of every `FlatCache` node, precomputed for the chunk.
struct FlatCache {
    start_quart_x: i32,
    start_quart_z: i32,
    width: usize,
    values: FxHashMap<usize, Box<[f64]>>,
}

impl FlatCache {
    fn get(&self, key: usize, pos: NoisePos) -> Option<f64> {
        let qx = usize::try_from((pos.x >> 2) - self.start_quart_x).ok()?;
        let qz = usize::try_from((pos.z >> 2) - self.start_quart_z).ok()?;
        if qx >= self.width || qz >= self.width {
            return None;
        }
        self.values.get(&key).map(|values| values[qz * self.width + qx])
    }
}

struct ChunkResolver<'a> {
    interpolators: &'a [Interpolator],
    flat_cache: &'a FlatCache,
}

impl MarkerResolver for ChunkResolver<'_> {
    fn resolve(&self, marker: Marker, node: &DensityFunction, pos: NoisePos) -> Option<f64> {
        let key = node.key();
        match marker {
            Marker::Interpolated => self
                .interpolators
                .iter()
                .find(|interpolator| interpolator.key == key)
                .map(|interpolator| interpolator.value),
            Marker::FlatCache => self.flat_cache.get(key, pos),
            Marker::Cache2d => None,
        }
    }
}

/// Resolves only `FlatCache` markers; used while filling corner buffers.
struct FlatOnly<'a>(&'a FlatCache);

impl MarkerResolver for FlatOnly<'_> {
    fn resolve(&self, marker: Marker, node: &DensityFunction, pos: NoisePos) -> Option<f64> {
        match marker {
            Marker::FlatCache => self.0.get(node.key(), pos),
            Marker::Interpolated | Marker::Cache2d => None,
        }
    }
}

/// Samples one chunk's terrain. Built per fill, dropped afterwards.
pub struct ChunkNoiseGenerator {
    router: Arc<NoiseRouter>,
    shape: NoiseShape,
    blocks: TerrainBlocks,
    interpolators: Vec<Interpolator>,
    flat_cache: FlatCache,
    aquifer: Aquifer,
    height_estimator: SurfaceHeightEstimator,
    start_cell_x: i32,
    start_cell_z: i32,
    cells_y: usize,
    min_cell_y: i32,
}

impl ChunkNoiseGenerator {
    #[must_use]
    pub fn new(
        router: Arc<NoiseRouter>,
        shape: NoiseShape,
        chunk_x: i32,
        chunk_z: i32,
        picker: FluidPicker,
        blocks: TerrainBlocks,
        aquifers: bool,
    ) -> Self {
        let start_block_x = chunk_x << 4;
        let start_block_z = chunk_z << 4;
        let cells_xz = shape.cell_count_xz() as usize;
        let cells_y = shape.cell_count_y() as usize;

        let mut interpolators = Vec::new();
        let mut flat_nodes = Vec::new();
        router.final_density.walk(&mut |node| {
            if let DensityFunction::Marked(marker, input) = node.as_ref() {
                match marker {
                    Marker::Interpolated if !interpolators.iter().any(|i: &Interpolator| i.key == node.key()) => {
                        interpolators.push(Interpolator::new(node.key(), input.clone(), cells_xz, cells_y));
                    }
                    Marker::FlatCache => flat_nodes.push(node.clone()),
                    _ => {}
                }
            }
        });

        let start_quart_x = start_block_x >> 2;
        let start_quart_z = start_block_z >> 2;
        let width = 16 / 4 + 1;
        let mut values = FxHashMap::default();
        for node in flat_nodes {
            let DensityFunction::Marked(_, input) = node.as_ref() else {
                continue;
            };
            values.entry(node.key()).or_insert_with(|| {
                let mut column = vec![0.0; width * width];
                for qz in 0..width {
                    for qx in 0..width {
                        let pos = NoisePos::new(
                            (start_quart_x + qx as i32) << 2,
                            0,
                            (start_quart_z + qz as i32) << 2,
                        );
                        column[qz * width + qx] = input.compute(pos);
                    }
                }
                column.into_boxed_slice()
            });
        }
        let flat_cache = FlatCache {
            start_quart_x,
            start_quart_z,
            width,
            values,
        };

        let aquifer = if aquifers {
            Aquifer::from(NoiseBasedAquifer::new(
                router.clone(),
                chunk_x,
                chunk_z,
                shape.min_y,
                shape.height,
                picker,
                blocks.to_aquifer_blocks(),
            ))
        } else {
            Aquifer::from(SeaLevelAquifer::new(picker, blocks.air))
        };

        let height_estimator = SurfaceHeightEstimator::new(
            router.initial_density_without_jaggedness.clone(),
            shape.min_y,
            shape.max_y(),
            shape.cell_height,
        );

        Self {
            start_cell_x: floor_div(start_block_x, shape.cell_width),
            start_cell_z: floor_div(start_block_z, shape.cell_width),
            cells_y,
            min_cell_y: shape.min_cell_y(),
            router,
            shape,
            blocks,
            interpolators,
            flat_cache,
            aquifer,
            height_estimator,
        }
    }

    /// Fills the start buffers at the chunk's first cell x.
    pub fn sample_start_density(&mut self) {
        self.sample_density(true, self.start_cell_x, 0..=self.cells_xz());
    }

    /// Fills the end buffers at the far side of `cell_x`.
    pub fn sample_end_density(&mut self, cell_x: i32) {
        self.sample_density(false, self.start_cell_x + cell_x + 1, 0..=self.cells_xz());
    }

    /// Same as [`Self::sample_start_density`] and [`Self::sample_end_density`]
    /// combined, restricted to the cell column `cell_z`. Used by single
    /// column probes.
    pub fn sample_column_density(&mut self, cell_x: i32, cell_z: usize) {
        self.sample_density(true, self.start_cell_x + cell_x, cell_z..=cell_z + 1);
        self.sample_density(false, self.start_cell_x + cell_x + 1, cell_z..=cell_z + 1);
    }

    fn sample_density(&mut self, start: bool, current_cell_x: i32, cells_z: std::ops::RangeInclusive<usize>) {
        let x = current_cell_x * self.shape.cell_width;
        let resolver = FlatOnly(&self.flat_cache);
        for interpolator in &mut self.interpolators {
            let stride = interpolator.stride;
            let buffer = if start { &mut interpolator.start } else { &mut interpolator.end };
            for cell_z in cells_z.clone() {
                let z = (self.start_cell_z + cell_z as i32) * self.shape.cell_width;
                for cell_y in 0..=self.cells_y {
                    let y = (self.min_cell_y + cell_y as i32) * self.shape.cell_height;
                    buffer[cell_z * stride + cell_y] =
                        interpolator.input.compute_with(NoisePos::new(x, y, z), &resolver);
                }
            }
        }
    }

    pub fn on_sampled_cell_corners(&mut self, cell_y: usize, cell_z: usize) {
        for interpolator in &mut self.interpolators {
            interpolator.on_sampled_cell_corners(cell_y, cell_z);
        }
    }

    pub fn interpolate_y(&mut self, delta: f64) {
        for interpolator in &mut self.interpolators {
            interpolator.interpolate_y(delta);
        }
    }

    pub fn interpolate_x(&mut self, delta: f64) {
        for interpolator in &mut self.interpolators {
            interpolator.interpolate_x(delta);
        }
    }

    pub fn interpolate_z(&mut self, delta: f64) {
        for interpolator in &mut self.interpolators {
            interpolator.interpolate_z(delta);
        }
    }

    pub fn swap_buffers(&mut self) {
        for interpolator in &mut self.interpolators {
            interpolator.swap_buffers();
        }
    }

    /// Block at a world position from the current interpolation state.
    pub fn sample_block_state(&mut self, x: i32, y: i32, z: i32) -> BlockStateId {
        let pos = NoisePos::new(x, y, z);
        let resolver = ChunkResolver {
            interpolators: &self.interpolators,
            flat_cache: &self.flat_cache,
        };
        let density = self.router.final_density.compute_with(pos, &resolver);
        self.aquifer
            .compute_substance(pos, density, &mut self.height_estimator)
            .unwrap_or(self.blocks.default_block)
    }

    /// Preliminary surface y near `x, z`.
    pub fn preliminary_surface(&mut self, x: i32, z: i32) -> i32 {
        self.height_estimator.estimate(x, z)
    }

    #[inline]
    #[must_use]
    pub fn cells_xz(&self) -> usize {
        self.shape.cell_count_xz() as usize
    }

    #[inline]
    #[must_use]
    pub const fn cells_y(&self) -> usize {
        self.cells_y
    }

    #[inline]
    #[must_use]
    pub const fn min_cell_y(&self) -> i32 {
        self.min_cell_y
    }

    #[inline]
    #[must_use]
    pub const fn shape(&self) -> &NoiseShape {
        &self.shape
    }

    #[inline]
    #[must_use]
    pub const fn blocks(&self) -> &TerrainBlocks {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_utils::noise_router::overworld::overworld;

    const BLOCKS: TerrainBlocks = TerrainBlocks {
        default_block: BlockStateId(1),
        default_fluid: BlockStateId(9),
        lava: BlockStateId(10),
        air: BlockStateId::AIR,
    };

    fn generator(seed: u64) -> ChunkNoiseGenerator {
        let shape = NoiseShape::OVERWORLD;
        let router = Arc::new(overworld(seed, &shape));
        let picker = FluidPicker::new(63, BLOCKS.default_fluid, -54, BLOCKS.lava);
        ChunkNoiseGenerator::new(router, shape, 0, 0, picker, BLOCKS, false)
    }

    #[test]
    fn finds_the_interpolated_node() {
        let generator = generator(0);
        assert_eq!(generator.interpolators.len(), 1);
        assert!(!generator.flat_cache.values.is_empty());
    }

    #[test]
    fn corners_reproduce_exact_density() {
        let mut generator = generator(5);
        generator.sample_start_density();
        generator.sample_end_density(0);
        let top = generator.cells_y() - 1;
        generator.on_sampled_cell_corners(top, 0);
        generator.interpolate_y(0.0);
        generator.interpolate_x(0.0);
        generator.interpolate_z(0.0);

        let interpolator = &generator.interpolators[0];
        let y = (generator.min_cell_y() + top as i32) * 8;
        let exact = interpolator.input.compute(NoisePos::new(0, y, 0));
        assert!((interpolator.value - exact).abs() < 1e-9);
    }

    #[test]
    fn flat_cache_matches_plain_evaluation() {
        let generator = generator(3);
        let router = generator.router.clone();
        let resolver = FlatOnly(&generator.flat_cache);
        for (x, z) in [(0, 0), (5, 9), (15, 15)] {
            let pos = NoisePos::new(x, 40, z);
            let cached = router.continents.compute_with(pos, &resolver);
            assert_eq!(cached.to_bits(), router.continents.compute(pos).to_bits());
        }
    }
}
