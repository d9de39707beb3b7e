//! Underground fluid placement.
//!
//! Where the terrain density says "not solid", an aquifer decides whether the
//! block is air, water or lava. [`SeaLevelAquifer`] just floods everything
//! below the global fluid level. [`NoiseBasedAquifer`] scatters fluid cells on
//! a jittered 16x12x16 grid; each cell gets its own fluid level and type, and
//! where two cells with different levels meet, a barrier of solid material is
//! kept so fluids never hang in the air at a flat cut.
//!
//! Cell locations and statuses are cached per chunk. Both are pure functions
//! of position, so the caches never change an answer.

use std::sync::Arc;

use enum_dispatch::enum_dispatch;

use crate::density::NoisePos;
use crate::math::{clamped_map, floor_div};
use crate::random::{PositionalRandom, Random, RandomSplitter};
use crate::{BlockPos, BlockStateId};

use super::NoiseRouter;
use super::fluid_level::{FluidLevel, FluidPicker};
use super::surface_height::SurfaceHeightEstimator;

/// Fluid level of a cell that holds no fluid at all.
const WAY_BELOW_MIN_Y: i32 = -32_512;

const X_SPACING: i32 = 16;
const Y_SPACING: i32 = 12;
const Z_SPACING: i32 = 16;
const X_OFFSET: i32 = -5;
const Y_OFFSET: i32 = 1;
const Z_OFFSET: i32 = -5;

/// Chunk offsets probed when estimating the surface around a cell. The
/// center must come first; the search returns early on it.
const SURFACE_SAMPLES: [(i32, i32); 13] = [
    (0, 0),
    (-2, -1),
    (-1, -1),
    (0, -1),
    (1, -1),
    (-3, 0),
    (-2, 0),
    (-1, 0),
    (1, 0),
    (-2, 1),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Block states the aquifer can emit.
#[derive(Debug, Clone, Copy)]
pub struct AquiferBlocks {
    pub air: BlockStateId,
    pub water: BlockStateId,
    pub lava: BlockStateId,
}

/// Decides the substance of a non-solid position.
#[enum_dispatch]
pub trait AquiferSampler {
    /// `None` keeps the default solid block; `Some` is the fluid or air to place.
    fn compute_substance(
        &mut self,
        pos: NoisePos,
        density: f64,
        estimator: &mut SurfaceHeightEstimator,
    ) -> Option<BlockStateId>;
}

#[enum_dispatch(AquiferSampler)]
pub enum Aquifer {
    SeaLevel(SeaLevelAquifer),
    NoiseBased(NoiseBasedAquifer),
}

/// Floods everything below the global fluid level.
pub struct SeaLevelAquifer {
    picker: FluidPicker,
    air: BlockStateId,
}

impl SeaLevelAquifer {
    #[must_use]
    pub const fn new(picker: FluidPicker, air: BlockStateId) -> Self {
        Self { picker, air }
    }
}

impl AquiferSampler for SeaLevelAquifer {
    fn compute_substance(
        &mut self,
        pos: NoisePos,
        density: f64,
        _estimator: &mut SurfaceHeightEstimator,
    ) -> Option<BlockStateId> {
        if density > 0.0 {
            None
        } else {
            Some(self.picker.pick(pos.x, pos.y, pos.z).at(pos.y, self.air))
        }
    }
}

/// Aquifer with per-cell fluid levels, for one chunk.
pub struct NoiseBasedAquifer {
    router: Arc<NoiseRouter>,
    random: RandomSplitter,
    picker: FluidPicker,
    blocks: AquiferBlocks,
    min_grid: (i32, i32, i32),
    size_x: usize,
    size_z: usize,
    locations: Box<[Option<i64>]>,
    statuses: Box<[Option<FluidLevel>]>,
}

#[inline]
const fn grid_x(x: i32) -> i32 {
    x >> 4
}

#[inline]
const fn grid_y(y: i32) -> i32 {
    floor_div(y, Y_SPACING)
}

#[inline]
const fn grid_z(z: i32) -> i32 {
    z >> 4
}

impl NoiseBasedAquifer {
    /// Sizes the caches to cover every grid cell a block of the chunk can
    /// consult.
    #[must_use]
    pub fn new(
        router: Arc<NoiseRouter>,
        chunk_x: i32,
        chunk_z: i32,
        min_y: i32,
        height: i32,
        picker: FluidPicker,
        blocks: AquiferBlocks,
    ) -> Self {
        let random = router.random.with_hash_of("stratum:aquifer").next_positional();

        let min_block_x = chunk_x << 4;
        let min_block_z = chunk_z << 4;
        let min_gx = grid_x(min_block_x + X_OFFSET);
        let max_gx = grid_x(min_block_x + 15 + X_OFFSET) + 1;
        let min_gy = grid_y(min_y + Y_OFFSET) - 1;
        let max_gy = grid_y(min_y + height + Y_OFFSET) + 1;
        let min_gz = grid_z(min_block_z + Z_OFFSET);
        let max_gz = grid_z(min_block_z + 15 + Z_OFFSET) + 1;

        let size_x = (max_gx - min_gx + 1) as usize;
        let size_y = (max_gy - min_gy + 1) as usize;
        let size_z = (max_gz - min_gz + 1) as usize;
        let total = size_x * size_y * size_z;

        Self {
            router,
            random,
            picker,
            blocks,
            min_grid: (min_gx, min_gy, min_gz),
            size_x,
            size_z,
            locations: vec![None; total].into_boxed_slice(),
            statuses: vec![None; total].into_boxed_slice(),
        }
    }

    #[inline]
    fn index(&self, gx: i32, gy: i32, gz: i32) -> usize {
        let x = (gx - self.min_grid.0) as usize;
        let y = (gy - self.min_grid.1) as usize;
        let z = (gz - self.min_grid.2) as usize;
        (y * self.size_z + z) * self.size_x + x
    }

    /// Jittered fluid source position of a grid cell, packed.
    fn location(&mut self, index: usize, gx: i32, gy: i32, gz: i32) -> i64 {
        if let Some(packed) = self.locations[index] {
            return packed;
        }
        let mut random = self.random.at(gx, gy, gz);
        let packed = BlockPos::new(
            gx * X_SPACING + random.next_i32_bounded(10),
            gy * Y_SPACING + random.next_i32_bounded(9),
            gz * Z_SPACING + random.next_i32_bounded(10),
        )
        .as_long();
        self.locations[index] = Some(packed);
        packed
    }

    fn status(&mut self, index: usize, estimator: &mut SurfaceHeightEstimator) -> FluidLevel {
        if let Some(status) = self.statuses[index] {
            return status;
        }
        let packed = self.locations[index].unwrap_or_default();
        let status = self.compute_fluid(
            BlockPos::unpack_x(packed),
            BlockPos::unpack_y(packed),
            BlockPos::unpack_z(packed),
            estimator,
        );
        self.statuses[index] = Some(status);
        status
    }

    fn compute_fluid(&self, x: i32, y: i32, z: i32, estimator: &mut SurfaceHeightEstimator) -> FluidLevel {
        let global = self.picker.pick(x, y, z);
        let cell_top = y + 12;
        let cell_bottom = y - 12;
        let mut lowest_surface = i32::MAX;
        let mut center_under_fluid = false;

        for (dx, dz) in SURFACE_SAMPLES {
            let sx = x + (dx << 4);
            let sz = z + (dz << 4);
            let surface = estimator.estimate(sx, sz);
            let adjusted = surface + 8;
            let is_center = dx == 0 && dz == 0;

            if is_center && cell_bottom > adjusted {
                return global;
            }

            let pokes_above = cell_top > adjusted;
            if pokes_above || is_center {
                let at_surface = self.picker.pick(sx, adjusted, sz);
                if at_surface.at(adjusted, self.blocks.air) != self.blocks.air {
                    if is_center {
                        center_under_fluid = true;
                    }
                    if pokes_above {
                        return at_surface;
                    }
                }
            }

            lowest_surface = lowest_surface.min(surface);
        }

        let level = self.surface_level(x, y, z, global, lowest_surface, center_under_fluid);
        FluidLevel::new(level, self.fluid_type(x, y, z, global, level))
    }

    fn surface_level(
        &self,
        x: i32,
        y: i32,
        z: i32,
        global: FluidLevel,
        lowest_surface: i32,
        center_under_fluid: bool,
    ) -> i32 {
        let pos = NoisePos::new(x, y, z);
        let erosion = self.router.erosion.compute(pos);
        let depth = self.router.depth.compute(pos);
        let deep_dark = erosion < f64::from(-0.225_f32) && depth > f64::from(0.9_f32);

        let (partially, fully) = if deep_dark {
            (-1.0, -1.0)
        } else {
            let below_surface = lowest_surface + 8 - y;
            let factor = if center_under_fluid {
                clamped_map(f64::from(below_surface), 0.0, 64.0, 1.0, 0.0)
            } else {
                0.0
            };
            let flood = self.router.fluid_level_floodedness.compute(pos).clamp(-1.0, 1.0);
            let fully_at = lerp_between(factor, 1.0, 0.0, f64::from(-0.3_f32), f64::from(0.8_f32));
            let partially_at = lerp_between(factor, 1.0, 0.0, f64::from(-0.8_f32), f64::from(0.4_f32));
            (flood - partially_at, flood - fully_at)
        };

        if fully > 0.0 {
            global.max_y_exclusive
        } else if partially > 0.0 {
            self.randomized_level(x, y, z, lowest_surface)
        } else {
            WAY_BELOW_MIN_Y
        }
    }

    fn randomized_level(&self, x: i32, y: i32, z: i32, lowest_surface: i32) -> i32 {
        let cell_x = floor_div(x, 16);
        let cell_y = floor_div(y, 40);
        let cell_z = floor_div(z, 16);
        let middle = cell_y * 40 + 20;
        let spread = self
            .router
            .fluid_level_spread
            .compute(NoisePos::new(cell_x, cell_y, cell_z))
            * 10.0;
        let quantized = (spread / 3.0).floor() as i32 * 3;
        lowest_surface.min(middle + quantized)
    }

    fn fluid_type(&self, x: i32, y: i32, z: i32, global: FluidLevel, level: i32) -> BlockStateId {
        if level <= -10 && level != WAY_BELOW_MIN_Y && global.block != self.blocks.lava {
            let pos = NoisePos::new(floor_div(x, 64), floor_div(y, 40), floor_div(z, 64));
            if self.router.lava.compute(pos).abs() > f64::from(0.3_f32) {
                return self.blocks.lava;
            }
        }
        global.block
    }

    /// Solidity contribution of the boundary between two cells at `pos`.
    fn pressure(&self, pos: NoisePos, barrier: &mut Option<f64>, a: FluidLevel, b: FluidLevel) -> f64 {
        let y = pos.y;
        let fa = a.at(y, self.blocks.air);
        let fb = b.at(y, self.blocks.air);
        let (water, lava) = (self.blocks.water, self.blocks.lava);
        if (fa == lava && fb == water) || (fa == water && fb == lava) {
            return 2.0;
        }

        let level_gap = (a.max_y_exclusive - b.max_y_exclusive).abs();
        if level_gap == 0 {
            return 0.0;
        }

        let average = 0.5 * f64::from(a.max_y_exclusive + b.max_y_exclusive);
        let above_average = f64::from(y) + 0.5 - average;
        let half_gap = f64::from(level_gap) / 2.0;
        let edge = half_gap - above_average.abs();

        let gradient = if above_average > 0.0 {
            if edge > 0.0 { edge / 1.5 } else { edge / 2.5 }
        } else {
            let shifted = 3.0 + edge;
            if shifted > 0.0 { shifted / 3.0 } else { shifted / 10.0 }
        };

        let noise = if (-2.0..=2.0).contains(&gradient) {
            *barrier.get_or_insert_with(|| self.router.barrier.compute(pos))
        } else {
            0.0
        };

        2.0 * (noise + gradient)
    }
}

/// Maps `value` from `[from_start, from_end]` onto `[to_start, to_end]` without clamping.
#[inline]
fn lerp_between(value: f64, from_start: f64, from_end: f64, to_start: f64, to_end: f64) -> f64 {
    to_start + (value - from_start) / (from_end - from_start) * (to_end - to_start)
}

#[inline]
fn similarity(closer: i32, farther: i32) -> f64 {
    1.0 - f64::from(farther - closer) / 25.0
}

impl AquiferSampler for NoiseBasedAquifer {
    fn compute_substance(
        &mut self,
        pos: NoisePos,
        density: f64,
        estimator: &mut SurfaceHeightEstimator,
    ) -> Option<BlockStateId> {
        if density > 0.0 {
            return None;
        }

        let (x, y, z) = (pos.x, pos.y, pos.z);
        if self.picker.pick(x, y, z).at(y, self.blocks.air) == self.blocks.lava {
            return Some(self.blocks.lava);
        }

        let anchor_x = grid_x(x + X_OFFSET);
        let anchor_y = grid_y(y + Y_OFFSET);
        let anchor_z = grid_z(z + Z_OFFSET);

        // The three nearest cell sources, closest first. Ties displace.
        let mut nearest = [(i32::MAX, 0usize); 3];
        for ox in 0..=1 {
            for oy in -1..=1 {
                for oz in 0..=1 {
                    let (gx, gy, gz) = (anchor_x + ox, anchor_y + oy, anchor_z + oz);
                    let index = self.index(gx, gy, gz);
                    let packed = self.location(index, gx, gy, gz);
                    let dx = BlockPos::unpack_x(packed) - x;
                    let dy = BlockPos::unpack_y(packed) - y;
                    let dz = BlockPos::unpack_z(packed) - z;
                    let d = dx * dx + dy * dy + dz * dz;

                    if nearest[0].0 >= d {
                        nearest = [(d, index), nearest[0], nearest[1]];
                    } else if nearest[1].0 >= d {
                        nearest = [nearest[0], (d, index), nearest[1]];
                    } else if nearest[2].0 >= d {
                        nearest[2] = (d, index);
                    }
                }
            }
        }
        let [(d1, i1), (d2, i2), (d3, i3)] = nearest;

        let first = self.status(i1, estimator);
        let fluid = first.at(y, self.blocks.air);
        let sim_12 = similarity(d1, d2);
        if sim_12 <= 0.0 {
            return Some(fluid);
        }

        if fluid == self.blocks.water
            && self.picker.pick(x, y - 1, z).at(y - 1, self.blocks.air) == self.blocks.lava
        {
            return Some(fluid);
        }

        let mut barrier = None;
        let second = self.status(i2, estimator);
        if density + sim_12 * self.pressure(pos, &mut barrier, first, second) > 0.0 {
            return None;
        }

        let third = self.status(i3, estimator);
        let sim_13 = similarity(d1, d3);
        if sim_13 > 0.0 && density + sim_12 * sim_13 * self.pressure(pos, &mut barrier, first, third) > 0.0 {
            return None;
        }

        let sim_23 = similarity(d2, d3);
        if sim_23 > 0.0 && density + sim_12 * sim_23 * self.pressure(pos, &mut barrier, second, third) > 0.0 {
            return None;
        }

        Some(fluid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_router::NoiseShape;
    use crate::noise_router::overworld::overworld;

    const BLOCKS: AquiferBlocks = AquiferBlocks {
        air: BlockStateId(0),
        water: BlockStateId(10),
        lava: BlockStateId(11),
    };

    fn picker() -> FluidPicker {
        FluidPicker::new(63, BLOCKS.water, -54, BLOCKS.lava)
    }

    fn estimator(router: &NoiseRouter) -> SurfaceHeightEstimator {
        SurfaceHeightEstimator::new(router.initial_density_without_jaggedness.clone(), -64, 320, 8)
    }

    #[test]
    fn solid_density_is_left_alone() {
        let router = Arc::new(overworld(3, &NoiseShape::OVERWORLD));
        let mut est = estimator(&router);
        let mut aquifer = Aquifer::from(NoiseBasedAquifer::new(router, 0, 0, -64, 384, picker(), BLOCKS));
        assert_eq!(aquifer.compute_substance(NoisePos::new(4, 10, 4), 0.5, &mut est), None);
    }

    #[test]
    fn deep_open_space_is_lava() {
        let router = Arc::new(overworld(3, &NoiseShape::OVERWORLD));
        let mut est = estimator(&router);
        let mut aquifer = NoiseBasedAquifer::new(router, 0, 0, -64, 384, picker(), BLOCKS);
        assert_eq!(
            aquifer.compute_substance(NoisePos::new(4, -60, 4), -1.0, &mut est),
            Some(BLOCKS.lava)
        );
    }

    #[test]
    fn results_do_not_depend_on_query_order() {
        let router = Arc::new(overworld(9, &NoiseShape::OVERWORLD));
        let positions: Vec<NoisePos> = (0..16)
            .flat_map(|i| [NoisePos::new(i, -20 + i * 3, 15 - i), NoisePos::new(15 - i, 40, i)])
            .collect();

        let mut forward = NoiseBasedAquifer::new(router.clone(), 0, 0, -64, 384, picker(), BLOCKS);
        let mut est = estimator(&router);
        let a: Vec<_> = positions
            .iter()
            .map(|&p| forward.compute_substance(p, -0.1, &mut est))
            .collect();

        let mut backward = NoiseBasedAquifer::new(router.clone(), 0, 0, -64, 384, picker(), BLOCKS);
        let mut est = estimator(&router);
        let mut b: Vec<_> = positions
            .iter()
            .rev()
            .map(|&p| backward.compute_substance(p, -0.1, &mut est))
            .collect();
        b.reverse();

        assert_eq!(a, b);
    }

    #[test]
    fn sea_level_aquifer_floods_below_sea() {
        let router = overworld(3, &NoiseShape::OVERWORLD);
        let mut est = estimator(&router);
        let mut aquifer = SeaLevelAquifer::new(picker(), BLOCKS.air);
        assert_eq!(aquifer.compute_substance(NoisePos::new(0, 40, 0), -0.5, &mut est), Some(BLOCKS.water));
        assert_eq!(aquifer.compute_substance(NoisePos::new(0, 80, 0), -0.5, &mut est), Some(BLOCKS.air));
    }
}
