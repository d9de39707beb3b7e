//! Terrain noise routing.
//!
//! A [`NoiseRouter`] bundles every density function terrain generation reads,
//! built once per world seed. Around it sit the samplers that turn density
//! into blocks:
//!
//! | Module | Role |
//! |--------|------|
//! | [`overworld`] | builds the router graph for the overworld |
//! | [`surface_height`] | coarse top-down search for the preliminary surface |
//! | [`fluid_level`] | global fluid picker (sea level water, deep lava) |
//! | [`aquifer`] | underground fluid placement between jittered grid cells |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::climate::ClimateSampler;
use crate::density::DensityFunction;
use crate::math::floor_div;
use crate::random::RandomSplitter;

pub mod aquifer;
pub mod fluid_level;
pub mod overworld;
pub mod surface_height;

pub use aquifer::{Aquifer, AquiferSampler, NoiseBasedAquifer, SeaLevelAquifer};
pub use fluid_level::{FluidLevel, FluidPicker};
pub use surface_height::SurfaceHeightEstimator;

/// Vertical extent and noise cell size of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseShape {
    pub min_y: i32,
    pub height: i32,
    /// Horizontal cell size in blocks.
    pub cell_width: i32,
    /// Vertical cell size in blocks.
    pub cell_height: i32,
}

impl NoiseShape {
    pub const OVERWORLD: Self = Self {
        min_y: -64,
        height: 384,
        cell_width: 4,
        cell_height: 8,
    };

    /// Exclusive upper build limit.
    #[inline]
    #[must_use]
    pub const fn max_y(&self) -> i32 {
        self.min_y + self.height
    }

    #[inline]
    #[must_use]
    pub const fn min_cell_y(&self) -> i32 {
        floor_div(self.min_y, self.cell_height)
    }

    #[inline]
    #[must_use]
    pub const fn cell_count_y(&self) -> i32 {
        floor_div(self.height, self.cell_height)
    }

    #[inline]
    #[must_use]
    pub const fn cell_count_xz(&self) -> i32 {
        16 / self.cell_width
    }
}

impl Default for NoiseShape {
    fn default() -> Self {
        Self::OVERWORLD
    }
}

/// Every density function terrain generation reads, plus the seeded random
/// factory later stages derive their streams from.
#[derive(Debug, Clone)]
pub struct NoiseRouter {
    pub barrier: Arc<DensityFunction>,
    pub fluid_level_floodedness: Arc<DensityFunction>,
    pub fluid_level_spread: Arc<DensityFunction>,
    pub lava: Arc<DensityFunction>,
    pub temperature: Arc<DensityFunction>,
    pub vegetation: Arc<DensityFunction>,
    pub continents: Arc<DensityFunction>,
    pub erosion: Arc<DensityFunction>,
    pub depth: Arc<DensityFunction>,
    pub ridges: Arc<DensityFunction>,
    /// Density used by the surface height estimate; no 3D detail or caves.
    pub initial_density_without_jaggedness: Arc<DensityFunction>,
    /// Solid wherever positive.
    pub final_density: Arc<DensityFunction>,
    pub random: RandomSplitter,
}

impl NoiseRouter {
    #[must_use]
    pub fn climate_sampler(&self) -> ClimateSampler {
        ClimateSampler {
            temperature: self.temperature.clone(),
            humidity: self.vegetation.clone(),
            continentalness: self.continents.clone(),
            erosion: self.erosion.clone(),
            depth: self.depth.clone(),
            weirdness: self.ridges.clone(),
        }
    }
}
