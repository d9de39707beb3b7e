use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::density::{DensityFunction, NoisePos};

/// Density above which the estimator treats a sample as ground.
const GROUND_THRESHOLD: f64 = 0.390_625;

/// Cheap estimate of where the surface lies, used by aquifers and surface
/// rules before (or without) a full fill.
///
/// Columns are snapped to quart positions and searched top-down one noise
/// cell at a time, so the estimate is coarse but stable.
pub struct SurfaceHeightEstimator {
    density: Arc<DensityFunction>,
    min_y: i32,
    max_y: i32,
    step: i32,
    cache: FxHashMap<u64, i32>,
}

impl SurfaceHeightEstimator {
    #[must_use]
    pub fn new(density: Arc<DensityFunction>, min_y: i32, max_y: i32, step: i32) -> Self {
        Self {
            density,
            min_y,
            max_y,
            step,
            cache: FxHashMap::default(),
        }
    }

    pub fn estimate(&mut self, x: i32, z: i32) -> i32 {
        let qx = (x >> 2) << 2;
        let qz = (z >> 2) << 2;
        let key = (qx as u32 as u64) | ((qz as u32 as u64) << 32);
        if let Some(&height) = self.cache.get(&key) {
            return height;
        }
        let height = self.search(qx, qz);
        self.cache.insert(key, height);
        height
    }

    fn search(&self, x: i32, z: i32) -> i32 {
        let top = (self.max_y / self.step) * self.step;
        let mut y = top;
        while y >= self.min_y {
            if self.density.compute(NoisePos::new(x, y, z)) > GROUND_THRESHOLD {
                return y;
            }
            y -= self.step;
        }
        self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_cell_above_threshold() {
        // 1.0 at y = 0 falling to 0.0 at y = 64: crosses the threshold near y = 39.
        let density = DensityFunction::y_clamped_gradient(0, 64, 1.0, 0.0);
        let mut estimator = SurfaceHeightEstimator::new(density, -64, 320, 8);
        assert_eq!(estimator.estimate(3, 3), 32);
        assert_eq!(estimator.estimate(0, 1), 32);
    }

    #[test]
    fn falls_back_to_min_y() {
        let mut estimator = SurfaceHeightEstimator::new(DensityFunction::constant(-1.0), -64, 320, 8);
        assert_eq!(estimator.estimate(100, -100), -64);
    }
}
