use std::sync::Arc;

use crate::density::{DensityFunction, MarkerResolver, NoMarkers, NoisePos};

use super::TargetPoint;

/// Samples the six climate functions of a router.
#[derive(Debug, Clone)]
pub struct ClimateSampler {
    pub temperature: Arc<DensityFunction>,
    pub humidity: Arc<DensityFunction>,
    pub continentalness: Arc<DensityFunction>,
    pub erosion: Arc<DensityFunction>,
    pub depth: Arc<DensityFunction>,
    pub weirdness: Arc<DensityFunction>,
}

impl ClimateSampler {
    /// Samples at quart coordinates (block coordinate divided by four).
    #[must_use]
    pub fn sample(&self, quart_x: i32, quart_y: i32, quart_z: i32) -> TargetPoint {
        self.sample_with(quart_x, quart_y, quart_z, &NoMarkers)
    }

    pub fn sample_with<R: MarkerResolver + ?Sized>(
        &self,
        quart_x: i32,
        quart_y: i32,
        quart_z: i32,
        resolver: &R,
    ) -> TargetPoint {
        let pos = NoisePos::new(quart_x << 2, quart_y << 2, quart_z << 2);
        TargetPoint::from_values(
            self.temperature.compute_with(pos, resolver),
            self.humidity.compute_with(pos, resolver),
            self.continentalness.compute_with(pos, resolver),
            self.erosion.compute_with(pos, resolver),
            self.depth.compute_with(pos, resolver),
            self.weirdness.compute_with(pos, resolver),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quart_coordinates_are_scaled_to_blocks() {
        let gradient = DensityFunction::y_clamped_gradient(0, 100, 0.0, 1.0);
        let zero = DensityFunction::constant(0.0);
        let sampler = ClimateSampler {
            temperature: zero.clone(),
            humidity: zero.clone(),
            continentalness: zero.clone(),
            erosion: zero.clone(),
            depth: gradient,
            weirdness: zero,
        };
        let target = sampler.sample(3, 5, -2);
        assert_eq!(target.depth, 2000);
        assert_eq!(target.temperature, 0);
    }
}
