use serde::{Deserialize, Serialize};

use crate::noise::PerlinNoise;
use crate::random::{PositionalRandom, RandomSource, RandomSplitter};

/// Second stack samples at coordinates scaled by this factor.
const SECOND_STACK_SCALE: f64 = 1.018_126_888_217_522_7;
const TARGET_DEVIATION: f64 = 1.0 / 6.0;

/// Octave layout for one named noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseParameters {
    pub first_octave: i32,
    pub amplitudes: Vec<f64>,
}

impl NoiseParameters {
    #[must_use]
    pub fn new(first_octave: i32, amplitudes: &[f64]) -> Self {
        Self {
            first_octave,
            amplitudes: amplitudes.to_vec(),
        }
    }
}

/// Sum of two [`PerlinNoise`] stacks, rescaled so the output deviation stays
/// near 1/6 regardless of how many octaves are active.
#[derive(Debug, Clone)]
pub struct NormalNoise {
    first: PerlinNoise,
    second: PerlinNoise,
    value_factor: f64,
    max_value: f64,
}

impl NormalNoise {
    #[must_use]
    pub fn new(random: &mut RandomSource, parameters: &NoiseParameters) -> Self {
        let first = PerlinNoise::new(random, parameters.first_octave, &parameters.amplitudes);
        let second = PerlinNoise::new(random, parameters.first_octave, &parameters.amplitudes);

        let active = parameters
            .amplitudes
            .iter()
            .enumerate()
            .filter(|(_, a)| **a != 0.0)
            .map(|(i, _)| i as i32);
        let span = match (active.clone().min(), active.max()) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0,
        };

        let value_factor = TARGET_DEVIATION / expected_deviation(span);
        let max_value = (first.max_value() + second.max_value()) * value_factor;

        Self {
            first,
            second,
            value_factor,
            max_value,
        }
    }

    /// Seeds the noise from `splitter` hashed with `id`.
    #[must_use]
    pub fn named(splitter: &RandomSplitter, id: &str, parameters: &NoiseParameters) -> Self {
        Self::new(&mut splitter.with_hash_of(id), parameters)
    }

    #[inline]
    #[must_use]
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let a = self.first.sample(x, y, z);
        let b = self.second.sample(
            x * SECOND_STACK_SCALE,
            y * SECOND_STACK_SCALE,
            z * SECOND_STACK_SCALE,
        );
        (a + b) * self.value_factor
    }

    #[inline]
    #[must_use]
    pub const fn max_value(&self) -> f64 {
        self.max_value
    }
}

fn expected_deviation(octave_span: i32) -> f64 {
    0.1 * (1.0 + 1.0 / f64::from(octave_span + 1))
}
