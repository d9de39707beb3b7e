use crate::noise::ImprovedNoise;
use crate::random::{PositionalRandom, Random, RandomSource};

/// Coordinates are wrapped modulo 2^25 before sampling to keep precision far
/// from the origin.
const WRAP_PERIOD: f64 = 33_554_432.0;

#[inline]
fn wrap(v: f64) -> f64 {
    v - (v / WRAP_PERIOD + 0.5).floor() * WRAP_PERIOD
}

/// Octave stack of [`ImprovedNoise`].
///
/// Octave `i` samples at `2^(first_octave + i)` frequency and contributes
/// `amplitudes[i]` scaled by a halving value factor. Zero amplitudes leave
/// the octave unallocated.
#[derive(Debug, Clone)]
pub struct PerlinNoise {
    octaves: Vec<Option<ImprovedNoise>>,
    amplitudes: Vec<f64>,
    base_frequency: f64,
    base_value_factor: f64,
    max_value: f64,
}

impl PerlinNoise {
    /// Builds the stack from a sequential source.
    ///
    /// A positional factory is forked off `random` (two draws) and each
    /// octave is seeded by hashing its name, so two stacks built back to back
    /// from the same source differ.
    #[must_use]
    pub fn new(random: &mut RandomSource, first_octave: i32, amplitudes: &[f64]) -> Self {
        let splitter = random.next_positional();
        let octaves = amplitudes
            .iter()
            .enumerate()
            .map(|(i, &amplitude)| {
                (amplitude != 0.0).then(|| {
                    let name = format!("octave_{}", first_octave + i as i32);
                    ImprovedNoise::new(&mut splitter.with_hash_of(&name))
                })
            })
            .collect();

        let count = amplitudes.len() as i32;
        let base_frequency = 2.0_f64.powi(first_octave);
        let base_value_factor = 2.0_f64.powi(count - 1) / (2.0_f64.powi(count) - 1.0);

        let mut stack = Self {
            octaves,
            amplitudes: amplitudes.to_vec(),
            base_frequency,
            base_value_factor,
            max_value: 0.0,
        };
        stack.max_value = stack.bound(2.0);
        stack
    }

    fn bound(&self, per_octave: f64) -> f64 {
        let mut total = 0.0;
        let mut factor = self.base_value_factor;
        for (octave, amplitude) in self.octaves.iter().zip(&self.amplitudes) {
            if octave.is_some() {
                total += amplitude * per_octave * factor;
            }
            factor /= 2.0;
        }
        total
    }

    #[must_use]
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.base_frequency;
        let mut factor = self.base_value_factor;

        for (octave, amplitude) in self.octaves.iter().zip(&self.amplitudes) {
            if let Some(noise) = octave {
                let v = noise.sample(wrap(x * frequency), wrap(y * frequency), wrap(z * frequency));
                total += amplitude * v * factor;
            }
            frequency *= 2.0;
            factor /= 2.0;
        }

        total
    }

    /// Largest absolute value [`sample`](Self::sample) can return.
    #[inline]
    #[must_use]
    pub const fn max_value(&self) -> f64 {
        self.max_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::Xoroshiro;

    #[test]
    fn wrap_keeps_small_values() {
        assert!((wrap(123.5) - 123.5).abs() < 1e-12);
        assert!(wrap(1.0e9).abs() <= WRAP_PERIOD / 2.0);
    }

    #[test]
    fn consecutive_stacks_differ() {
        let mut random = Xoroshiro::from_seed(12);
        let a = PerlinNoise::new(&mut random, -4, &[1.0, 1.0, 1.0]);
        let b = PerlinNoise::new(&mut random, -4, &[1.0, 1.0, 1.0]);
        assert!((a.sample(40.3, 2.0, 9.1) - b.sample(40.3, 2.0, 9.1)).abs() > 1e-6);
    }

    #[test]
    fn samples_respect_max_value() {
        let mut random = Xoroshiro::from_seed(12);
        let noise = PerlinNoise::new(&mut random, -3, &[1.0, 0.0, 0.5, 0.25]);
        for i in 0..500 {
            let t = f64::from(i) * 1.73;
            assert!(noise.sample(t, -t, t * 0.3).abs() <= noise.max_value());
        }
    }
}
