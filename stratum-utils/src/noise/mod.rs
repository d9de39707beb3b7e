//! Gradient noise building blocks.
//!
//! | Type | Role |
//! |------|------|
//! | [`ImprovedNoise`] | single octave of 3D gradient noise |
//! | [`PerlinNoise`] | sum of octaves at doubling frequencies |
//! | [`NormalNoise`] | two offset [`PerlinNoise`] stacks, normalised to a target deviation |
//!
//! Density functions only ever sample [`NormalNoise`]; the other two are
//! public so benches and tests can poke at the layers separately.

mod improved_noise;
mod normal_noise;
mod perlin_noise;

pub use improved_noise::ImprovedNoise;
pub use normal_noise::{NoiseParameters, NormalNoise};
pub use perlin_noise::PerlinNoise;
