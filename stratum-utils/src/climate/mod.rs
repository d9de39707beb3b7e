//! Climate parameter space used for biome selection.
//!
//! Six density functions (temperature, humidity, continentalness, erosion,
//! depth, weirdness) are sampled at a quart position, quantised to integers
//! and matched against a table of biome reference regions. The biome with the
//! smallest squared distance wins.

mod sampler;
mod types;

pub use sampler::ClimateSampler;
pub use types::{Parameter, ParameterList, ParameterPoint, TargetPoint};

/// Scale applied before truncating a climate value to an integer.
pub const QUANTIZATION_FACTOR: f32 = 10_000.0;

/// Quantises through `f32` so the rounding is the same on every platform.
#[inline]
#[must_use]
pub fn quantize_coord(value: f64) -> i64 {
    ((value as f32) * QUANTIZATION_FACTOR) as i64
}

#[inline]
#[must_use]
pub fn unquantize_coord(value: i64) -> f32 {
    value as f32 / QUANTIZATION_FACTOR
}
