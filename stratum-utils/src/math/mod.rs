//! Scalar helpers shared by noise sampling, density evaluation and terrain.
pub mod noise_math;

pub use noise_math::{
    clamp, clamped_lerp, clamped_map, cube, floor, floor_div, floor_mod, inverse_lerp, lerp,
    lerp2, lerp3, lfloor, smoothstep, square,
};
