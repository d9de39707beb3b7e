//! Density function graph.
//!
//! A density function maps a block position to a scalar. Terrain is solid
//! wherever the final density is positive; the climate parameters used for
//! biome selection are density functions too.
//!
//! Graphs are built once per world from the seed (see
//! [`crate::noise_router::overworld`]) and shared as `Arc<DensityFunction>`.
//! Evaluation is pure: the same position always yields the same value.
//!
//! # Markers
//!
//! [`Marker`] nodes do not change the value of their input in plain
//! evaluation. A chunk-scoped [`MarkerResolver`] can substitute a value for
//! them, which is how cell interpolation and per-chunk flat caches plug in
//! without the graph knowing about chunks.

mod evaluator;
mod spline;
mod types;

pub use evaluator::{MarkerResolver, NoMarkers};
pub use spline::{CubicSpline, SplinePoint, SplineValue};
pub use types::{DensityFunction, Mapper, Marker, NoisePos};
