use crate::math::{clamp, clamped_map, cube, square};

use super::types::{DensityFunction, Mapper, Marker, NoisePos};

/// Supplies substitute values for [`Marker`] nodes.
///
/// Returning `None` makes the evaluator compute the marked input directly.
pub trait MarkerResolver {
    fn resolve(&self, marker: Marker, node: &DensityFunction, pos: NoisePos) -> Option<f64>;
}

/// Resolver that never substitutes.
pub struct NoMarkers;

impl MarkerResolver for NoMarkers {
    #[inline]
    fn resolve(&self, _: Marker, _: &DensityFunction, _: NoisePos) -> Option<f64> {
        None
    }
}

impl DensityFunction {
    /// Evaluates without any chunk-scoped substitution.
    #[inline]
    #[must_use]
    pub fn compute(&self, pos: NoisePos) -> f64 {
        self.compute_with(pos, &NoMarkers)
    }

    /// Evaluates, letting `resolver` answer for marked nodes.
    pub fn compute_with<R: MarkerResolver + ?Sized>(&self, pos: NoisePos, resolver: &R) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::YClampedGradient {
                from_y,
                to_y,
                from_value,
                to_value,
            } => clamped_map(
                f64::from(pos.y),
                f64::from(*from_y),
                f64::from(*to_y),
                *from_value,
                *to_value,
            ),
            Self::Noise {
                noise,
                xz_scale,
                y_scale,
            } => noise.sample(
                f64::from(pos.x) * xz_scale,
                f64::from(pos.y) * y_scale,
                f64::from(pos.z) * xz_scale,
            ),
            Self::ShiftedNoise {
                shift_x,
                shift_y,
                shift_z,
                xz_scale,
                y_scale,
                noise,
            } => {
                let x = f64::from(pos.x) * xz_scale + shift_x.compute_with(pos, resolver);
                let y = f64::from(pos.y) * y_scale + shift_y.compute_with(pos, resolver);
                let z = f64::from(pos.z) * xz_scale + shift_z.compute_with(pos, resolver);
                noise.sample(x, y, z)
            }
            Self::ShiftA(noise) => {
                noise.sample(f64::from(pos.x) * 0.25, 0.0, f64::from(pos.z) * 0.25) * 4.0
            }
            Self::ShiftB(noise) => {
                noise.sample(f64::from(pos.z) * 0.25, f64::from(pos.x) * 0.25, 0.0) * 4.0
            }
            Self::Add(a, b) => a.compute_with(pos, resolver) + b.compute_with(pos, resolver),
            Self::Mul(a, b) => {
                let first = a.compute_with(pos, resolver);
                if first == 0.0 {
                    0.0
                } else {
                    first * b.compute_with(pos, resolver)
                }
            }
            Self::Min(a, b) => a.compute_with(pos, resolver).min(b.compute_with(pos, resolver)),
            Self::Max(a, b) => a.compute_with(pos, resolver).max(b.compute_with(pos, resolver)),
            Self::Map(mapper, input) => apply_mapper(*mapper, input.compute_with(pos, resolver)),
            Self::Clamp { input, min, max } => clamp(input.compute_with(pos, resolver), *min, *max),
            Self::RangeChoice {
                input,
                min_inclusive,
                max_exclusive,
                when_in_range,
                when_out_of_range,
            } => {
                let v = input.compute_with(pos, resolver);
                if v >= *min_inclusive && v < *max_exclusive {
                    when_in_range.compute_with(pos, resolver)
                } else {
                    when_out_of_range.compute_with(pos, resolver)
                }
            }
            Self::Spline(spline) => f64::from(spline.apply(pos, resolver)),
            Self::Marked(marker, input) => {
                if let Some(value) = resolver.resolve(*marker, self, pos) {
                    return value;
                }
                match marker {
                    Marker::FlatCache => {
                        let snapped = NoisePos::new((pos.x >> 2) << 2, 0, (pos.z >> 2) << 2);
                        input.compute_with(snapped, resolver)
                    }
                    Marker::Interpolated | Marker::Cache2d => input.compute_with(pos, resolver),
                }
            }
        }
    }
}

#[inline]
fn apply_mapper(mapper: Mapper, v: f64) -> f64 {
    match mapper {
        Mapper::Abs => v.abs(),
        Mapper::Square => square(v),
        Mapper::Cube => cube(v),
        Mapper::HalfNegative => {
            if v > 0.0 {
                v
            } else {
                v * 0.5
            }
        }
        Mapper::QuarterNegative => {
            if v > 0.0 {
                v
            } else {
                v * 0.25
            }
        }
        Mapper::Squeeze => {
            let c = clamp(v, -1.0, 1.0);
            c / 2.0 - c * c * c / 24.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;

    use super::*;
    use crate::density::Marker;
    use crate::noise::{NoiseParameters, NormalNoise};
    use crate::random::{Random, Xoroshiro};

    #[test]
    fn gradient_clamps_outside_range() {
        let f = DensityFunction::y_clamped_gradient(-64, 320, 1.5, -1.5);
        assert!((f.compute(NoisePos::new(0, -100, 0)) - 1.5).abs() < 1e-12);
        assert!((f.compute(NoisePos::new(0, 500, 0)) + 1.5).abs() < 1e-12);
        assert!(f.compute(NoisePos::new(0, 128, 0)).abs() < 1e-12);
    }

    #[test]
    fn mappers_shape_negatives() {
        let neg = DensityFunction::constant(-2.0);
        let half = DensityFunction::map(Mapper::HalfNegative, neg.clone());
        let quarter = DensityFunction::map(Mapper::QuarterNegative, neg.clone());
        let squeeze = DensityFunction::map(Mapper::Squeeze, neg);
        let origin = NoisePos::default();
        assert!((half.compute(origin) + 1.0).abs() < 1e-12);
        assert!((quarter.compute(origin) + 0.5).abs() < 1e-12);
        assert!((squeeze.compute(origin) - (-0.5 + 1.0 / 24.0)).abs() < 1e-12);
    }

    #[test]
    fn range_choice_uses_half_open_interval() {
        let f = Arc::new(DensityFunction::RangeChoice {
            input: DensityFunction::y_clamped_gradient(0, 10, 0.0, 10.0),
            min_inclusive: 0.0,
            max_exclusive: 5.0,
            when_in_range: DensityFunction::constant(1.0),
            when_out_of_range: DensityFunction::constant(-1.0),
        });
        assert!((f.compute(NoisePos::new(0, 0, 0)) - 1.0).abs() < 1e-12);
        assert!((f.compute(NoisePos::new(0, 5, 0)) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn flat_cache_snaps_to_quart_column() {
        let splitter = Xoroshiro::from_seed(1).next_positional();
        let noise = Arc::new(NormalNoise::named(&splitter, "flat", &NoiseParameters::new(-4, &[1.0])));
        let f = DensityFunction::marked(Marker::FlatCache, DensityFunction::noise(noise, 1.0, 1.0));
        let a = f.compute(NoisePos::new(8, 70, -3));
        let b = f.compute(NoisePos::new(11, -20, -1));
        assert_eq!(a.to_bits(), b.to_bits());
    }

    struct CountingResolver {
        hits: Cell<u32>,
    }

    impl MarkerResolver for CountingResolver {
        fn resolve(&self, marker: Marker, _: &DensityFunction, _: NoisePos) -> Option<f64> {
            self.hits.set(self.hits.get() + 1);
            (marker == Marker::Interpolated).then_some(42.0)
        }
    }

    #[test]
    fn resolver_overrides_marked_nodes() {
        let f = DensityFunction::add(
            DensityFunction::constant(1.0),
            DensityFunction::marked(Marker::Interpolated, DensityFunction::constant(5.0)),
        );
        let resolver = CountingResolver { hits: Cell::new(0) };
        assert!((f.compute_with(NoisePos::default(), &resolver) - 43.0).abs() < 1e-12);
        assert_eq!(resolver.hits.get(), 1);
        assert!((f.compute(NoisePos::default()) - 6.0).abs() < 1e-12);
    }
}
