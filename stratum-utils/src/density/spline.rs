//! Cubic Hermite splines over a density coordinate.
//!
//! Spline math is done in `f32`; terrain shape depends on the exact rounding.

use std::sync::Arc;

use super::evaluator::MarkerResolver;
use super::types::{DensityFunction, NoisePos};

/// Value of a spline point: a constant or a nested spline.
#[derive(Debug, Clone)]
pub enum SplineValue {
    Constant(f32),
    Spline(Arc<CubicSpline>),
}

impl SplineValue {
    fn apply<R: MarkerResolver + ?Sized>(&self, pos: NoisePos, resolver: &R) -> f32 {
        match self {
            Self::Constant(v) => *v,
            Self::Spline(spline) => spline.apply(pos, resolver),
        }
    }
}

impl From<f32> for SplineValue {
    fn from(value: f32) -> Self {
        Self::Constant(value)
    }
}

impl From<CubicSpline> for SplineValue {
    fn from(spline: CubicSpline) -> Self {
        Self::Spline(Arc::new(spline))
    }
}

#[derive(Debug, Clone)]
pub struct SplinePoint {
    pub location: f32,
    pub value: SplineValue,
    pub derivative: f32,
}

/// A spline over the value of `coordinate`. Points are sorted by location.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    coordinate: Arc<DensityFunction>,
    points: Vec<SplinePoint>,
}

impl CubicSpline {
    #[must_use]
    pub const fn new(coordinate: Arc<DensityFunction>) -> Self {
        Self {
            coordinate,
            points: Vec::new(),
        }
    }

    /// Appends a point; locations must be strictly increasing.
    #[must_use]
    pub fn point(mut self, location: f32, value: impl Into<SplineValue>, derivative: f32) -> Self {
        debug_assert!(
            self.points.last().is_none_or(|p| p.location < location),
            "spline locations must increase"
        );
        self.points.push(SplinePoint {
            location,
            value: value.into(),
            derivative,
        });
        self
    }

    pub fn apply<R: MarkerResolver + ?Sized>(&self, pos: NoisePos, resolver: &R) -> f32 {
        let at = self.coordinate.compute_with(pos, resolver) as f32;
        let last = self.points.len() - 1;

        let start = match self.points.iter().rposition(|p| p.location <= at) {
            None => return self.extend(at, 0, pos, resolver),
            Some(i) if i == last => return self.extend(at, last, pos, resolver),
            Some(i) => i,
        };

        let a = &self.points[start];
        let b = &self.points[start + 1];
        let width = b.location - a.location;
        let t = (at - a.location) / width;
        let va = a.value.apply(pos, resolver);
        let vb = b.value.apply(pos, resolver);
        let p = a.derivative * width - (vb - va);
        let q = -b.derivative * width + (vb - va);

        lerp_f32(t, va, vb) + t * (1.0 - t) * lerp_f32(t, p, q)
    }

    /// Linear continuation past either end using the end point's derivative.
    fn extend<R: MarkerResolver + ?Sized>(&self, at: f32, index: usize, pos: NoisePos, resolver: &R) -> f32 {
        let point = &self.points[index];
        let value = point.value.apply(pos, resolver);
        if point.derivative == 0.0 {
            value
        } else {
            value + point.derivative * (at - point.location)
        }
    }

    pub(super) fn walk_functions(&self, visit: &mut impl FnMut(&Arc<DensityFunction>)) {
        self.coordinate.walk(visit);
        for point in &self.points {
            if let SplineValue::Spline(nested) = &point.value {
                nested.walk_functions(visit);
            }
        }
    }
}

#[inline]
fn lerp_f32(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::NoMarkers;

    fn spline_over_y(points: &[(f32, f32, f32)]) -> CubicSpline {
        let coordinate = DensityFunction::y_clamped_gradient(-100, 100, -1.0, 1.0);
        points
            .iter()
            .fold(CubicSpline::new(coordinate), |s, &(l, v, d)| s.point(l, v, d))
    }

    fn at_y(spline: &CubicSpline, y: i32) -> f32 {
        spline.apply(NoisePos::new(0, y, 0), &NoMarkers)
    }

    #[test]
    fn passes_through_points() {
        let spline = spline_over_y(&[(-0.5, 2.0, 0.0), (0.5, 4.0, 0.0)]);
        assert!((at_y(&spline, -50) - 2.0).abs() < 1e-6);
        assert!((at_y(&spline, 50) - 4.0).abs() < 1e-6);
        assert!((at_y(&spline, 0) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn flat_outside_without_derivative() {
        let spline = spline_over_y(&[(-0.5, 2.0, 0.0), (0.5, 4.0, 0.0)]);
        assert!((at_y(&spline, -100) - 2.0).abs() < 1e-6);
        assert!((at_y(&spline, 100) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn extends_linearly_with_derivative() {
        let spline = spline_over_y(&[(0.0, 1.0, 2.0), (0.5, 1.0, 0.0)]);
        assert!((at_y(&spline, -50) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn nested_values_are_evaluated() {
        let inner = spline_over_y(&[(-1.0, 10.0, 0.0), (1.0, 20.0, 0.0)]);
        let coordinate = DensityFunction::constant(0.0);
        let outer = CubicSpline::new(coordinate)
            .point(-1.0, 0.0, 0.0)
            .point(0.0, inner, 0.0)
            .point(1.0, 0.0, 0.0);
        assert!((at_y(&outer, 0) - 15.0).abs() < 1e-5);
    }
}
