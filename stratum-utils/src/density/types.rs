use std::sync::Arc;

use crate::noise::NormalNoise;

use super::spline::CubicSpline;

/// Block coordinates a density function is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoisePos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl NoisePos {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Unary shaping applied to a single input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapper {
    Abs,
    Square,
    Cube,
    /// Halves negative values.
    HalfNegative,
    /// Quarters negative values.
    QuarterNegative,
    /// Clamps to `[-1, 1]` then applies `x/2 - x^3/24`.
    Squeeze,
}

/// Evaluation hints that leave the value unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Trilinearly interpolated between noise cell corners inside a chunk fill.
    Interpolated,
    /// Sampled once per quart column at y = 0. Plain evaluation snaps to the
    /// same quart column, so the cache never changes a result.
    FlatCache,
    /// Remembers the value of the last column evaluated.
    Cache2d,
}

/// A node of the density graph.
#[derive(Debug, Clone)]
pub enum DensityFunction {
    Constant(f64),
    /// Linear map of y from `[from_y, to_y]` onto `[from_value, to_value]`, clamped.
    YClampedGradient {
        from_y: i32,
        to_y: i32,
        from_value: f64,
        to_value: f64,
    },
    Noise {
        noise: Arc<NormalNoise>,
        xz_scale: f64,
        y_scale: f64,
    },
    /// Noise sampled at coordinates displaced by three other functions.
    ShiftedNoise {
        shift_x: Arc<DensityFunction>,
        shift_y: Arc<DensityFunction>,
        shift_z: Arc<DensityFunction>,
        xz_scale: f64,
        y_scale: f64,
        noise: Arc<NormalNoise>,
    },
    /// Horizontal offset noise sampled on the x/z plane.
    ShiftA(Arc<NormalNoise>),
    /// Horizontal offset noise sampled on the z/x plane.
    ShiftB(Arc<NormalNoise>),
    Add(Arc<DensityFunction>, Arc<DensityFunction>),
    Mul(Arc<DensityFunction>, Arc<DensityFunction>),
    Min(Arc<DensityFunction>, Arc<DensityFunction>),
    Max(Arc<DensityFunction>, Arc<DensityFunction>),
    Map(Mapper, Arc<DensityFunction>),
    Clamp {
        input: Arc<DensityFunction>,
        min: f64,
        max: f64,
    },
    /// Chooses between two functions by testing `input` against `[min, max)`.
    RangeChoice {
        input: Arc<DensityFunction>,
        min_inclusive: f64,
        max_exclusive: f64,
        when_in_range: Arc<DensityFunction>,
        when_out_of_range: Arc<DensityFunction>,
    },
    Spline(Arc<CubicSpline>),
    Marked(Marker, Arc<DensityFunction>),
}

impl DensityFunction {
    #[must_use]
    pub fn constant(value: f64) -> Arc<Self> {
        Arc::new(Self::Constant(value))
    }

    #[must_use]
    pub fn y_clamped_gradient(from_y: i32, to_y: i32, from_value: f64, to_value: f64) -> Arc<Self> {
        Arc::new(Self::YClampedGradient {
            from_y,
            to_y,
            from_value,
            to_value,
        })
    }

    #[must_use]
    pub fn noise(noise: Arc<NormalNoise>, xz_scale: f64, y_scale: f64) -> Arc<Self> {
        Arc::new(Self::Noise {
            noise,
            xz_scale,
            y_scale,
        })
    }

    #[must_use]
    pub fn add(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Add(a, b))
    }

    #[must_use]
    pub fn mul(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Mul(a, b))
    }

    #[must_use]
    pub fn min(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Min(a, b))
    }

    #[must_use]
    pub fn max(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Max(a, b))
    }

    #[must_use]
    pub fn map(mapper: Mapper, input: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Map(mapper, input))
    }

    #[must_use]
    pub fn clamp(input: Arc<Self>, min: f64, max: f64) -> Arc<Self> {
        Arc::new(Self::Clamp { input, min, max })
    }

    #[must_use]
    pub fn marked(marker: Marker, input: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Marked(marker, input))
    }

    #[must_use]
    pub fn spline(spline: CubicSpline) -> Arc<Self> {
        Arc::new(Self::Spline(Arc::new(spline)))
    }

    /// `a + b * input`, the most common affine shape in router graphs.
    #[must_use]
    pub fn affine(input: Arc<Self>, scale: f64, offset: f64) -> Arc<Self> {
        Self::add(Self::constant(offset), Self::mul(Self::constant(scale), input))
    }

    /// Identity key used by resolvers to recognise a node.
    #[inline]
    #[must_use]
    pub fn key(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    /// Visits every node below (and including) `self`, parents first.
    pub fn walk(self: &Arc<Self>, visit: &mut impl FnMut(&Arc<Self>)) {
        visit(self);
        match self.as_ref() {
            Self::Constant(_)
            | Self::YClampedGradient { .. }
            | Self::Noise { .. }
            | Self::ShiftA(_)
            | Self::ShiftB(_) => {}
            Self::ShiftedNoise {
                shift_x,
                shift_y,
                shift_z,
                ..
            } => {
                shift_x.walk(visit);
                shift_y.walk(visit);
                shift_z.walk(visit);
            }
            Self::Add(a, b) | Self::Mul(a, b) | Self::Min(a, b) | Self::Max(a, b) => {
                a.walk(visit);
                b.walk(visit);
            }
            Self::Map(_, input) | Self::Clamp { input, .. } | Self::Marked(_, input) => {
                input.walk(visit);
            }
            Self::RangeChoice {
                input,
                when_in_range,
                when_out_of_range,
                ..
            } => {
                input.walk(visit);
                when_in_range.walk(visit);
                when_out_of_range.walk(visit);
            }
            Self::Spline(spline) => spline.walk_functions(visit),
        }
    }
}
