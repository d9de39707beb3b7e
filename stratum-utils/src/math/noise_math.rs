//! Interpolation and rounding primitives.
//!
//! All floating point helpers operate on `f64` and are written so the exact
//! sequence of operations is fixed: terrain output must stay bit-identical
//! across builds, so none of these may be "simplified" algebraically.

/// Quintic fade curve `6t^5 - 15t^4 + 10t^3` used between gradient lattice points.
#[inline]
#[must_use]
pub fn smoothstep(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Rounds toward negative infinity.
#[inline]
#[must_use]
pub fn floor(v: f64) -> i32 {
    let truncated = v as i32;
    if v < f64::from(truncated) { truncated - 1 } else { truncated }
}

/// 64-bit variant of [`floor`].
#[inline]
#[must_use]
pub fn lfloor(v: f64) -> i64 {
    let truncated = v as i64;
    if v < truncated as f64 { truncated - 1 } else { truncated }
}

/// Integer division rounding toward negative infinity.
#[inline]
#[must_use]
pub const fn floor_div(a: i32, b: i32) -> i32 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q }
}

/// Remainder with the sign of the divisor.
#[inline]
#[must_use]
pub const fn floor_mod(a: i32, b: i32) -> i32 {
    a - floor_div(a, b) * b
}

#[inline]
#[must_use]
pub fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

#[inline]
#[must_use]
pub fn lerp2(tx: f64, ty: f64, v00: f64, v10: f64, v01: f64, v11: f64) -> f64 {
    lerp(ty, lerp(tx, v00, v10), lerp(tx, v01, v11))
}

/// Trilinear interpolation. Corner naming is `v{x}{y}{z}`.
#[inline]
#[must_use]
pub fn lerp3(
    tx: f64,
    ty: f64,
    tz: f64,
    v000: f64,
    v100: f64,
    v010: f64,
    v110: f64,
    v001: f64,
    v101: f64,
    v011: f64,
    v111: f64,
) -> f64 {
    lerp(
        tz,
        lerp2(tx, ty, v000, v100, v010, v110),
        lerp2(tx, ty, v001, v101, v011, v111),
    )
}

/// Position of `value` between `start` and `end` as a fraction.
#[inline]
#[must_use]
pub fn inverse_lerp(value: f64, start: f64, end: f64) -> f64 {
    (value - start) / (end - start)
}

/// [`lerp`] with the factor clamped to `[0, 1]`.
#[inline]
#[must_use]
pub fn clamped_lerp(start: f64, end: f64, t: f64) -> f64 {
    if t < 0.0 {
        start
    } else if t > 1.0 {
        end
    } else {
        lerp(t, start, end)
    }
}

/// Maps `value` from `[from_start, from_end]` onto `[to_start, to_end]`, clamped.
#[inline]
#[must_use]
pub fn clamped_map(value: f64, from_start: f64, from_end: f64, to_start: f64, to_end: f64) -> f64 {
    clamped_lerp(to_start, to_end, inverse_lerp(value, from_start, from_end))
}

#[inline]
#[must_use]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

#[inline]
#[must_use]
pub fn square(x: f64) -> f64 {
    x * x
}

#[inline]
#[must_use]
pub fn cube(x: f64) -> f64 {
    x * x * x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_rounds_down_for_negatives() {
        assert_eq!(floor(2.7), 2);
        assert_eq!(floor(-0.1), -1);
        assert_eq!(floor(-3.0), -3);
        assert_eq!(lfloor(-1e12 - 0.5), -1_000_000_000_001);
    }

    #[test]
    fn floor_div_and_mod_agree() {
        for a in -20..20 {
            for b in [4, 8, 16] {
                let q = floor_div(a, b);
                let r = floor_mod(a, b);
                assert_eq!(q * b + r, a);
                assert!((0..b).contains(&r), "{a} mod {b} gave {r}");
            }
        }
        assert_eq!(floor_div(-1, 4), -1);
        assert_eq!(floor_div(-4, 4), -1);
        assert_eq!(floor_div(-5, 4), -2);
    }

    #[test]
    fn smoothstep_fixes_endpoints_and_midpoint() {
        assert!(smoothstep(0.0).abs() < 1e-12);
        assert!((smoothstep(1.0) - 1.0).abs() < 1e-12);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn clamped_map_saturates() {
        assert!((clamped_map(-10.0, 0.0, 1.0, 2.0, 4.0) - 2.0).abs() < 1e-12);
        assert!((clamped_map(0.25, 0.0, 1.0, 2.0, 4.0) - 2.5).abs() < 1e-12);
        assert!((clamped_map(9.0, 0.0, 1.0, 2.0, 4.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn lerp3_hits_corners() {
        let corners = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let at = |x, y, z| {
            lerp3(
                x, y, z, corners[0], corners[1], corners[2], corners[3], corners[4], corners[5],
                corners[6], corners[7],
            )
        };
        assert!((at(0.0, 0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((at(1.0, 1.0, 1.0) - 8.0).abs() < 1e-12);
        assert!((at(1.0, 0.0, 1.0) - 6.0).abs() < 1e-12);
    }
}
