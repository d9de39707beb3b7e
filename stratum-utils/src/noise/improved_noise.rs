use crate::math::{floor, lerp3, smoothstep};
use crate::random::Random;

/// The 12 edge directions of a cube, padded to 16 so the hash can be masked.
const GRADIENTS: [[i8; 3]; 16] = [
    [1, 1, 0],
    [-1, 1, 0],
    [1, -1, 0],
    [-1, -1, 0],
    [1, 0, 1],
    [-1, 0, 1],
    [1, 0, -1],
    [-1, 0, -1],
    [0, 1, 1],
    [0, -1, 1],
    [0, 1, -1],
    [0, -1, -1],
    [1, 1, 0],
    [0, -1, 1],
    [-1, 1, 0],
    [0, -1, -1],
];

/// One octave of gradient noise with a shuffled permutation table and a
/// random origin offset.
#[derive(Debug, Clone)]
pub struct ImprovedNoise {
    permutation: [u8; 256],
    pub origin: [f64; 3],
}

impl ImprovedNoise {
    /// Draws the origin first, then shuffles the permutation table.
    pub fn new<R: Random>(random: &mut R) -> Self {
        let origin = [
            random.next_f64() * 256.0,
            random.next_f64() * 256.0,
            random.next_f64() * 256.0,
        ];

        let mut permutation: [u8; 256] = std::array::from_fn(|i| i as u8);
        for i in 0..256 {
            let j = i + random.next_i32_bounded((256 - i) as i32) as usize;
            permutation.swap(i, j);
        }

        Self { permutation, origin }
    }

    #[inline]
    #[must_use]
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        self.sample_scaled(x, y, z, 0.0, 0.0)
    }

    /// Samples with vertical quantisation.
    ///
    /// With a non-zero `y_scale` the fractional y used for the gradient dot
    /// products is snapped down to a multiple of `y_scale`, capped by
    /// `y_max` when that is non-negative. The fade along y still uses the
    /// unsnapped fraction.
    #[must_use]
    pub fn sample_scaled(&self, x: f64, y: f64, z: f64, y_scale: f64, y_max: f64) -> f64 {
        let x = x + self.origin[0];
        let y = y + self.origin[1];
        let z = z + self.origin[2];

        let cell_x = floor(x);
        let cell_y = floor(y);
        let cell_z = floor(z);

        let fx = x - f64::from(cell_x);
        let fy = y - f64::from(cell_y);
        let fz = z - f64::from(cell_z);

        let snap = if y_scale == 0.0 {
            0.0
        } else {
            let limit = if y_max >= 0.0 && y_max < fy { y_max } else { fy };
            (limit / y_scale + 1.0e-7).floor() * y_scale
        };

        self.blend_corners(cell_x, cell_y, cell_z, fx, fy - snap, fz, fy)
    }

    #[inline]
    const fn hash(&self, i: i32) -> i32 {
        self.permutation[(i & 0xFF) as usize] as i32
    }

    fn blend_corners(&self, cx: i32, cy: i32, cz: i32, fx: f64, fy: f64, fz: f64, fade_y: f64) -> f64 {
        let h0 = self.hash(cx);
        let h1 = self.hash(cx + 1);
        let h00 = self.hash(h0 + cy);
        let h01 = self.hash(h0 + cy + 1);
        let h10 = self.hash(h1 + cy);
        let h11 = self.hash(h1 + cy + 1);

        let d000 = dot(self.hash(h00 + cz), fx, fy, fz);
        let d100 = dot(self.hash(h10 + cz), fx - 1.0, fy, fz);
        let d010 = dot(self.hash(h01 + cz), fx, fy - 1.0, fz);
        let d110 = dot(self.hash(h11 + cz), fx - 1.0, fy - 1.0, fz);
        let d001 = dot(self.hash(h00 + cz + 1), fx, fy, fz - 1.0);
        let d101 = dot(self.hash(h10 + cz + 1), fx - 1.0, fy, fz - 1.0);
        let d011 = dot(self.hash(h01 + cz + 1), fx, fy - 1.0, fz - 1.0);
        let d111 = dot(self.hash(h11 + cz + 1), fx - 1.0, fy - 1.0, fz - 1.0);

        lerp3(
            smoothstep(fx),
            smoothstep(fade_y),
            smoothstep(fz),
            d000,
            d100,
            d010,
            d110,
            d001,
            d101,
            d011,
            d111,
        )
    }
}

#[inline]
fn dot(hash: i32, x: f64, y: f64, z: f64) -> f64 {
    let g = GRADIENTS[(hash & 15) as usize];
    f64::from(g[0]) * x + f64::from(g[1]) * y + f64::from(g[2]) * z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::Xoroshiro;

    #[test]
    fn permutation_is_a_shuffle_of_all_bytes() {
        let noise = ImprovedNoise::new(&mut Xoroshiro::from_seed(3));
        let mut seen = [false; 256];
        for &p in &noise.permutation {
            seen[p as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn zero_at_lattice_points() {
        let noise = ImprovedNoise::new(&mut Xoroshiro::from_seed(3));
        let [ox, oy, oz] = noise.origin;
        let v = noise.sample(5.0 - ox.fract(), 7.0 - oy.fract(), -2.0 - oz.fract());
        assert!(v.abs() < 1e-9, "gradient noise must vanish on the lattice, got {v}");
    }

    #[test]
    fn bounded_output() {
        let noise = ImprovedNoise::new(&mut Xoroshiro::from_seed(11));
        for i in 0..400 {
            let t = f64::from(i) * 0.37;
            let v = noise.sample(t, t * 0.5, -t);
            assert!((-1.1..=1.1).contains(&v), "{v} out of range at {t}");
        }
    }
}
