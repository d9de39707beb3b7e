//! Xoroshiro128++ generator and its positional factory.

use super::{PositionalRandom, Random, RandomSplitter, position_seed};

const GOLDEN_RATIO_64: i64 = 0x9E37_79B9_7F4A_7C15_u64 as i64;
const SILVER_RATIO_64: i64 = 0x6A09_E667_F3BC_C909_u64 as i64;

const DOUBLE_UNIT: f64 = 1.0 / (1u64 << 53) as f64;
const FLOAT_UNIT: f32 = 1.0 / (1u32 << 24) as f32;

/// Stafford variant 13 of the splitmix64 finalizer.
#[inline]
const fn mix_stafford_13(mut z: i64) -> i64 {
    z = (z ^ ((z as u64) >> 30) as i64).wrapping_mul(0xBF58_476D_1CE4_E5B9_u64 as i64);
    z = (z ^ ((z as u64) >> 27) as i64).wrapping_mul(0x94D0_49BB_1331_11EB_u64 as i64);
    z ^ ((z as u64) >> 31) as i64
}

/// Xoroshiro128++ sequential generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xoroshiro {
    lo: i64,
    hi: i64,
}

impl Xoroshiro {
    /// Creates a generator from a 64-bit world seed, expanding it to 128 bits.
    #[must_use]
    pub const fn from_seed(seed: u64) -> Self {
        let lo = (seed as i64) ^ SILVER_RATIO_64;
        let hi = lo.wrapping_add(GOLDEN_RATIO_64);
        Self::from_state(mix_stafford_13(lo), mix_stafford_13(hi))
    }

    /// Creates a generator from a raw 128-bit state. An all-zero state is
    /// replaced, since xoroshiro would emit zeros forever.
    #[must_use]
    pub const fn from_state(lo: i64, hi: i64) -> Self {
        if lo == 0 && hi == 0 {
            Self {
                lo: GOLDEN_RATIO_64,
                hi: SILVER_RATIO_64,
            }
        } else {
            Self { lo, hi }
        }
    }

    /// Resets to the state `from_seed(seed)` would produce.
    pub const fn set_seed(&mut self, seed: u64) {
        *self = Self::from_seed(seed);
    }

    #[inline]
    const fn next_bits(&mut self, bits: u32) -> u64 {
        (self.next_raw() as u64) >> (64 - bits)
    }

    #[inline]
    const fn next_raw(&mut self) -> i64 {
        let lo = self.lo;
        let mut hi = self.hi;
        let out = lo.wrapping_add(hi).rotate_left(17).wrapping_add(lo);
        hi ^= lo;
        self.lo = lo.rotate_left(49) ^ hi ^ (hi << 21);
        self.hi = hi.rotate_left(28);
        out
    }
}

impl Random for Xoroshiro {
    #[inline]
    fn next_i64(&mut self) -> i64 {
        self.next_raw()
    }

    fn next_i32_bounded(&mut self, bound: i32) -> i32 {
        debug_assert!(bound > 0, "bound must be positive, got {bound}");
        let bound = bound as u32 as u64;
        let mut product = (self.next_i32() as u32 as u64) * bound;
        let mut low = product & 0xFFFF_FFFF;
        if low < bound {
            let threshold = (bound.wrapping_neg() & 0xFFFF_FFFF) % bound;
            while low < threshold {
                product = (self.next_i32() as u32 as u64) * bound;
                low = product & 0xFFFF_FFFF;
            }
        }
        (product >> 32) as i32
    }

    #[inline]
    fn next_f64(&mut self) -> f64 {
        self.next_bits(53) as f64 * DOUBLE_UNIT
    }

    #[inline]
    fn next_f32(&mut self) -> f32 {
        self.next_bits(24) as f32 * FLOAT_UNIT
    }

    fn next_positional(&mut self) -> RandomSplitter {
        let lo = self.next_i64();
        let hi = self.next_i64();
        XoroshiroSplitter { lo, hi }
    }
}

/// Positional factory for [`Xoroshiro`] sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XoroshiroSplitter {
    lo: i64,
    hi: i64,
}

impl PositionalRandom for XoroshiroSplitter {
    type Source = Xoroshiro;

    #[inline]
    fn at(&self, x: i32, y: i32, z: i32) -> Xoroshiro {
        Xoroshiro::from_state(position_seed(x, y, z) ^ self.lo, self.hi)
    }

    fn with_hash_of(&self, name: &str) -> Xoroshiro {
        let digest = md5::compute(name.as_bytes());
        let (first, second) = digest.0.split_at(8);
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        a.copy_from_slice(first);
        b.copy_from_slice(second);
        Xoroshiro::from_state(
            i64::from_be_bytes(a) ^ self.lo,
            i64::from_be_bytes(b) ^ self.hi,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Xoroshiro::from_seed(1234);
        let mut b = Xoroshiro::from_seed(1234);
        for _ in 0..64 {
            assert_eq!(a.next_i64(), b.next_i64());
        }
    }

    #[test]
    fn bounded_values_stay_in_range() {
        let mut random = Xoroshiro::from_seed(7);
        for bound in [1, 2, 3, 10, 17, 256, i32::MAX] {
            for _ in 0..200 {
                let v = random.next_i32_bounded(bound);
                assert!((0..bound).contains(&v), "{v} outside [0, {bound})");
            }
        }
    }

    #[test]
    fn unit_draws_are_half_open() {
        let mut random = Xoroshiro::from_seed(99);
        for _ in 0..1000 {
            let d = random.next_f64();
            let f = random.next_f32();
            assert!((0.0..1.0).contains(&d));
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn zero_state_is_replaced() {
        let mut random = Xoroshiro::from_state(0, 0);
        assert_ne!(random.next_i64(), 0);
    }

    #[test]
    fn positional_sources_are_order_independent() {
        let splitter = Xoroshiro::from_seed(42).next_positional();
        let first = splitter.at(10, 64, -3).next_i64();
        let _ = splitter.at(11, 64, -3).next_i64();
        assert_eq!(splitter.at(10, 64, -3).next_i64(), first);
        assert_ne!(splitter.at(10, 65, -3).next_i64(), first);
    }

    #[test]
    fn hashed_names_diverge() {
        let splitter = Xoroshiro::from_seed(42).next_positional();
        let mut a = splitter.with_hash_of("stratum:continents");
        let mut b = splitter.with_hash_of("stratum:erosion");
        assert_ne!(a.next_i64(), b.next_i64());
        assert_eq!(
            splitter.with_hash_of("stratum:ridges"),
            splitter.with_hash_of("stratum:ridges")
        );
    }
}
