//! Seeded random sources.
//!
//! World generation only ever uses the Xoroshiro128++ generator. Sequential
//! sources implement [`Random`]; positional factories implement
//! [`PositionalRandom`] and derive an independent sequential source for any
//! block position or name, so results never depend on evaluation order.

pub mod worldgen;
pub mod xoroshiro;

pub use worldgen::WorldgenRandom;
pub use xoroshiro::{Xoroshiro, XoroshiroSplitter};

/// The sequential source used throughout generation.
pub type RandomSource = Xoroshiro;
/// The positional factory used throughout generation.
pub type RandomSplitter = XoroshiroSplitter;

/// A sequential pseudo random number generator.
pub trait Random {
    fn next_i64(&mut self) -> i64;

    #[inline]
    fn next_i32(&mut self) -> i32 {
        self.next_i64() as i32
    }

    /// Uniform value in `[0, bound)`. `bound` must be positive.
    fn next_i32_bounded(&mut self, bound: i32) -> i32;

    /// Uniform value in `[min, max]`.
    #[inline]
    fn next_i32_between_inclusive(&mut self, min: i32, max: i32) -> i32 {
        self.next_i32_bounded(max - min + 1) + min
    }

    fn next_f64(&mut self) -> f64;

    fn next_f32(&mut self) -> f32;

    #[inline]
    fn next_bool(&mut self) -> bool {
        self.next_i64() & 1 != 0
    }

    /// Advances the state by `count` draws.
    fn consume_count(&mut self, count: u32) {
        for _ in 0..count {
            self.next_i64();
        }
    }

    /// Forks a positional factory off this source, consuming two draws.
    fn next_positional(&mut self) -> RandomSplitter;
}

/// Derives sequential sources from positions or names.
pub trait PositionalRandom {
    type Source: Random;

    fn at(&self, x: i32, y: i32, z: i32) -> Self::Source;

    fn with_hash_of(&self, name: &str) -> Self::Source;
}

/// Position hash shared by every positional factory.
#[inline]
#[must_use]
pub const fn position_seed(x: i32, y: i32, z: i32) -> i64 {
    let mixed = (x.wrapping_mul(3_129_871) as i64) ^ (z as i64).wrapping_mul(116_129_781) ^ (y as i64);
    let mixed = mixed
        .wrapping_mul(mixed)
        .wrapping_mul(42_317_861)
        .wrapping_add(mixed.wrapping_mul(11));
    mixed >> 16
}
