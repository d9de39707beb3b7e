//! Shared primitives for the Stratum world generator.
//!
//! Everything in here is deterministic and free of world state: positions,
//! ids, seeded random sources, noise, the density function graph and the
//! climate parameter space used for biome lookup.

#![allow(clippy::similar_names, clippy::too_many_lines, clippy::too_many_arguments)]

pub mod climate;
pub mod density;
pub mod math;
pub mod noise;
pub mod noise_router;
pub mod random;

mod pos;

pub use pos::{BlockPos, ChunkPos, SectionPos};

use serde::{Deserialize, Serialize};

/// Identifier of a block state in the block registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockStateId(pub u16);

impl BlockStateId {
    /// The air state. Registries always place air at index zero.
    pub const AIR: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// Identifier of a biome in the biome registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BiomeId(pub u8);
