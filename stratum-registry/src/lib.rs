//! Block palette and biome table.
//!
//! Both registries are plain values built once per world and handed to the
//! chunk system by reference. Nothing here is global.

pub mod biomes;
pub mod blocks;

pub use biomes::{Biome, BiomeRegistry, MobSpawn, SurfaceCategory};
pub use blocks::{BlockProperties, BlockRegistry};

/// Everything the generator needs to look up by id.
#[derive(Debug, Clone)]
pub struct Registry {
    pub blocks: BlockRegistry,
    pub biomes: BiomeRegistry,
}

impl Registry {
    /// The built-in overworld palette and biome table.
    #[must_use]
    pub fn overworld() -> Self {
        let blocks = BlockRegistry::overworld();
        let biomes = BiomeRegistry::overworld();
        log::debug!(
            "Built registry with {} block states and {} biomes",
            blocks.len(),
            biomes.len()
        );
        Self { blocks, biomes }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::overworld()
    }
}
