//! Superflat generator: fixed layers, one biome, no caves.

use std::sync::Arc;

use stratum_registry::{Registry, biomes, blocks};
use stratum_utils::{BiomeId, BlockStateId};

use crate::chunk::chunk_access::{ChunkAccess, LevelHeightAccessor};
use crate::chunk::chunk_generator::{ChunkGenerator, NoiseColumn};
use crate::chunk::generation_region::GenerationRegion;
use crate::chunk::heightmap::HeightmapType;
use crate::chunk::natural_spawner;
use crate::config::WorldConfig;

pub struct FlatChunkGenerator {
    seed: u64,
    /// Bottom up, starting at the minimum build height.
    layers: Vec<BlockStateId>,
    biome: BiomeId,
    registry: Arc<Registry>,
}

impl FlatChunkGenerator {
    #[must_use]
    pub fn new(config: &WorldConfig, registry: &Arc<Registry>) -> Self {
        Self {
            seed: config.seed,
            layers: vec![blocks::BEDROCK, blocks::DIRT, blocks::DIRT, blocks::GRASS_BLOCK],
            biome: biomes::PLAINS,
            registry: registry.clone(),
        }
    }

    #[must_use]
    pub fn layers(&self) -> &[BlockStateId] {
        &self.layers
    }
}

impl ChunkGenerator for FlatChunkGenerator {
    fn create_biomes(&self, chunk: &ChunkAccess) {
        let pos = chunk.pos();
        let min_qy = chunk.min_y() >> 2;
        for qy in min_qy..min_qy + (chunk.height() >> 2) {
            for qx in 0..4 {
                for qz in 0..4 {
                    chunk.set_noise_biome((pos.x << 2) + qx, qy, (pos.z << 2) + qz, self.biome);
                }
            }
        }
    }

    fn fill_from_noise(&self, chunk: &ChunkAccess) {
        let _pin = chunk.pin_sections();
        for (offset, &state) in self.layers.iter().enumerate() {
            let y = chunk.min_y() + offset as i32;
            for x in 0..16 {
                for z in 0..16 {
                    chunk.set_relative_block(x, y, z, state);
                }
            }
        }
    }

    fn build_surface(&self, _region: &GenerationRegion) {}

    fn apply_carvers(&self, _region: &GenerationRegion) {}

    fn apply_biome_decorations(&self, _region: &GenerationRegion) {}

    fn spawn_original_mobs(&self, region: &GenerationRegion) {
        natural_spawner::spawn_original_mobs(region, &self.registry, self.seed);
    }

    fn base_height(&self, x: i32, z: i32, kind: HeightmapType, view: &dyn LevelHeightAccessor) -> i32 {
        let column = self.base_column(x, z, view);
        (view.min_y()..view.max_y())
            .rev()
            .find(|&y| kind.is_opaque(&self.registry.blocks, column.get(y)))
            .map_or(view.min_y(), |y| y + 1)
    }

    fn base_column(&self, _x: i32, _z: i32, view: &dyn LevelHeightAccessor) -> NoiseColumn {
        let height = view.height().max(0) as usize;
        let mut blocks = vec![BlockStateId::AIR; height];
        for (slot, &state) in blocks.iter_mut().zip(&self.layers) {
            *slot = state;
        }
        NoiseColumn {
            min_y: view.min_y(),
            blocks,
        }
    }

    fn sea_level(&self) -> i32 {
        -63
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_access::LevelHeight;
    use stratum_utils::ChunkPos;

    fn generator() -> FlatChunkGenerator {
        FlatChunkGenerator::new(&WorldConfig::default(), &Arc::new(Registry::overworld()))
    }

    #[test]
    fn fill_matches_column_probe() {
        let generator = generator();
        let chunk = ChunkAccess::new(ChunkPos::new(4, -2), -64, 384);
        generator.fill_from_noise(&chunk);
        let column = generator.base_column(70, -30, &chunk);
        for y in -64..-56 {
            assert_eq!(chunk.get_relative_block(6, y, 2), column.get(y));
        }
        assert_eq!(chunk.get_relative_block(0, -61, 0), blocks::GRASS_BLOCK);
    }

    #[test]
    fn height_is_one_above_grass() {
        let generator = generator();
        let view = LevelHeight { min_y: -64, height: 384 };
        assert_eq!(generator.base_height(0, 0, HeightmapType::WorldSurfaceWg, &view), -60);
    }
}
