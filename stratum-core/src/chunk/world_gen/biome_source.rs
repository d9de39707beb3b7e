//! Climate driven biome placement.

use stratum_registry::BiomeRegistry;
use stratum_utils::BiomeId;
use stratum_utils::climate::ClimateSampler;

use crate::chunk::chunk_access::{ChunkAccess, LevelHeightAccessor};

/// Picks a biome per quart cell from the router's climate functions.
#[derive(Debug, Clone)]
pub struct BiomeSource {
    climate: ClimateSampler,
}

impl BiomeSource {
    #[must_use]
    pub const fn new(climate: ClimateSampler) -> Self {
        Self { climate }
    }

    #[must_use]
    pub fn biome_at(&self, biomes: &BiomeRegistry, quart_x: i32, quart_y: i32, quart_z: i32) -> BiomeId {
        biomes.lookup(&self.climate.sample(quart_x, quart_y, quart_z))
    }

    /// Writes every quart cell of `chunk`.
    pub fn fill_biomes(&self, chunk: &ChunkAccess, biomes: &BiomeRegistry) {
        let pos = chunk.pos();
        let start_qx = pos.min_block_x() >> 2;
        let start_qz = pos.min_block_z() >> 2;
        let min_qy = chunk.min_y() >> 2;
        let quarts_y = chunk.height() >> 2;

        for qy in min_qy..min_qy + quarts_y {
            for qz in start_qz..start_qz + 4 {
                for qx in start_qx..start_qx + 4 {
                    chunk.set_noise_biome(qx, qy, qz, self.biome_at(biomes, qx, qy, qz));
                }
            }
        }
    }

    #[must_use]
    pub const fn climate(&self) -> &ClimateSampler {
        &self.climate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_utils::ChunkPos;
    use stratum_utils::noise_router::NoiseShape;
    use stratum_utils::noise_router::overworld::overworld;

    #[test]
    fn chunk_biomes_match_point_lookups() {
        let router = overworld(11, &NoiseShape::OVERWORLD);
        let source = BiomeSource::new(router.climate_sampler());
        let biomes = BiomeRegistry::overworld();
        let chunk = ChunkAccess::new(ChunkPos::new(2, -3), -64, 384);
        source.fill_biomes(&chunk, &biomes);

        for (qx, qy, qz) in [(8, 0, -12), (11, 10, -9), (9, -16, -10)] {
            assert_eq!(chunk.get_noise_biome(qx, qy, qz), source.biome_at(&biomes, qx, qy, qz));
        }
    }
}
