use enum_dispatch::enum_dispatch;
use stratum_utils::{BlockPos, BlockStateId};

use crate::chunk::chunk_access::{ChunkAccess, LevelHeightAccessor};
use crate::chunk::generation_region::GenerationRegion;
use crate::chunk::heightmap::HeightmapType;
use crate::chunk::world_gen::world_gen_type::flat_generator::FlatChunkGenerator;
use crate::chunk::world_gen::world_gen_type::noise_generator::NoiseGenerator;

/// Block states of one world column, bottom up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseColumn {
    pub min_y: i32,
    pub blocks: Vec<BlockStateId>,
}

impl NoiseColumn {
    /// The state at `y`, air outside the column.
    #[must_use]
    pub fn get(&self, y: i32) -> BlockStateId {
        usize::try_from(y - self.min_y)
            .ok()
            .and_then(|index| self.blocks.get(index).copied())
            .unwrap_or(BlockStateId::AIR)
    }
}

/// Per-stage generation work. Chunk-only passes run on the worker pool;
/// region passes run on the simulation thread.
#[enum_dispatch]
pub trait ChunkGenerator {
    fn create_biomes(&self, chunk: &ChunkAccess);

    fn fill_from_noise(&self, chunk: &ChunkAccess);

    fn build_surface(&self, region: &GenerationRegion);

    fn apply_carvers(&self, region: &GenerationRegion);

    fn apply_biome_decorations(&self, region: &GenerationRegion);

    fn spawn_original_mobs(&self, region: &GenerationRegion);

    /// One above the first block from the top matching `kind`, or the view's
    /// bottom when nothing matches.
    fn base_height(&self, x: i32, z: i32, kind: HeightmapType, view: &dyn LevelHeightAccessor) -> i32;

    fn base_column(&self, x: i32, z: i32, view: &dyn LevelHeightAccessor) -> NoiseColumn;

    fn sea_level(&self) -> i32;

    /// Spawn point search: the surface at `x, z`.
    fn spawn_height(&self, x: i32, z: i32, view: &dyn LevelHeightAccessor) -> BlockPos {
        BlockPos::new(x, self.base_height(x, z, HeightmapType::WorldSurfaceWg, view), z)
    }
}

#[enum_dispatch(ChunkGenerator)]
pub enum ChunkGeneratorType {
    Noise(NoiseGenerator),
    Flat(FlatChunkGenerator),
}
