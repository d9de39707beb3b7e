use anyhow::ensure;

use crate::chunk::chunk_access::ChunkStatus;
use crate::chunk::chunk_generator::ChunkGenerator;
use crate::chunk::chunk_pyramid::StageContext;
use crate::chunk::heightmap::HeightmapType;

pub struct ChunkStatusTasks;

/// All these functions are blocking.
impl ChunkStatusTasks {
    /// The chunk map allocates the empty chunk before this runs.
    pub fn empty(context: &StageContext<'_>) -> anyhow::Result<()> {
        let chunk = context.chunk();
        ensure!(
            chunk.section_count() == context.world.section_count(),
            "Chunk {} has {} sections, expected {}",
            chunk.pos(),
            chunk.section_count(),
            context.world.section_count()
        );
        Ok(())
    }

    pub fn generate_structure_starts(_context: &StageContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    pub fn generate_structure_references(_context: &StageContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    pub fn generate_biomes(context: &StageContext<'_>) -> anyhow::Result<()> {
        let chunk = context.chunk();
        context.world.generator.create_biomes(chunk);
        chunk.mark_dirty();
        Ok(())
    }

    pub fn generate_noise(context: &StageContext<'_>) -> anyhow::Result<()> {
        let chunk = context.chunk();
        context.world.generator.fill_from_noise(chunk);
        chunk.prime_heightmaps(&HeightmapType::WORLDGEN, &context.world.registry.blocks);
        chunk.mark_dirty();
        Ok(())
    }

    pub fn generate_surface(context: &StageContext<'_>) -> anyhow::Result<()> {
        context.world.generator.build_surface(context.region);
        Ok(())
    }

    pub fn generate_carvers(context: &StageContext<'_>) -> anyhow::Result<()> {
        context.world.generator.apply_carvers(context.region);
        Ok(())
    }

    pub fn generate_features(context: &StageContext<'_>) -> anyhow::Result<()> {
        context.world.generator.apply_biome_decorations(context.region);
        Ok(())
    }

    pub fn initialize_light(_context: &StageContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// The chunk map only starts this stage once the light engine accepted
    /// the update.
    pub fn light(context: &StageContext<'_>) -> anyhow::Result<()> {
        context.world.light_engine.light_chunk(context.chunk())
    }

    pub fn generate_spawn(context: &StageContext<'_>) -> anyhow::Result<()> {
        context.world.generator.spawn_original_mobs(context.region);
        Ok(())
    }

    /// Switches the chunk to live heightmaps and turns pending fluid marks
    /// into scheduled fluid ticks.
    pub fn full(context: &StageContext<'_>) -> anyhow::Result<()> {
        let chunk = context.chunk();
        let blocks = &context.world.registry.blocks;
        chunk.prime_heightmaps(&HeightmapType::LIVE, blocks);

        let marks = chunk.take_post_processing();
        let mut fluids = 0usize;
        for pos in marks {
            if let Some(fluid) = context.region.get_fluid_state(pos) {
                context.region.schedule_fluid_tick(pos, fluid, 0);
                fluids += 1;
            }
        }
        if fluids > 0 {
            log::trace!("Chunk {} scheduled {fluids} fluid ticks at {}", chunk.pos(), ChunkStatus::Full);
        }
        Ok(())
    }
}
