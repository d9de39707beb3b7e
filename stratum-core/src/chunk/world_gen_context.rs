use std::sync::Arc;

use stratum_registry::Registry;

use crate::chunk::chunk_generator::ChunkGeneratorType;
use crate::chunk::light_engine::LightEngine;
use crate::chunk::world_gen::world_gen_type::flat_generator::FlatChunkGenerator;
use crate::chunk::world_gen::world_gen_type::noise_generator::NoiseGenerator;
use crate::config::WorldConfig;

/// Shared, read-only state every stage function needs.
pub struct WorldGenContext {
    pub generator: Arc<ChunkGeneratorType>,
    pub registry: Arc<Registry>,
    pub config: Arc<WorldConfig>,
    pub light_engine: Arc<dyn LightEngine>,
}

impl WorldGenContext {
    /// Builds the generator selected by `config`.
    ///
    /// # Errors
    /// Fails if the configured default blocks are not in the palette.
    pub fn new(
        config: Arc<WorldConfig>,
        registry: Arc<Registry>,
        light_engine: Arc<dyn LightEngine>,
    ) -> anyhow::Result<Self> {
        let generator = if config.flat {
            ChunkGeneratorType::Flat(FlatChunkGenerator::new(&config, &registry))
        } else {
            ChunkGeneratorType::Noise(NoiseGenerator::new(&config, registry.clone())?)
        };
        log::info!(
            "World generator ready: {} (seed {})",
            if config.flat { "flat" } else { "noise" },
            config.seed
        );
        Ok(Self {
            generator: Arc::new(generator),
            registry,
            config,
            light_engine,
        })
    }

    #[inline]
    #[must_use]
    pub fn min_y(&self) -> i32 {
        self.config.noise.shape.min_y
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> i32 {
        self.config.noise.shape.height
    }

    #[inline]
    #[must_use]
    pub fn section_count(&self) -> usize {
        (self.height() / 16) as usize
    }

    #[inline]
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.config.seed
    }
}
