//! Noise terrain generator.
//!
//! Terrain comes from the seeded noise router: the final density decides
//! solid against open space, the aquifer decides what fills open space, and
//! the later passes (surface rules, carvers, decorations) rework the result
//! through a [`GenerationRegion`].
//!
//! # Cell interpolation
//!
//! Density is evaluated exactly only at the corners of 4x8x4 noise cells and
//! interpolated in between. The sweep is:
//!
//! - **cell x** outer, sampling the next x plane of corners,
//! - then **cell z**,
//! - then **cell y** from the top down,
//! - then block **y** from the top down, **x** and **z** inside the cell.
//!
//! [`NoiseGenerator::base_column`] replays the same sweep for a single
//! column, so a probe and a real fill agree block for block.

use std::sync::Arc;

use anyhow::Context;
use stratum_registry::Registry;
use stratum_utils::BlockStateId;
use stratum_utils::math::floor_div;
use stratum_utils::noise_router::overworld::overworld;
use stratum_utils::noise_router::{FluidPicker, NoiseRouter, NoiseShape, SurfaceHeightEstimator};

use crate::chunk::chunk_access::{ChunkAccess, LevelHeightAccessor};
use crate::chunk::chunk_generator::{ChunkGenerator, NoiseColumn};
use crate::chunk::generation_region::GenerationRegion;
use crate::chunk::heightmap::HeightmapType;
use crate::chunk::natural_spawner;
use crate::chunk::world_gen::biome_source::BiomeSource;
use crate::chunk::world_gen::carvers::Carvers;
use crate::chunk::world_gen::chunk_noise_generator::{ChunkNoiseGenerator, TerrainBlocks};
use crate::chunk::world_gen::features::Features;
use crate::chunk::world_gen::surface_rules::SurfaceSystem;
use crate::config::WorldConfig;

pub struct NoiseGenerator {
    seed: u64,
    router: Arc<NoiseRouter>,
    shape: NoiseShape,
    sea_level: i32,
    aquifers: bool,
    picker: FluidPicker,
    blocks: TerrainBlocks,
    biome_source: BiomeSource,
    surface: SurfaceSystem,
    carvers: Carvers,
    features: Features,
    registry: Arc<Registry>,
}

impl NoiseGenerator {
    /// Builds the router for `config.seed`.
    ///
    /// # Errors
    /// Fails when the configured default block or fluid is not registered.
    pub fn new(config: &WorldConfig, registry: Arc<Registry>) -> anyhow::Result<Self> {
        let settings = &config.noise;
        let lookup = |name: &str| {
            registry
                .blocks
                .id_of(name)
                .with_context(|| format!("Unknown block '{name}' in noise settings"))
        };
        let blocks = TerrainBlocks {
            default_block: lookup(&settings.default_block)?,
            default_fluid: lookup(&settings.default_fluid)?,
            lava: lookup("lava")?,
            air: BlockStateId::AIR,
        };

        let shape = settings.shape;
        let router = Arc::new(overworld(config.seed, &shape));
        log::debug!(
            "Built noise router for seed {} (y {}..{}, sea level {})",
            config.seed,
            shape.min_y,
            shape.max_y(),
            settings.sea_level
        );

        Ok(Self {
            seed: config.seed,
            picker: FluidPicker::new(settings.sea_level, blocks.default_fluid, settings.lava_level, blocks.lava),
            biome_source: BiomeSource::new(router.climate_sampler()),
            surface: SurfaceSystem::new(&router, &shape, blocks.default_block),
            carvers: Carvers::overworld(config.seed, settings.lava_level),
            features: Features::new(config.seed),
            sea_level: settings.sea_level,
            aquifers: settings.aquifers,
            router,
            shape,
            blocks,
            registry,
        })
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn router(&self) -> &Arc<NoiseRouter> {
        &self.router
    }

    #[must_use]
    pub const fn biome_source(&self) -> &BiomeSource {
        &self.biome_source
    }

    fn chunk_noise(&self, chunk_x: i32, chunk_z: i32) -> ChunkNoiseGenerator {
        ChunkNoiseGenerator::new(
            self.router.clone(),
            self.shape,
            chunk_x,
            chunk_z,
            self.picker,
            self.blocks,
            self.aquifers,
        )
    }

    fn height_estimator(&self) -> SurfaceHeightEstimator {
        SurfaceHeightEstimator::new(
            self.router.initial_density_without_jaggedness.clone(),
            self.shape.min_y,
            self.shape.max_y(),
            self.shape.cell_height,
        )
    }
}

impl ChunkGenerator for NoiseGenerator {
    fn create_biomes(&self, chunk: &ChunkAccess) {
        self.biome_source.fill_biomes(chunk, &self.registry.biomes);
    }

    fn fill_from_noise(&self, chunk: &ChunkAccess) {
        let pos = chunk.pos();
        let base_x = pos.min_block_x();
        let base_z = pos.min_block_z();
        let cell_width = self.shape.cell_width;
        let cell_height = self.shape.cell_height;
        let delta_xz_step = 1.0 / f64::from(cell_width);
        let delta_y_step = 1.0 / f64::from(cell_height);

        let _pin = chunk.pin_sections();
        let mut noise = self.chunk_noise(pos.x, pos.z);
        let cells_xz = noise.cells_xz();
        let cells_y = noise.cells_y();
        let min_cell_y = noise.min_cell_y();

        noise.sample_start_density();
        for cell_x in 0..cells_xz {
            noise.sample_end_density(cell_x as i32);

            for cell_z in 0..cells_xz {
                for cell_y in (0..cells_y).rev() {
                    noise.on_sampled_cell_corners(cell_y, cell_z);
                    let start_y = (min_cell_y + cell_y as i32) * cell_height;

                    for local_y in (0..cell_height).rev() {
                        let y = start_y + local_y;
                        noise.interpolate_y(f64::from(local_y) * delta_y_step);

                        for local_x in 0..cell_width {
                            noise.interpolate_x(f64::from(local_x) * delta_xz_step);
                            let lx = cell_x as i32 * cell_width + local_x;

                            for local_z in 0..cell_width {
                                noise.interpolate_z(f64::from(local_z) * delta_xz_step);
                                let lz = cell_z as i32 * cell_width + local_z;

                                let state = noise.sample_block_state(base_x + lx, y, base_z + lz);
                                if state == self.blocks.air {
                                    continue;
                                }
                                chunk.set_relative_block(lx as usize, y, lz as usize, state);
                            }
                        }
                    }
                }
            }

            noise.swap_buffers();
        }
    }

    fn build_surface(&self, region: &GenerationRegion) {
        let mut estimator = self.height_estimator();
        self.surface
            .build_surface(region, &mut estimator, &self.registry.blocks, &self.registry.biomes);
    }

    fn apply_carvers(&self, region: &GenerationRegion) {
        self.carvers.apply(region, &self.registry.blocks);
    }

    fn apply_biome_decorations(&self, region: &GenerationRegion) {
        self.features.apply(region, &self.registry);
    }

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

    fn base_column(&self, x: i32, z: i32, view: &dyn LevelHeightAccessor) -> NoiseColumn {
        let mut column = NoiseColumn {
            min_y: view.min_y(),
            blocks: vec![BlockStateId::AIR; view.height().max(0) as usize],
        };

        let cell_width = self.shape.cell_width;
        let cell_height = self.shape.cell_height;
        let delta_xz_step = 1.0 / f64::from(cell_width);
        let delta_y_step = 1.0 / f64::from(cell_height);
        let (lx, lz) = (x & 15, z & 15);
        let cell_x = lx / cell_width;
        let cell_z = (lz / cell_width) as usize;
        let local_x = lx % cell_width;
        let local_z = lz % cell_width;

        let mut noise = self.chunk_noise(floor_div(x, 16), floor_div(z, 16));
        let cells_y = noise.cells_y();
        let min_cell_y = noise.min_cell_y();
        noise.sample_column_density(cell_x, cell_z);

        for cell_y in (0..cells_y).rev() {
            noise.on_sampled_cell_corners(cell_y, cell_z);
            let start_y = (min_cell_y + cell_y as i32) * cell_height;
            for local_y in (0..cell_height).rev() {
                let y = start_y + local_y;
                noise.interpolate_y(f64::from(local_y) * delta_y_step);
                noise.interpolate_x(f64::from(local_x) * delta_xz_step);
                noise.interpolate_z(f64::from(local_z) * delta_xz_step);
                let state = noise.sample_block_state(x, y, z);
                if let Ok(index) = usize::try_from(y - column.min_y)
                    && let Some(slot) = column.blocks.get_mut(index)
                {
                    *slot = state;
                }
            }
        }
        column
    }

    fn sea_level(&self) -> i32 {
        self.sea_level
    }
}
