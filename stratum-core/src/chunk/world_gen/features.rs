//! Biome decorations: frozen water, trees and ground plants.
//!
//! Every pass draws from a stream seeded by the chunk's decoration seed and
//! its step index, so decorating chunks in any order gives the same result.
//! Tree crowns may spill into the neighbouring chunks the region exposes for
//! writing.

use stratum_registry::biomes::TreeStyle;
use stratum_registry::{Registry, blocks};
use stratum_utils::BlockPos;
use stratum_utils::random::{Random, WorldgenRandom};

use crate::chunk::generation_region::{GenerationRegion, block_flags};
use crate::chunk::heightmap::HeightmapType;

/// Decoration step indices, mixed into the per-step seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DecorationStep {
    Trees = 1,
    Vegetation = 2,
}

#[derive(Debug, Clone, Copy)]
pub struct Features {
    seed: u64,
}

impl Features {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn apply(&self, region: &GenerationRegion, registry: &Registry) {
        let center = region.center();
        let min_x = center.min_block_x();
        let min_z = center.min_block_z();

        let mut random = WorldgenRandom::new(self.seed);
        let decoration_seed = random.set_decoration_seed(self.seed, min_x, min_z);

        let surface = region.get_height(HeightmapType::WorldSurfaceWg, min_x + 8, min_z + 8);
        let biome = registry
            .biomes
            .get(region.get_biome(BlockPos::new(min_x + 8, surface, min_z + 8)));

        freeze_water(region, registry, min_x, min_z);

        if let Some(style) = biome.trees {
            random.set_feature_seed(decoration_seed, 0, DecorationStep::Trees as u32);
            for _ in 0..style.per_chunk {
                let x = min_x + random.next_i32_bounded(16);
                let z = min_z + random.next_i32_bounded(16);
                place_tree(region, &style, &mut random, x, z);
            }
        }

        random.set_feature_seed(decoration_seed, 0, DecorationStep::Vegetation as u32);
        for _ in 0..biome.vegetation {
            let x = min_x + random.next_i32_bounded(16);
            let z = min_z + random.next_i32_bounded(16);
            let y = region.get_height(HeightmapType::WorldSurfaceWg, x, z);
            let pos = BlockPos::new(x, y, z);
            if region.get_block_state(pos.below()) == blocks::GRASS_BLOCK && region.get_block_state(pos).is_air() {
                region.set_block(pos, blocks::SHORT_GRASS, block_flags::UPDATE_CLIENTS, 0);
            }
        }
    }
}

fn freeze_water(region: &GenerationRegion, registry: &Registry, min_x: i32, min_z: i32) {
    for x in min_x..min_x + 16 {
        for z in min_z..min_z + 16 {
            let top = BlockPos::new(x, region.get_height(HeightmapType::WorldSurfaceWg, x, z) - 1, z);
            if region.get_block_state(top) != blocks::WATER {
                continue;
            }
            if registry.biomes.get(region.get_biome(top)).is_frozen() {
                region.set_block(top, blocks::ICE, block_flags::UPDATE_CLIENTS, 0);
            }
        }
    }
}

fn place_tree(region: &GenerationRegion, style: &TreeStyle, random: &mut WorldgenRandom, x: i32, z: i32) {
    let base = BlockPos::new(x, region.get_height(HeightmapType::WorldSurfaceWg, x, z), z);
    let ground = region.get_block_state(base.below());
    let cactus = style.leaves.is_air();
    let fits_ground = if cactus {
        ground == blocks::SAND
    } else {
        ground == blocks::GRASS_BLOCK || ground == blocks::DIRT
    };
    if !fits_ground {
        return;
    }

    let height = if cactus {
        1 + random.next_i32_bounded(3)
    } else {
        4 + random.next_i32_bounded(3)
    };
    if base.y + height + 2 >= region.max_y() {
        return;
    }
    if (0..height).any(|dy| !region.get_block_state(base.offset(0, dy, 0)).is_air()) {
        return;
    }

    if !cactus {
        region.set_block(base.below(), blocks::DIRT, block_flags::UPDATE_CLIENTS, 0);
    }
    for dy in 0..height {
        region.set_block(base.offset(0, dy, 0), style.log, block_flags::UPDATE_CLIENTS, 0);
    }
    if cactus {
        return;
    }

    let top = base.y + height;
    for y in top - 3..=top {
        let radius: i32 = if y >= top - 1 { 1 } else { 2 };
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let corner = dx.abs() == radius && dz.abs() == radius;
                if corner && (y == top || random.next_i32_bounded(2) == 0) {
                    continue;
                }
                let pos = BlockPos::new(x + dx, y, z + dz);
                if region.get_block_state(pos).is_air() {
                    region.set_block(pos, style.leaves, block_flags::UPDATE_CLIENTS, 0);
                }
            }
        }
    }
}
