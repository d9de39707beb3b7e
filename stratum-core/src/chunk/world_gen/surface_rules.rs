//! Surface rules: replace the top of the stone fill with biome materials.
//!
//! Rules form a small tree of conditions evaluated per block while a column
//! is walked from the top down. The first rule in a sequence that yields a
//! block wins; a column position no rule claims keeps its stone.

use std::sync::Arc;

use stratum_registry::{BiomeRegistry, BlockRegistry, SurfaceCategory, blocks};
use stratum_utils::math::clamped_map;
use stratum_utils::noise::NormalNoise;
use stratum_utils::noise_router::overworld::{SURFACE, create_noise};
use stratum_utils::noise_router::{NoiseRouter, NoiseShape, SurfaceHeightEstimator};
use stratum_utils::random::{PositionalRandom, Random, RandomSplitter};
use stratum_utils::{BlockPos, BlockStateId};

use crate::chunk::chunk_access::{ChunkAccess, LevelHeightAccessor};
use crate::chunk::generation_region::GenerationRegion;
use crate::chunk::heightmap::HeightmapType;

/// Everything a condition can look at for the block being decided.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceContext {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Solid blocks from the open space above down to this one, inclusive.
    pub stone_depth_above: i32,
    /// Solid blocks from this one down to the next open space, inclusive.
    pub stone_depth_below: i32,
    /// One above the top of the fluid directly above, `i32::MIN` when dry.
    pub water_height: i32,
    pub surface_depth: i32,
    /// Surface noise at the column, in `[-1, 1]` roughly.
    pub surface_noise: f64,
    pub min_surface_level: i32,
    pub category: SurfaceCategory,
}

#[derive(Debug, Clone)]
pub enum SurfaceCondition {
    /// Always true at or below `true_at`, never at or above `false_at`,
    /// randomly thinning out in between.
    VerticalGradient {
        random: RandomSplitter,
        true_at: i32,
        false_at: i32,
    },
    StoneDepth {
        offset: i32,
        add_surface_depth: bool,
        /// Measure against the open space above (floor) or below (ceiling).
        floor: bool,
    },
    /// True unless the block is more than `offset` below a fluid surface.
    Water { offset: i32, add_stone_depth: bool },
    Category(&'static [SurfaceCategory]),
    NoiseAbove(f64),
    AbovePreliminarySurface,
    Not(Box<SurfaceCondition>),
}

impl SurfaceCondition {
    #[must_use]
    pub fn test(&self, ctx: &SurfaceContext) -> bool {
        match self {
            Self::VerticalGradient {
                random,
                true_at,
                false_at,
            } => {
                if ctx.y <= *true_at {
                    return true;
                }
                if ctx.y >= *false_at {
                    return false;
                }
                let chance = clamped_map(f64::from(ctx.y), f64::from(*true_at), f64::from(*false_at), 1.0, 0.0);
                f64::from(random.at(ctx.x, ctx.y, ctx.z).next_f32()) < chance
            }
            Self::StoneDepth {
                offset,
                add_surface_depth,
                floor,
            } => {
                let depth = if *floor {
                    ctx.stone_depth_above
                } else {
                    ctx.stone_depth_below
                };
                let extra = if *add_surface_depth { ctx.surface_depth } else { 0 };
                depth <= 1 + offset + extra
            }
            Self::Water {
                offset,
                add_stone_depth,
            } => {
                if ctx.water_height == i32::MIN {
                    return true;
                }
                let extra = if *add_stone_depth { ctx.stone_depth_above } else { 0 };
                ctx.y + offset + extra >= ctx.water_height
            }
            Self::Category(categories) => categories.contains(&ctx.category),
            Self::NoiseAbove(threshold) => ctx.surface_noise > *threshold,
            Self::AbovePreliminarySurface => ctx.y >= ctx.min_surface_level,
            Self::Not(inner) => !inner.test(ctx),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SurfaceRule {
    Block(BlockStateId),
    Sequence(Vec<SurfaceRule>),
    Condition(SurfaceCondition, Box<SurfaceRule>),
    /// The biome's top block above water.
    BiomeTop,
    /// The biome's filler below the top block.
    BiomeUnder,
    /// The biome's floor under water.
    BiomeFloor,
}

impl SurfaceRule {
    fn when(condition: SurfaceCondition, rule: Self) -> Self {
        Self::Condition(condition, Box::new(rule))
    }

    #[must_use]
    pub fn apply(&self, ctx: &SurfaceContext) -> Option<BlockStateId> {
        match self {
            Self::Block(state) => Some(*state),
            Self::Sequence(rules) => rules.iter().find_map(|rule| rule.apply(ctx)),
            Self::Condition(condition, rule) => {
                if condition.test(ctx) {
                    rule.apply(ctx)
                } else {
                    None
                }
            }
            Self::BiomeTop => Some(category_blocks(ctx.category).top),
            Self::BiomeUnder => Some(category_blocks(ctx.category).under),
            Self::BiomeFloor => Some(category_blocks(ctx.category).floor),
        }
    }
}

struct CategoryBlocks {
    top: BlockStateId,
    under: BlockStateId,
    floor: BlockStateId,
}

const fn category_blocks(category: SurfaceCategory) -> CategoryBlocks {
    match category {
        SurfaceCategory::Grassy => CategoryBlocks {
            top: blocks::GRASS_BLOCK,
            under: blocks::DIRT,
            floor: blocks::DIRT,
        },
        SurfaceCategory::Sandy => CategoryBlocks {
            top: blocks::SAND,
            under: blocks::SANDSTONE,
            floor: blocks::SAND,
        },
        SurfaceCategory::Snowy => CategoryBlocks {
            top: blocks::SNOW_BLOCK,
            under: blocks::DIRT,
            floor: blocks::DIRT,
        },
        SurfaceCategory::Stony => CategoryBlocks {
            top: blocks::STONE,
            under: blocks::STONE,
            floor: blocks::GRAVEL,
        },
        SurfaceCategory::Seabed => CategoryBlocks {
            top: blocks::SAND,
            under: blocks::GRAVEL,
            floor: blocks::GRAVEL,
        },
    }
}

/// The overworld rule tree.
#[must_use]
pub fn overworld_rules(random: &RandomSplitter, min_y: i32) -> SurfaceRule {
    let gradient = |name: &str, true_at: i32, false_at: i32| SurfaceCondition::VerticalGradient {
        random: random.with_hash_of(name).next_positional(),
        true_at,
        false_at,
    };
    let floor = |offset, add_surface_depth| SurfaceCondition::StoneDepth {
        offset,
        add_surface_depth,
        floor: true,
    };

    let patches = SurfaceRule::when(
        SurfaceCondition::Category(&[SurfaceCategory::Stony, SurfaceCategory::Seabed]),
        SurfaceRule::when(SurfaceCondition::NoiseAbove(0.4), SurfaceRule::Block(blocks::GRAVEL)),
    );
    let clay = SurfaceRule::when(
        SurfaceCondition::Category(&[SurfaceCategory::Seabed]),
        SurfaceRule::when(SurfaceCondition::NoiseAbove(-0.2), SurfaceRule::Block(blocks::CLAY)),
    );

    let top = SurfaceRule::when(
        floor(0, false),
        SurfaceRule::Sequence(vec![
            patches,
            SurfaceRule::when(
                SurfaceCondition::Water {
                    offset: -1,
                    add_stone_depth: false,
                },
                SurfaceRule::BiomeTop,
            ),
            SurfaceRule::BiomeFloor,
        ]),
    );
    let under = SurfaceRule::when(
        floor(0, true),
        SurfaceRule::Sequence(vec![
            SurfaceRule::when(
                SurfaceCondition::Water {
                    offset: -6,
                    add_stone_depth: true,
                },
                SurfaceRule::BiomeUnder,
            ),
            clay,
            SurfaceRule::BiomeFloor,
        ]),
    );

    SurfaceRule::Sequence(vec![
        SurfaceRule::when(gradient("stratum:bedrock_floor", min_y, min_y + 5), SurfaceRule::Block(blocks::BEDROCK)),
        SurfaceRule::when(
            SurfaceCondition::AbovePreliminarySurface,
            SurfaceRule::Sequence(vec![top, under]),
        ),
        SurfaceRule::when(gradient("stratum:deepslate", 0, 8), SurfaceRule::Block(blocks::DEEPSLATE)),
    ])
}

/// Applies the rule tree to freshly filled chunks.
pub struct SurfaceSystem {
    rule: SurfaceRule,
    noise: Arc<NormalNoise>,
    random: RandomSplitter,
    default_block: BlockStateId,
    min_y: i32,
}

impl SurfaceSystem {
    #[must_use]
    pub fn new(router: &NoiseRouter, shape: &NoiseShape, default_block: BlockStateId) -> Self {
        Self {
            rule: overworld_rules(&router.random, shape.min_y),
            noise: create_noise(&router.random, SURFACE),
            random: router.random.with_hash_of("stratum:surface_depth").next_positional(),
            default_block,
            min_y: shape.min_y,
        }
    }

    /// Base surface thickness at a column, usually 2 to 6.
    #[must_use]
    pub fn surface_depth(&self, x: i32, z: i32) -> i32 {
        let noise = self.noise.sample(f64::from(x), 0.0, f64::from(z));
        let jitter = self.random.at(x, 0, z).next_f64() * 0.25;
        (noise * 2.75 + 3.0 + jitter) as i32
    }

    /// Rewrites the region's center chunk.
    pub fn build_surface(
        &self,
        region: &GenerationRegion,
        estimator: &mut SurfaceHeightEstimator,
        block_registry: &BlockRegistry,
        biome_registry: &BiomeRegistry,
    ) {
        let chunk = region.center_chunk();
        let pos = chunk.pos();
        for lx in 0..16 {
            for lz in 0..16 {
                let x = pos.min_block_x() + lx;
                let z = pos.min_block_z() + lz;
                self.build_column(chunk, estimator, block_registry, biome_registry, x, z);
            }
        }
    }

    fn build_column(
        &self,
        chunk: &ChunkAccess,
        estimator: &mut SurfaceHeightEstimator,
        block_registry: &BlockRegistry,
        biome_registry: &BiomeRegistry,
        x: i32,
        z: i32,
    ) {
        let (lx, lz) = (x & 15, z & 15);
        let surface_depth = self.surface_depth(x, z);
        let mut ctx = SurfaceContext {
            x,
            y: 0,
            z,
            stone_depth_above: 0,
            stone_depth_below: 0,
            water_height: i32::MIN,
            surface_depth,
            surface_noise: self.noise.sample(f64::from(x), 0.0, f64::from(z)),
            min_surface_level: estimator.estimate(x, z) + surface_depth - 8,
            category: SurfaceCategory::Stony,
        };

        let start = chunk.get_height(HeightmapType::WorldSurfaceWg, lx, lz);
        let min_y = chunk.min_y().max(self.min_y);
        let mut next_ceiling = i32::MAX;

        for y in (min_y..start).rev() {
            let state = chunk.get_relative_block(lx, y, lz);
            if state.is_air() {
                ctx.stone_depth_above = 0;
                ctx.water_height = i32::MIN;
                continue;
            }
            if block_registry.is_fluid(state) {
                if ctx.water_height == i32::MIN {
                    ctx.water_height = y + 1;
                }
                continue;
            }

            if next_ceiling >= y {
                next_ceiling = min_y;
                for below in (min_y..y).rev() {
                    let under = chunk.get_relative_block(lx, below, lz);
                    if under.is_air() || block_registry.is_fluid(under) {
                        next_ceiling = below + 1;
                        break;
                    }
                }
            }

            ctx.stone_depth_above += 1;
            ctx.stone_depth_below = y - next_ceiling + 1;
            if state != self.default_block {
                continue;
            }

            ctx.y = y;
            ctx.category = biome_registry
                .get(chunk.get_noise_biome(x >> 2, y >> 2, z >> 2))
                .surface;
            if let Some(replacement) = self.rule.apply(&ctx) {
                chunk.set_block_state(BlockPos::new(x, y, z), replacement, block_registry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_utils::noise_router::overworld::world_random;

    fn ctx(y: i32, category: SurfaceCategory) -> SurfaceContext {
        SurfaceContext {
            x: 3,
            y,
            z: 7,
            stone_depth_above: 1,
            stone_depth_below: 20,
            water_height: i32::MIN,
            surface_depth: 3,
            surface_noise: 0.0,
            min_surface_level: 60,
            category,
        }
    }

    #[test]
    fn bottom_layer_is_always_bedrock() {
        let rule = overworld_rules(&world_random(1), -64);
        assert_eq!(rule.apply(&ctx(-64, SurfaceCategory::Grassy)), Some(blocks::BEDROCK));
    }

    #[test]
    fn dry_top_gets_the_biome_top_block() {
        let rule = overworld_rules(&world_random(1), -64);
        assert_eq!(rule.apply(&ctx(70, SurfaceCategory::Grassy)), Some(blocks::GRASS_BLOCK));
        assert_eq!(rule.apply(&ctx(70, SurfaceCategory::Snowy)), Some(blocks::SNOW_BLOCK));

        let mut below = ctx(68, SurfaceCategory::Sandy);
        below.stone_depth_above = 3;
        assert_eq!(rule.apply(&below), Some(blocks::SANDSTONE));
    }

    #[test]
    fn submerged_top_gets_the_floor() {
        let rule = overworld_rules(&world_random(1), -64);
        let mut wet = ctx(62, SurfaceCategory::Grassy);
        wet.min_surface_level = 40;
        wet.water_height = 70;
        assert_eq!(rule.apply(&wet), Some(blocks::DIRT));
    }

    #[test]
    fn deep_stone_stays_or_turns_to_deepslate() {
        let rule = overworld_rules(&world_random(1), -64);
        let mut deep = ctx(30, SurfaceCategory::Grassy);
        deep.stone_depth_above = 40;
        assert_eq!(rule.apply(&deep), None);
        deep.y = -10;
        assert_eq!(rule.apply(&deep), Some(blocks::DEEPSLATE));
    }

    #[test]
    fn gradient_thins_out_between_bounds() {
        let random = world_random(9).with_hash_of("test").next_positional();
        let condition = SurfaceCondition::VerticalGradient {
            random,
            true_at: 0,
            false_at: 8,
        };
        let hits = (0..256)
            .filter(|i| {
                let mut c = ctx(4, SurfaceCategory::Stony);
                c.x = *i;
                condition.test(&c)
            })
            .count();
        assert!(hits > 32 && hits < 224, "{hits}");
    }
}
