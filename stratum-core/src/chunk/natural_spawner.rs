//! Mob spawning: the one-off pass at generation time and the per-tick pass.

use std::sync::Arc;

use stratum_registry::{MobSpawn, Registry, blocks};
use stratum_utils::BlockPos;
use stratum_utils::random::{Random, WorldgenRandom};

use crate::chunk::chunk_access::{ChunkAccess, LevelHeightAccessor};
use crate::chunk::entity::{Entity, MobCategory};
use crate::chunk::generation_region::GenerationRegion;
use crate::chunk::heightmap::HeightmapType;
use crate::config::SpawnSettings;

/// Caps are given per this many chunks (a 17x17 square).
pub const MAGIC_NUMBER: usize = 17 * 17;

/// Chance that initial spawning places one more group.
const CREATURE_PROBABILITY: f32 = 0.1;

/// Picks an entry with probability proportional to its weight.
fn pick_weighted<'a>(entries: &'a [MobSpawn], random: &mut impl Random) -> Option<&'a MobSpawn> {
    let total: u32 = entries.iter().map(|entry| entry.weight).sum();
    if total == 0 {
        return None;
    }
    let mut roll = random.next_i32_bounded(total as i32) as u32;
    entries.iter().find(|entry| {
        if roll < entry.weight {
            true
        } else {
            roll -= entry.weight;
            false
        }
    })
}

fn group_size(entry: &MobSpawn, random: &mut impl Random) -> u32 {
    let spread = entry.max_count.saturating_sub(entry.min_count) + 1;
    entry.min_count + random.next_i32_bounded(spread as i32) as u32
}

/// Places the persistent passive mobs a chunk starts with.
pub fn spawn_original_mobs(region: &GenerationRegion, registry: &Registry, seed: u64) {
    let center = region.center();
    let min_x = center.min_block_x();
    let min_z = center.min_block_z();
    let surface = region.get_height(HeightmapType::WorldSurfaceWg, min_x + 8, min_z + 8);
    let biome = registry.biomes.get(region.get_biome(BlockPos::new(min_x + 8, surface, min_z + 8)));
    if biome.creatures.is_empty() {
        return;
    }

    let mut random = WorldgenRandom::new(seed);
    random.set_decoration_seed(seed, min_x, min_z);

    while random.next_f32() < CREATURE_PROBABILITY {
        let Some(entry) = pick_weighted(&biome.creatures, &mut random) else {
            break;
        };
        let count = group_size(entry, &mut random);
        let mut x = min_x + random.next_i32_bounded(16);
        let mut z = min_z + random.next_i32_bounded(16);

        for _ in 0..count {
            for _attempt in 0..4 {
                let y = region.get_height(HeightmapType::WorldSurfaceWg, x, z);
                let pos = BlockPos::new(x, y, z);
                if region.get_block_state(pos.below()) == blocks::GRASS_BLOCK && region.get_block_state(pos).is_air() {
                    region.add_entity(Entity {
                        kind: entry.entity,
                        category: MobCategory::Creature,
                        x: f64::from(x) + 0.5,
                        y: f64::from(y),
                        z: f64::from(z) + 0.5,
                        persistent: true,
                    });
                    break;
                }
                x = (x + random.next_i32_bounded(5) - random.next_i32_bounded(5)).clamp(min_x, min_x + 15);
                z = (z + random.next_i32_bounded(5) - random.next_i32_bounded(5)).clamp(min_z, min_z + 15);
            }
        }
    }
}

/// Mob counts and caps for one tick, built from the chunks that tick.
#[derive(Debug, Clone)]
pub struct SpawnState {
    counts: [usize; 2],
    caps: [usize; 2],
    enabled: [bool; 2],
    chunk_count: usize,
}

impl SpawnState {
    #[must_use]
    pub fn new(chunks: &[Arc<ChunkAccess>], settings: &SpawnSettings) -> Self {
        let mut counts = [0; 2];
        for chunk in chunks {
            for category in MobCategory::ALL {
                counts[category.index()] += chunk.count_entities(category);
            }
        }
        let chunk_count = chunks.len();
        let scale = |cap: u32| cap as usize * chunk_count / MAGIC_NUMBER;
        Self {
            counts,
            caps: [scale(settings.creature_cap), scale(settings.monster_cap)],
            enabled: [settings.spawn_creatures, settings.spawn_monsters],
            chunk_count,
        }
    }

    #[must_use]
    pub fn can_spawn(&self, category: MobCategory) -> bool {
        let index = category.index();
        self.enabled[index] && self.counts[index] < self.caps[index]
    }

    pub fn record(&mut self, category: MobCategory) {
        self.counts[category.index()] += 1;
    }

    #[must_use]
    pub fn count(&self, category: MobCategory) -> usize {
        self.counts[category.index()]
    }

    #[must_use]
    pub fn cap(&self, category: MobCategory) -> usize {
        self.caps[category.index()]
    }

    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        self.chunk_count
    }
}

/// One spawn attempt per category in `chunk`. Returns how many mobs were
/// added.
pub fn spawn_for_chunk(
    chunk: &ChunkAccess,
    state: &mut SpawnState,
    registry: &Registry,
    random: &mut WorldgenRandom,
) -> usize {
    let mut spawned = 0;
    let pos = chunk.pos();
    for category in MobCategory::ALL {
        if !state.can_spawn(category) {
            continue;
        }
        let lx = random.next_i32_bounded(16);
        let lz = random.next_i32_bounded(16);
        let surface = chunk.get_height(HeightmapType::MotionBlocking, lx, lz);
        let y = match category {
            MobCategory::Creature => surface,
            MobCategory::Monster => {
                let floor = chunk.min_y() + 1;
                if surface - 1 <= floor {
                    continue;
                }
                floor + random.next_i32_bounded(surface - 1 - floor)
            }
        };
        let x = pos.min_block_x() + lx;
        let z = pos.min_block_z() + lz;
        if !is_valid_spawn(chunk, registry, category, x, y, z) {
            continue;
        }

        let biome = registry.biomes.get(chunk.get_noise_biome(x >> 2, y >> 2, z >> 2));
        let entries = match category {
            MobCategory::Creature => &biome.creatures,
            MobCategory::Monster => &biome.monsters,
        };
        let Some(entry) = pick_weighted(entries, random) else {
            continue;
        };
        chunk.add_entity(Entity {
            kind: entry.entity,
            category,
            x: f64::from(x) + 0.5,
            y: f64::from(y),
            z: f64::from(z) + 0.5,
            persistent: false,
        });
        state.record(category);
        spawned += 1;
    }
    spawned
}

fn is_valid_spawn(chunk: &ChunkAccess, registry: &Registry, category: MobCategory, x: i32, y: i32, z: i32) -> bool {
    if chunk.is_outside_build_height(y) || chunk.is_outside_build_height(y + 1) {
        return false;
    }
    let pos = BlockPos::new(x, y, z);
    let ground = chunk.get_block_state(pos.below());
    let feet = chunk.get_block_state(pos);
    let head = chunk.get_block_state(pos.above());
    if !feet.is_air() || !head.is_air() {
        return false;
    }
    match category {
        MobCategory::Creature => ground == blocks::GRASS_BLOCK,
        MobCategory::Monster => registry.blocks.blocks_motion(ground),
    }
}

/// Extra spawn logic run each tick after natural spawning.
pub trait CustomSpawner: Send {
    fn name(&self) -> &str;

    /// Returns how many entities were added.
    fn tick(&mut self, chunks: &[Arc<ChunkAccess>], registry: &Registry, game_time: u64) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_registry::biomes;
    use stratum_utils::ChunkPos;

    fn grass_chunk() -> ChunkAccess {
        let registry = Registry::overworld();
        let chunk = ChunkAccess::new(ChunkPos::new(0, 0), -64, 384);
        for x in 0..16 {
            for z in 0..16 {
                chunk.set_relative_block(x, -64, z, blocks::BEDROCK);
                for y in -63..0 {
                    chunk.set_relative_block(x, y, z, blocks::STONE);
                }
                chunk.set_relative_block(x, 0, z, blocks::GRASS_BLOCK);
            }
        }
        chunk.prime_heightmaps(&HeightmapType::ALL, &registry.blocks);
        for qy in -16..80 {
            for qx in 0..4 {
                for qz in 0..4 {
                    chunk.set_noise_biome(qx, qy, qz, biomes::PLAINS);
                }
            }
        }
        for y in -10..-6 {
            for x in 0..16 {
                for z in 0..16 {
                    chunk.set_relative_block(x, y, z, blocks::AIR);
                }
            }
        }
        chunk
    }

    #[test]
    fn caps_scale_with_chunk_count() {
        let chunks: Vec<_> = (0..289).map(|i| Arc::new(ChunkAccess::new(ChunkPos::new(i, 0), -64, 384))).collect();
        let state = SpawnState::new(&chunks, &SpawnSettings::default());
        assert_eq!(state.cap(MobCategory::Creature), 10);
        assert_eq!(state.cap(MobCategory::Monster), 70);

        let few = SpawnState::new(&chunks[..10], &SpawnSettings::default());
        assert!(!few.can_spawn(MobCategory::Creature));
    }

    #[test]
    fn weighted_pick_covers_every_entry() {
        let entries = [MobSpawn {
            entity: "a",
            weight: 1,
            min_count: 1,
            max_count: 1,
        }, MobSpawn {
            entity: "b",
            weight: 3,
            min_count: 1,
            max_count: 1,
        }];
        let mut random = WorldgenRandom::new(4);
        let mut seen = [false; 2];
        for _ in 0..200 {
            match pick_weighted(&entries, &mut random).map(|e| e.entity) {
                Some("a") => seen[0] = true,
                Some("b") => seen[1] = true,
                other => panic!("unexpected pick {other:?}"),
            }
        }
        assert_eq!(seen, [true, true]);
    }

    #[test]
    fn creatures_need_grass_and_monsters_solid_ground() {
        let registry = Registry::overworld();
        let chunk = grass_chunk();
        assert!(is_valid_spawn(&chunk, &registry, MobCategory::Creature, 3, 1, 3));
        assert!(!is_valid_spawn(&chunk, &registry, MobCategory::Creature, 3, -10, 3));
        assert!(is_valid_spawn(&chunk, &registry, MobCategory::Monster, 3, -10, 3));
        assert!(!is_valid_spawn(&chunk, &registry, MobCategory::Monster, 3, -30, 3));
    }

    #[test]
    fn spawning_respects_caps() {
        let registry = Registry::overworld();
        let chunks: Vec<_> = (0..289).map(|_| Arc::new(grass_chunk())).collect();
        let settings = SpawnSettings {
            creature_cap: 1,
            monster_cap: 0,
            spawn_monsters: true,
            spawn_creatures: true,
        };
        let mut state = SpawnState::new(&chunks, &settings);
        let mut random = WorldgenRandom::new(8);
        let mut total = 0;
        for chunk in &chunks {
            total += spawn_for_chunk(chunk, &mut state, &registry, &mut random);
        }
        assert_eq!(total, 1);
        assert_eq!(state.count(MobCategory::Creature), 1);
        assert_eq!(state.count(MobCategory::Monster), 0);
    }
}
