//! Per-position chunk storage.
//!
//! There is exactly one [`ChunkAccess`] per loaded position. It is created
//! empty (or loaded), shared as `Arc`, and upgraded in place as generation
//! stages complete; it is never replaced.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use stratum_registry::BlockRegistry;
use stratum_utils::{BiomeId, BlockPos, BlockStateId, ChunkPos};

use crate::chunk::entity::{BlockEntity, Entity, MobCategory};
use crate::chunk::heightmap::{Heightmap, HeightmapType};
use crate::chunk::section::{ChunkSection, SectionPin, Sections};

/// Generation stages, in the only order a chunk may pass through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChunkStatus {
    Empty,
    StructureStarts,
    StructureReferences,
    Biomes,
    Noise,
    Surface,
    Carvers,
    Features,
    InitializeLight,
    Light,
    Spawn,
    Full,
}

impl ChunkStatus {
    pub const ALL: [Self; 12] = [
        Self::Empty,
        Self::StructureStarts,
        Self::StructureReferences,
        Self::Biomes,
        Self::Noise,
        Self::Surface,
        Self::Carvers,
        Self::Features,
        Self::InitializeLight,
        Self::Light,
        Self::Spawn,
        Self::Full,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::ALL.len() {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self.index().checked_sub(1) {
            Some(index) => Self::from_index(index),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    #[inline]
    #[must_use]
    pub fn is_or_after(self, other: Self) -> bool {
        self >= other
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::StructureStarts => "structure_starts",
            Self::StructureReferences => "structure_references",
            Self::Biomes => "biomes",
            Self::Noise => "noise",
            Self::Surface => "surface",
            Self::Carvers => "carvers",
            Self::Features => "features",
            Self::InitializeLight => "initialize_light",
            Self::Light => "light",
            Self::Spawn => "spawn",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vertical extent of a level or chunk.
pub trait LevelHeightAccessor {
    fn min_y(&self) -> i32;

    fn height(&self) -> i32;

    /// Exclusive.
    fn max_y(&self) -> i32 {
        self.min_y() + self.height()
    }

    fn is_outside_build_height(&self, y: i32) -> bool {
        y < self.min_y() || y >= self.max_y()
    }
}

/// A plain height range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelHeight {
    pub min_y: i32,
    pub height: i32,
}

impl LevelHeightAccessor for LevelHeight {
    fn min_y(&self) -> i32 {
        self.min_y
    }

    fn height(&self) -> i32 {
        self.height
    }
}

/// A block or fluid update queued for a later tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTick {
    pub pos: BlockPos,
    pub block: BlockStateId,
    pub trigger_tick: u64,
    /// Orders ticks that trigger on the same game tick.
    pub sub_tick: u64,
}

pub struct ChunkAccess {
    pos: ChunkPos,
    min_y: i32,
    height: i32,
    sections: Sections,
    heightmaps: RwLock<[Heightmap; 6]>,
    status: AtomicU8,
    dirty: AtomicBool,
    block_ticks: Mutex<Vec<ScheduledTick>>,
    fluid_ticks: Mutex<Vec<ScheduledTick>>,
    post_processing: Mutex<FxHashSet<BlockPos>>,
    block_entities: Mutex<FxHashMap<BlockPos, BlockEntity>>,
    entities: Mutex<Vec<Entity>>,
}

impl fmt::Debug for ChunkAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkAccess")
            .field("pos", &self.pos)
            .field("status", &self.status())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

fn empty_heightmaps(min_y: i32) -> [Heightmap; 6] {
    HeightmapType::ALL.map(|kind| Heightmap::new(kind, min_y))
}

impl ChunkAccess {
    /// A chunk of air at [`ChunkStatus::Empty`].
    #[must_use]
    pub fn new(pos: ChunkPos, min_y: i32, height: i32) -> Self {
        let section_count = (height / 16) as usize;
        Self::from_parts(pos, min_y, height, Sections::new_empty(section_count), ChunkStatus::Empty)
    }

    fn from_parts(pos: ChunkPos, min_y: i32, height: i32, sections: Sections, status: ChunkStatus) -> Self {
        Self {
            pos,
            min_y,
            height,
            sections,
            heightmaps: RwLock::new(empty_heightmaps(min_y)),
            status: AtomicU8::new(status as u8),
            dirty: AtomicBool::new(false),
            block_ticks: Mutex::new(Vec::new()),
            fluid_ticks: Mutex::new(Vec::new()),
            post_processing: Mutex::new(FxHashSet::default()),
            block_entities: Mutex::new(FxHashMap::default()),
            entities: Mutex::new(Vec::new()),
        }
    }

    /// Deep copy, used by storage.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        let copy = Self::from_parts(
            self.pos,
            self.min_y,
            self.height,
            Sections::from_owned(self.sections.snapshot()),
            self.status(),
        );
        *copy.heightmaps.write() = self.heightmaps.read().clone();
        *copy.block_ticks.lock() = self.block_ticks.lock().clone();
        *copy.fluid_ticks.lock() = self.fluid_ticks.lock().clone();
        *copy.post_processing.lock() = self.post_processing.lock().clone();
        *copy.block_entities.lock() = self.block_entities.lock().clone();
        *copy.entities.lock() = self.entities.lock().clone();
        copy
    }

    #[inline]
    #[must_use]
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    #[inline]
    #[must_use]
    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    #[inline]
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Section index of block `y`, if inside the chunk.
    #[inline]
    #[must_use]
    pub fn section_index(&self, y: i32) -> Option<usize> {
        if self.is_outside_build_height(y) {
            None
        } else {
            Some(((y - self.min_y) >> 4) as usize)
        }
    }

    #[must_use]
    pub fn pin_sections(&self) -> SectionPin<'_> {
        self.sections.pin_all()
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> ChunkStatus {
        ChunkStatus::ALL[usize::from(self.status.load(Ordering::Acquire))]
    }

    /// Raises the status to `status`; never lowers it. Returns whether it rose.
    pub fn upgrade_status(&self, status: ChunkStatus) -> bool {
        let previous = self.status.fetch_max(status as u8, Ordering::AcqRel);
        previous < status as u8
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clears the dirty flag, returning its previous value.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    #[must_use]
    pub fn get_block_state(&self, pos: BlockPos) -> BlockStateId {
        self.get_relative_block(pos.x & 15, pos.y, pos.z & 15)
    }

    /// `x` and `z` are chunk-local; `y` is absolute.
    #[must_use]
    pub fn get_relative_block(&self, x: i32, y: i32, z: i32) -> BlockStateId {
        match self.section_index(y) {
            Some(index) => {
                self.sections
                    .read(index)
                    .get_block(x as usize, ((y - self.min_y) & 15) as usize, z as usize)
            }
            None => BlockStateId::AIR,
        }
    }

    /// Raw write for bulk fills: no heightmaps, no dirty flag. `x` and `z`
    /// are chunk-local, `y` is absolute.
    pub fn set_relative_block(&self, x: usize, y: i32, z: usize, state: BlockStateId) {
        if let Some(index) = self.section_index(y) {
            self.sections
                .write(index)
                .set_block(x, ((y - self.min_y) & 15) as usize, z, state);
        }
    }

    /// Writes a block and keeps the heightmaps current. Returns the previous
    /// state, or `None` when nothing changed.
    pub fn set_block_state(&self, pos: BlockPos, state: BlockStateId, blocks: &BlockRegistry) -> Option<BlockStateId> {
        let index = self.section_index(pos.y)?;
        let (lx, lz) = ((pos.x & 15) as usize, (pos.z & 15) as usize);
        let old = self
            .sections
            .write(index)
            .set_block(lx, ((pos.y - self.min_y) & 15) as usize, lz, state);
        if old == state {
            return None;
        }

        let kinds: &[HeightmapType] = if self.status() >= ChunkStatus::Full {
            &HeightmapType::LIVE
        } else {
            &HeightmapType::WORLDGEN
        };
        let mut heightmaps = self.heightmaps.write();
        for kind in kinds {
            heightmaps[kind.index()].update(blocks, lx, pos.y, lz, state, |y| {
                self.get_relative_block(lx as i32, y, lz as i32)
            });
        }
        drop(heightmaps);

        self.mark_dirty();
        Some(old)
    }

    /// Recomputes `kinds` from the block data.
    pub fn prime_heightmaps(&self, kinds: &[HeightmapType], blocks: &BlockRegistry) {
        let mut heightmaps = self.heightmaps.write();
        for x in 0..16 {
            for z in 0..16 {
                for kind in kinds {
                    let map = &mut heightmaps[kind.index()];
                    let mut height = self.min_y;
                    for y in (self.min_y..self.max_y()).rev() {
                        if kind.is_opaque(blocks, self.get_relative_block(x as i32, y, z as i32)) {
                            height = y + 1;
                            break;
                        }
                    }
                    map.set(x, z, height);
                }
            }
        }
    }

    /// One above the highest matching block in the column at local `x, z`.
    #[must_use]
    pub fn get_height(&self, kind: HeightmapType, x: i32, z: i32) -> i32 {
        self.heightmaps.read()[kind.index()].get((x & 15) as usize, (z & 15) as usize)
    }

    /// Biome at absolute quart coordinates, clamped vertically.
    #[must_use]
    pub fn get_noise_biome(&self, quart_x: i32, quart_y: i32, quart_z: i32) -> BiomeId {
        let min_quart = self.min_y >> 2;
        let max_quart = min_quart + (self.height >> 2) - 1;
        let qy = quart_y.clamp(min_quart, max_quart) - min_quart;
        let section = (qy >> 2) as usize;
        self.sections
            .read(section)
            .get_biome((quart_x & 3) as usize, (qy & 3) as usize, (quart_z & 3) as usize)
    }

    pub fn set_noise_biome(&self, quart_x: i32, quart_y: i32, quart_z: i32, biome: BiomeId) {
        let qy = quart_y - (self.min_y >> 2);
        if qy < 0 || qy >= self.height >> 2 {
            return;
        }
        self.sections.write((qy >> 2) as usize).set_biome(
            (quart_x & 3) as usize,
            (qy & 3) as usize,
            (quart_z & 3) as usize,
            biome,
        );
    }

    pub fn mark_post_processing(&self, pos: BlockPos) {
        self.post_processing.lock().insert(pos);
    }

    #[must_use]
    pub fn take_post_processing(&self) -> Vec<BlockPos> {
        let mut positions: Vec<_> = self.post_processing.lock().drain().collect();
        positions.sort_unstable();
        positions
    }

    pub fn schedule_block_tick(&self, tick: ScheduledTick) {
        self.block_ticks.lock().push(tick);
        self.mark_dirty();
    }

    pub fn schedule_fluid_tick(&self, tick: ScheduledTick) {
        self.fluid_ticks.lock().push(tick);
        self.mark_dirty();
    }

    #[must_use]
    pub fn pending_tick_count(&self) -> usize {
        self.block_ticks.lock().len() + self.fluid_ticks.lock().len()
    }

    /// Removes and returns block and fluid ticks due at `game_time`, in
    /// trigger order.
    #[must_use]
    pub fn take_due_ticks(&self, game_time: u64) -> (Vec<ScheduledTick>, Vec<ScheduledTick>) {
        (
            drain_due(&mut self.block_ticks.lock(), game_time),
            drain_due(&mut self.fluid_ticks.lock(), game_time),
        )
    }

    pub fn set_block_entity(&self, entity: BlockEntity) {
        self.block_entities.lock().insert(entity.pos, entity);
        self.mark_dirty();
    }

    pub fn remove_block_entity(&self, pos: BlockPos) -> Option<BlockEntity> {
        let removed = self.block_entities.lock().remove(&pos);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    #[must_use]
    pub fn get_block_entity(&self, pos: BlockPos) -> Option<BlockEntity> {
        self.block_entities.lock().get(&pos).cloned()
    }

    pub fn add_entity(&self, entity: Entity) {
        self.entities.lock().push(entity);
        self.mark_dirty();
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.lock().len()
    }

    #[must_use]
    pub fn count_entities(&self, category: MobCategory) -> usize {
        self.entities.lock().iter().filter(|e| e.category == category).count()
    }

    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.lock().clone()
    }

    /// Copies of every section, for hashing and tests.
    #[must_use]
    pub fn section_snapshot(&self) -> Box<[ChunkSection]> {
        self.sections.snapshot()
    }
}

impl LevelHeightAccessor for ChunkAccess {
    fn min_y(&self) -> i32 {
        self.min_y
    }

    fn height(&self) -> i32 {
        self.height
    }
}

fn drain_due(ticks: &mut Vec<ScheduledTick>, game_time: u64) -> Vec<ScheduledTick> {
    let mut due = Vec::new();
    ticks.retain(|tick| {
        if tick.trigger_tick <= game_time {
            due.push(*tick);
            false
        } else {
            true
        }
    });
    due.sort_by_key(|tick| (tick.trigger_tick, tick.sub_tick));
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_registry::blocks::{STONE, WATER};

    fn chunk() -> ChunkAccess {
        ChunkAccess::new(ChunkPos::new(2, -3), -64, 384)
    }

    #[test]
    fn status_order_and_neighbours() {
        assert!(ChunkStatus::Noise < ChunkStatus::Surface);
        assert_eq!(ChunkStatus::Empty.parent(), None);
        assert_eq!(ChunkStatus::Full.next(), None);
        assert_eq!(ChunkStatus::Biomes.next(), Some(ChunkStatus::Noise));
        assert_eq!(ChunkStatus::Biomes.parent(), Some(ChunkStatus::StructureReferences));
    }

    #[test]
    fn status_only_rises() {
        let chunk = chunk();
        assert!(chunk.upgrade_status(ChunkStatus::Noise));
        assert!(!chunk.upgrade_status(ChunkStatus::Biomes));
        assert_eq!(chunk.status(), ChunkStatus::Noise);
    }

    #[test]
    fn block_writes_update_worldgen_heightmaps() {
        let blocks = BlockRegistry::overworld();
        let chunk = chunk();
        let pos = BlockPos::new(35, 70, -45);
        assert_eq!(chunk.set_block_state(pos, STONE, &blocks), Some(BlockStateId::AIR));
        assert_eq!(chunk.get_block_state(pos), STONE);
        assert_eq!(chunk.get_height(HeightmapType::WorldSurfaceWg, 35, -45), 71);
        assert!(chunk.is_dirty());

        chunk.set_block_state(pos.above(), WATER, &blocks);
        assert_eq!(chunk.get_height(HeightmapType::WorldSurfaceWg, 35, -45), 72);
        assert_eq!(chunk.get_height(HeightmapType::OceanFloorWg, 35, -45), 71);
    }

    #[test]
    fn out_of_range_reads_are_air() {
        let chunk = chunk();
        assert_eq!(chunk.get_relative_block(0, -65, 0), BlockStateId::AIR);
        assert_eq!(chunk.get_relative_block(0, 320, 0), BlockStateId::AIR);
    }

    #[test]
    fn biomes_clamp_vertically() {
        let chunk = chunk();
        chunk.set_noise_biome(8, -16, 8, BiomeId(4));
        assert_eq!(chunk.get_noise_biome(8, -16, 8), BiomeId(4));
        assert_eq!(chunk.get_noise_biome(8, -40, 8), BiomeId(4));
    }

    #[test]
    fn due_ticks_come_out_in_order() {
        let chunk = chunk();
        let pos = BlockPos::new(32, 0, -48);
        for (trigger, sub) in [(5, 2), (3, 9), (5, 1), (9, 0)] {
            chunk.schedule_fluid_tick(ScheduledTick {
                pos,
                block: WATER,
                trigger_tick: trigger,
                sub_tick: sub,
            });
        }
        let (_, due) = chunk.take_due_ticks(5);
        let order: Vec<_> = due.iter().map(|t| (t.trigger_tick, t.sub_tick)).collect();
        assert_eq!(order, vec![(3, 9), (5, 1), (5, 2)]);
        assert_eq!(chunk.pending_tick_count(), 1);
    }

    #[test]
    fn snapshot_is_independent() {
        let blocks = BlockRegistry::overworld();
        let chunk = chunk();
        chunk.set_block_state(BlockPos::new(32, 0, -48), STONE, &blocks);
        let copy = chunk.snapshot();
        chunk.set_block_state(BlockPos::new(32, 0, -48), WATER, &blocks);
        assert_eq!(copy.get_block_state(BlockPos::new(32, 0, -48)), STONE);
    }
}
