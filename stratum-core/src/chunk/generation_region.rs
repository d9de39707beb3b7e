//! A square window of chunks handed to one stage invocation.
//!
//! Reads are limited to the window and to chunks that already reached the
//! requested status; asking for more is a scheduling bug and aborts. Writes
//! are limited to the write radius around the center; a write outside it is
//! logged and dropped so one over-reaching feature cannot take generation
//! down.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use stratum_registry::Registry;
use stratum_utils::{BiomeId, BlockPos, BlockStateId, ChunkPos};

use crate::chunk::chunk_access::{ChunkAccess, ChunkStatus, LevelHeightAccessor, ScheduledTick};
use crate::chunk::entity::{BlockEntity, Entity};
use crate::chunk::heightmap::HeightmapType;
use crate::fatal::fatal_invariant;

/// Flags accepted by [`GenerationRegion::set_block`].
pub mod block_flags {
    pub const UPDATE_NEIGHBORS: u32 = 1;
    pub const UPDATE_CLIENTS: u32 = 2;
    pub const UPDATE_ALL: u32 = UPDATE_NEIGHBORS | UPDATE_CLIENTS;
    /// The caller already knows the final shape; no post-processing mark.
    pub const UPDATE_KNOWN_SHAPE: u32 = 16;
}

pub struct GenerationRegion {
    chunks: Vec<Arc<ChunkAccess>>,
    size: i32,
    first: ChunkPos,
    last: ChunkPos,
    center: ChunkPos,
    status: ChunkStatus,
    write_radius: i32,
    generating: Option<String>,
    registry: Arc<Registry>,
    sub_tick_count: AtomicU64,
    pause_on_fatal: bool,
}

impl GenerationRegion {
    /// `chunks` is the window in row-major order, z outer.
    #[must_use]
    pub fn new(
        chunks: Vec<Arc<ChunkAccess>>,
        status: ChunkStatus,
        write_radius: u32,
        generating: Option<String>,
        registry: Arc<Registry>,
    ) -> Self {
        let size = (chunks.len() as f64).sqrt().floor() as usize;
        if chunks.is_empty() || size * size != chunks.len() {
            fatal_invariant(
                false,
                &format!("Generation region needs a square window, got {} chunks", chunks.len()),
            );
        }

        let first = chunks[0].pos();
        let last = chunks[chunks.len() - 1].pos();
        let center = chunks[chunks.len() / 2].pos();
        Self {
            chunks,
            size: size as i32,
            first,
            last,
            center,
            status,
            write_radius: write_radius as i32,
            generating,
            registry,
            sub_tick_count: AtomicU64::new(0),
            pause_on_fatal: false,
        }
    }

    #[must_use]
    pub fn with_pause_on_fatal(mut self, pause_on_fatal: bool) -> Self {
        self.pause_on_fatal = pause_on_fatal;
        self
    }

    #[inline]
    #[must_use]
    pub const fn center(&self) -> ChunkPos {
        self.center
    }

    #[inline]
    #[must_use]
    pub fn center_chunk(&self) -> &Arc<ChunkAccess> {
        &self.chunks[self.chunks.len() / 2]
    }

    #[inline]
    #[must_use]
    pub const fn status(&self) -> ChunkStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn first(&self) -> ChunkPos {
        self.first
    }

    #[must_use]
    pub const fn last(&self) -> ChunkPos {
        self.last
    }

    #[must_use]
    pub const fn write_radius(&self) -> i32 {
        self.write_radius
    }

    #[must_use]
    pub fn generating(&self) -> Option<&str> {
        self.generating.as_deref()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Arc<ChunkAccess>> {
        self.chunks.iter()
    }

    #[must_use]
    pub fn contains(&self, x: i32, z: i32) -> bool {
        x >= self.first.x && x <= self.last.x && z >= self.first.z && z <= self.last.z
    }

    /// The chunk at `x, z` if it is in the window and at least at `status`.
    ///
    /// With `must_exist`, a miss aborts with the window and request.
    pub fn get_chunk(&self, x: i32, z: i32, status: ChunkStatus, must_exist: bool) -> Option<&Arc<ChunkAccess>> {
        let found = if self.contains(x, z) {
            let index = (z - self.first.z) * self.size + (x - self.first.x);
            let chunk = &self.chunks[index as usize];
            if chunk.status() >= status { Some(chunk) } else { None }
        } else {
            None
        };

        if found.is_none() && must_exist {
            let actual = if self.contains(x, z) {
                let index = (z - self.first.z) * self.size + (x - self.first.x);
                self.chunks[index as usize].status().to_string()
            } else {
                "outside window".to_string()
            };
            fatal_invariant(
                self.pause_on_fatal,
                &format!(
                    "Requested chunk unavailable during world generation: [{x}, {z}] at {status} ({actual}), \
                     window {}..{}, center {} at {}, currently generating: {}",
                    self.first,
                    self.last,
                    self.center,
                    self.status,
                    self.generating.as_deref().unwrap_or("n/a"),
                ),
            );
        }
        found
    }

    fn chunk_at(&self, pos: BlockPos) -> &Arc<ChunkAccess> {
        let chunk = pos.chunk();
        match self.get_chunk(chunk.x, chunk.z, ChunkStatus::Empty, true) {
            Some(chunk) => chunk,
            None => unreachable!("must_exist lookups abort on a miss"),
        }
    }

    /// Whether a write at `pos` is allowed. Logs and returns false when not.
    #[must_use]
    pub fn ensure_can_write(&self, pos: BlockPos) -> bool {
        let chunk = pos.chunk();
        let distance = self.center.chebyshev_distance(chunk);
        if distance > self.write_radius || !self.contains(chunk.x, chunk.z) {
            log::warn!(
                "Detected set_block in a far chunk [{}, {}], pos: {pos:?}, status: {}{}",
                chunk.x,
                chunk.z,
                self.status,
                self.generating
                    .as_deref()
                    .map(|label| format!(", currently generating: {label}"))
                    .unwrap_or_default(),
            );
            return false;
        }

        if self.generating.is_some() {
            let center = self.center_chunk();
            if center.is_outside_build_height(pos.y) {
                log::warn!(
                    "Detected set_block outside the build height of {} at {pos:?} (range {}..{})",
                    self.center,
                    center.min_y(),
                    center.max_y(),
                );
                return false;
            }
        }
        true
    }

    /// Writes a block and keeps block entities and post-processing marks in
    /// step. Neighbour updates never cascade inside a region, so
    /// `_recursion_budget` is not consumed.
    pub fn set_block(&self, pos: BlockPos, state: BlockStateId, flags: u32, _recursion_budget: u32) -> bool {
        if !self.ensure_can_write(pos) {
            return false;
        }

        let blocks = &self.registry.blocks;
        let chunk = self.chunk_at(pos);
        let Some(old) = chunk.set_block_state(pos, state, blocks) else {
            return true;
        };

        if blocks.has_block_entity(old) {
            chunk.remove_block_entity(pos);
        }
        if blocks.has_block_entity(state) {
            chunk.set_block_entity(BlockEntity { pos, block: state });
        }
        if blocks.needs_post_processing(state) && flags & block_flags::UPDATE_KNOWN_SHAPE == 0 {
            chunk.mark_post_processing(pos);
        }
        true
    }

    /// Replaces a non-air block with air.
    pub fn destroy_block(&self, pos: BlockPos, recursion_budget: u32) -> bool {
        if self.get_block_state(pos).is_air() {
            return false;
        }
        self.set_block(pos, BlockStateId::AIR, block_flags::UPDATE_ALL, recursion_budget)
    }

    #[must_use]
    pub fn get_block_state(&self, pos: BlockPos) -> BlockStateId {
        self.chunk_at(pos).get_block_state(pos)
    }

    /// The block at `pos` if it is a fluid.
    #[must_use]
    pub fn get_fluid_state(&self, pos: BlockPos) -> Option<BlockStateId> {
        let state = self.get_block_state(pos);
        self.registry.blocks.is_fluid(state).then_some(state)
    }

    #[must_use]
    pub fn get_block_entity(&self, pos: BlockPos) -> Option<BlockEntity> {
        self.chunk_at(pos).get_block_entity(pos)
    }

    pub fn add_entity(&self, entity: Entity) -> bool {
        self.chunk_at(entity.block_pos()).add_entity(entity);
        true
    }

    #[must_use]
    pub fn get_biome(&self, pos: BlockPos) -> BiomeId {
        self.chunk_at(pos).get_noise_biome(pos.x >> 2, pos.y >> 2, pos.z >> 2)
    }

    /// One above the highest block matching `kind` at world column `x, z`.
    #[must_use]
    pub fn get_height(&self, kind: HeightmapType, x: i32, z: i32) -> i32 {
        self.chunk_at(BlockPos::new(x, 0, z)).get_height(kind, x, z)
    }

    /// Orders ticks scheduled within the same game tick.
    pub fn next_sub_tick_count(&self) -> u64 {
        self.sub_tick_count.fetch_add(1, Ordering::Relaxed)
    }

    pub fn schedule_fluid_tick(&self, pos: BlockPos, fluid: BlockStateId, trigger_tick: u64) {
        let tick = ScheduledTick {
            pos,
            block: fluid,
            trigger_tick,
            sub_tick: self.next_sub_tick_count(),
        };
        self.chunk_at(pos).schedule_fluid_tick(tick);
    }

    #[must_use]
    pub fn min_y(&self) -> i32 {
        self.center_chunk().min_y()
    }

    #[must_use]
    pub fn max_y(&self) -> i32 {
        self.center_chunk().max_y()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_registry::blocks::{SPAWNER, STONE, WATER};

    fn region(radius: i32, write_radius: u32) -> GenerationRegion {
        let mut chunks = Vec::new();
        for z in -radius..=radius {
            for x in -radius..=radius {
                chunks.push(Arc::new(ChunkAccess::new(ChunkPos::new(x + 5, z - 2), -64, 384)));
            }
        }
        GenerationRegion::new(
            chunks,
            ChunkStatus::Features,
            write_radius,
            Some("features".into()),
            Arc::new(Registry::overworld()),
        )
    }

    #[test]
    fn window_corners_and_center() {
        let region = region(1, 1);
        assert_eq!(region.first(), ChunkPos::new(4, -3));
        assert_eq!(region.last(), ChunkPos::new(6, -1));
        assert_eq!(region.center(), ChunkPos::new(5, -2));
        assert_eq!(region.center_chunk().pos(), ChunkPos::new(5, -2));
    }

    #[test]
    #[should_panic(expected = "square window")]
    fn rejects_non_square_windows() {
        let chunks = (0..3)
            .map(|x| Arc::new(ChunkAccess::new(ChunkPos::new(x, 0), 0, 16)))
            .collect();
        let _ = GenerationRegion::new(chunks, ChunkStatus::Noise, 0, None, Arc::new(Registry::overworld()));
    }

    #[test]
    fn lookups_respect_status() {
        let region = region(1, 1);
        assert!(region.get_chunk(5, -2, ChunkStatus::Empty, false).is_some());
        assert!(region.get_chunk(5, -2, ChunkStatus::Noise, false).is_none());
        assert!(region.get_chunk(8, -2, ChunkStatus::Empty, false).is_none());
    }

    #[test]
    fn block_entities_follow_the_block() {
        let region = region(0, 0);
        let pos = BlockPos::new(80, 10, -30);
        assert!(region.set_block(pos, SPAWNER, block_flags::UPDATE_ALL, 512));
        assert!(region.get_block_entity(pos).is_some());
        assert!(region.set_block(pos, STONE, block_flags::UPDATE_ALL, 512));
        assert!(region.get_block_entity(pos).is_none());
        assert!(region.destroy_block(pos, 512));
        assert!(!region.destroy_block(pos, 512));
    }

    #[test]
    fn fluids_are_marked_for_post_processing() {
        let region = region(0, 0);
        let pos = BlockPos::new(80, 10, -30);
        region.set_block(pos, WATER, block_flags::UPDATE_ALL, 512);
        region.set_block(pos.above(), WATER, block_flags::UPDATE_KNOWN_SHAPE, 512);
        assert_eq!(region.center_chunk().take_post_processing(), vec![pos]);
        assert_eq!(region.get_fluid_state(pos), Some(WATER));
    }

    #[test]
    fn writes_outside_the_build_height_are_dropped() {
        let region = region(0, 0);
        assert!(!region.set_block(BlockPos::new(80, 320, -30), STONE, 0, 0));
        assert!(!region.set_block(BlockPos::new(80, -65, -30), STONE, 0, 0));
    }

    #[test]
    fn sub_ticks_increase() {
        let region = region(0, 0);
        let a = region.next_sub_tick_count();
        let b = region.next_sub_tick_count();
        assert!(b > a);
    }
}
