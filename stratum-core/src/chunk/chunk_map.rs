//! Holders, tickets and the generation queue, owned by the simulation thread.
//!
//! The map never runs stage functions itself. [`ChunkMap::next_job`] hands
//! out one ready stage at a time, already entered on its holder, and
//! [`ChunkMap::complete_job`] publishes the result. The caller decides where
//! the job runs.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use stratum_utils::ChunkPos;

use crate::chunk::chunk_access::{ChunkAccess, ChunkStatus};
use crate::chunk::chunk_holder::ChunkHolder;
use crate::chunk::chunk_pyramid::{StageDescriptor, StageLadder};
use crate::chunk::chunk_ticket_manager::{DistanceManager, LevelChange};
use crate::chunk::generation_region::GenerationRegion;
use crate::chunk::storage::{ChunkLoadError, ChunkStorage};
use crate::chunk::world_gen_context::WorldGenContext;
use crate::fatal::fatal_invariant;

/// One stage ready to run.
pub struct GenerationJob {
    pub holder: Arc<ChunkHolder>,
    pub status: ChunkStatus,
    pub region: GenerationRegion,
    pub descriptor: StageDescriptor,
}

impl GenerationJob {
    #[must_use]
    pub fn pos(&self) -> ChunkPos {
        self.holder.pos()
    }
}

/// Why a queued holder could not start its next stage yet.
enum Blocked {
    /// Try again on a later pass.
    Retry,
    /// Nothing left to do until the holder's level changes.
    Idle,
}

pub struct ChunkMap {
    holders: FxHashMap<ChunkPos, Arc<ChunkHolder>>,
    distance: DistanceManager,
    ladder: Arc<StageLadder>,
    world: Arc<WorldGenContext>,
    storage: Arc<dyn ChunkStorage>,
    pending: VecDeque<ChunkPos>,
    queued: FxHashSet<ChunkPos>,
    unload_queue: VecDeque<ChunkPos>,
    unload_set: FxHashSet<ChunkPos>,
    light_deferred: bool,
    pause_on_fatal: bool,
}

impl ChunkMap {
    #[must_use]
    pub fn new(world: Arc<WorldGenContext>, ladder: Arc<StageLadder>, storage: Arc<dyn ChunkStorage>) -> Self {
        let pause_on_fatal = world.config.pause_on_fatal;
        Self {
            holders: FxHashMap::default(),
            distance: DistanceManager::new(ladder.max_level()),
            ladder,
            world,
            storage,
            pending: VecDeque::new(),
            queued: FxHashSet::default(),
            unload_queue: VecDeque::new(),
            unload_set: FxHashSet::default(),
            light_deferred: false,
            pause_on_fatal,
        }
    }

    #[inline]
    #[must_use]
    pub const fn distance(&self) -> &DistanceManager {
        &self.distance
    }

    #[inline]
    pub const fn distance_mut(&mut self) -> &mut DistanceManager {
        &mut self.distance
    }

    #[inline]
    #[must_use]
    pub fn ladder(&self) -> &Arc<StageLadder> {
        &self.ladder
    }

    #[must_use]
    pub fn holder(&self, pos: ChunkPos) -> Option<Arc<ChunkHolder>> {
        self.holders.get(&pos).cloned()
    }

    pub fn holders(&self) -> impl Iterator<Item = &Arc<ChunkHolder>> {
        self.holders.values()
    }

    #[must_use]
    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn unload_count(&self) -> usize {
        self.unload_queue.len()
    }

    /// Set when a light stage was refused a slot since the last call.
    pub fn take_light_deferred(&mut self) -> bool {
        std::mem::take(&mut self.light_deferred)
    }

    #[must_use]
    pub const fn light_deferred(&self) -> bool {
        self.light_deferred
    }

    fn enqueue(&mut self, pos: ChunkPos) {
        if self.queued.insert(pos) {
            self.pending.push_back(pos);
        }
    }

    /// Applies ticket changes until the levels settle. Returns the number of
    /// level changes applied.
    pub fn run_distance_updates(&mut self) -> usize {
        let mut applied = 0;
        while self.distance.has_pending_updates() {
            let changes = self.distance.run_all_updates();
            applied += changes.len();
            for change in changes {
                self.apply_level_change(change);
            }
        }
        for holder in self.holders.values() {
            holder.set_ticking(self.distance.is_ticking(holder.pos()));
        }
        applied
    }

    fn apply_level_change(&mut self, change: LevelChange) {
        match change.new {
            Some(level) => {
                let pause_on_fatal = self.pause_on_fatal;
                let holder = self
                    .holders
                    .entry(change.pos)
                    .or_insert_with(|| Arc::new(ChunkHolder::new(change.pos, level, pause_on_fatal)));
                holder.set_ticket_level(level);
                if self.unload_set.remove(&change.pos) {
                    self.unload_queue.retain(|pos| *pos != change.pos);
                }
                self.enqueue(change.pos);
            }
            None => {
                let max_level = self.distance.max_level();
                if let Some(holder) = self.holders.get(&change.pos) {
                    holder.set_ticket_level(max_level + 1);
                    if self.unload_set.insert(change.pos) {
                        self.unload_queue.push_back(change.pos);
                    }
                }
            }
        }
    }

    /// Pops queued holders until one can start a stage. Holders that wait on
    /// neighbours or on the light engine go back to the end of the queue.
    pub fn next_job(&mut self) -> Option<GenerationJob> {
        let mut retry = Vec::new();
        let mut job = None;
        for _ in 0..self.pending.len() {
            let Some(pos) = self.pending.pop_front() else {
                break;
            };
            self.queued.remove(&pos);
            match self.try_start(pos) {
                Ok(started) => {
                    job = Some(started);
                    break;
                }
                Err(Blocked::Retry) => retry.push(pos),
                Err(Blocked::Idle) => {}
            }
        }
        for pos in retry {
            self.enqueue(pos);
        }
        job
    }

    fn try_start(&mut self, pos: ChunkPos) -> Result<GenerationJob, Blocked> {
        let holder = self.holders.get(&pos).cloned().ok_or(Blocked::Idle)?;
        let target = holder.target_status(&self.ladder).ok_or(Blocked::Idle)?;
        let next = holder.next_status().ok_or(Blocked::Idle)?;
        if next > target {
            return Err(Blocked::Idle);
        }

        if next == ChunkStatus::Empty {
            return self.start_empty(&holder);
        }

        let descriptor = *self.ladder.descriptor(next);
        let radius = descriptor.radius as i32;
        let mut chunks = Vec::with_capacity(((radius * 2 + 1) * (radius * 2 + 1)) as usize);
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let neighbour_pos = pos.offset(dx, dz);
                let Some(neighbour) = self.holders.get(&neighbour_pos) else {
                    return Err(Blocked::Retry);
                };
                if neighbour.is_failed() && neighbour_pos != pos {
                    log::error!("Chunk {pos} cannot reach {next}: neighbour {neighbour_pos} failed");
                    holder.fail_stage(next);
                    return Err(Blocked::Idle);
                }
                let ready = neighbour
                    .latest_status()
                    .is_some_and(|latest| latest >= descriptor.prior_requirement);
                let chunk = match neighbour.chunk() {
                    Some(chunk) if ready => chunk,
                    _ => {
                        self.enqueue(neighbour_pos);
                        return Err(Blocked::Retry);
                    }
                };
                chunks.push(chunk);
            }
        }

        if next == ChunkStatus::Light && !self.world.light_engine.try_schedule_update(pos) {
            self.light_deferred = true;
            return Err(Blocked::Retry);
        }

        let center = chunks[chunks.len() / 2].clone();
        holder.begin_stage(next, center);
        Ok(GenerationJob {
            region: self.region(chunks, &descriptor, pos),
            holder,
            status: next,
            descriptor,
        })
    }

    /// Loads the chunk from storage, or allocates a fresh one for the empty
    /// stage.
    fn start_empty(&mut self, holder: &Arc<ChunkHolder>) -> Result<GenerationJob, Blocked> {
        let pos = holder.pos();
        if holder.chunk().is_none() {
            match self.storage.load(pos) {
                Ok(Some(chunk)) if chunk.pos() == pos => {
                    log::debug!("Loaded chunk {pos} at {}", chunk.status());
                    holder.install_loaded(Arc::new(chunk));
                    return Err(Blocked::Retry);
                }
                Ok(Some(chunk)) => {
                    let error = ChunkLoadError::Misplaced {
                        requested: pos,
                        stored: chunk.pos(),
                    };
                    log::error!("Discarding stored chunk: {error}");
                }
                Ok(None) => {}
                Err(error) => log::error!("Failed to load chunk {pos}, generating it again: {error:#}"),
            }
        }

        let chunk = Arc::new(ChunkAccess::new(pos, self.world.min_y(), self.world.height()));
        let descriptor = *self.ladder.descriptor(ChunkStatus::Empty);
        holder.begin_stage(ChunkStatus::Empty, chunk.clone());
        Ok(GenerationJob {
            region: self.region(vec![chunk], &descriptor, pos),
            holder: holder.clone(),
            status: ChunkStatus::Empty,
            descriptor,
        })
    }

    fn region(&self, chunks: Vec<Arc<ChunkAccess>>, descriptor: &StageDescriptor, pos: ChunkPos) -> GenerationRegion {
        GenerationRegion::new(
            chunks,
            descriptor.status,
            descriptor.write_radius,
            Some(format!("{pos} {}", descriptor.name)),
            self.world.registry.clone(),
        )
        .with_pause_on_fatal(self.pause_on_fatal)
    }

    /// Publishes the outcome of a job handed out by [`Self::next_job`].
    pub fn complete_job(&mut self, pos: ChunkPos, status: ChunkStatus, result: anyhow::Result<()>) {
        let Some(holder) = self.holders.get(&pos).cloned() else {
            fatal_invariant(
                self.pause_on_fatal,
                &format!("Completed {status} for chunk {pos}, which has no holder"),
            );
        };
        match result {
            Ok(()) => holder.finish_stage(status),
            Err(error) => {
                log::error!("Chunk {pos} failed at {status}: {error:#}");
                holder.fail_stage(status);
            }
        }
        self.enqueue(pos);
    }

    /// Drops holders that lost their tickets, saving dirty chunks first.
    /// Busy or pinned holders stay queued for a later pass.
    pub fn process_unloads(&mut self, has_time_left: &mut dyn FnMut() -> bool) -> usize {
        let mut unloaded = 0;
        let mut keep = VecDeque::new();
        while let Some(pos) = self.unload_queue.pop_front() {
            if !has_time_left() {
                self.unload_queue.push_front(pos);
                break;
            }
            let Some(holder) = self.holders.get(&pos).cloned() else {
                self.unload_set.remove(&pos);
                continue;
            };
            if self.distance.level(pos).is_some() {
                self.unload_set.remove(&pos);
                continue;
            }
            let chunk = holder.chunk();
            if holder.is_busy() || chunk.as_ref().is_some_and(|chunk| chunk.sections().is_pinned()) {
                keep.push_back(pos);
                continue;
            }
            if let Some(chunk) = chunk {
                self.save_chunk(&chunk);
            }
            self.holders.remove(&pos);
            self.unload_set.remove(&pos);
            self.world.light_engine.unload(pos);
            unloaded += 1;
        }
        self.unload_queue.extend(keep);
        if unloaded > 0 {
            log::debug!("Unloaded {unloaded} chunks, {} holders remain", self.holders.len());
        }
        unloaded
    }

    /// Saves `chunk` if it changed since the last save. Returns whether a save
    /// happened.
    fn save_chunk(&self, chunk: &ChunkAccess) -> bool {
        if !chunk.take_dirty() {
            return false;
        }
        match self.storage.save(chunk.pos(), chunk) {
            Ok(()) => true,
            Err(error) => {
                log::error!("Failed to save chunk {}: {error:#}", chunk.pos());
                chunk.mark_dirty();
                false
            }
        }
    }

    /// Saves every idle dirty chunk. Returns how many were written.
    pub fn save_all(&self, flush: bool) -> usize {
        let mut saved = 0;
        for holder in self.holders.values() {
            if holder.is_busy() {
                continue;
            }
            if let Some(chunk) = holder.chunk()
                && self.save_chunk(&chunk)
            {
                saved += 1;
            }
        }
        if flush && let Err(error) = self.storage.flush() {
            log::error!("Failed to flush chunk storage: {error:#}");
        }
        saved
    }

    pub fn close(&mut self) {
        let saved = self.save_all(true);
        log::info!("Chunk map closed: saved {saved} chunks, dropped {} holders", self.holders.len());
        self.holders.clear();
        self.pending.clear();
        self.queued.clear();
        self.unload_queue.clear();
        self.unload_set.clear();
    }
}
