//! The simulation thread's view of the chunk system.
//!
//! [`ChunkCache::get_chunk`] is the only blocking entry point. On the
//! simulation thread it cooperatively drives generation until the requested
//! stage resolves; elsewhere it posts itself to the simulation thread and
//! waits for the answer.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use stratum_registry::{Registry, blocks};
use stratum_utils::random::{Random, WorldgenRandom};
use stratum_utils::{BlockPos, BlockStateId, ChunkPos};

use crate::chunk::chunk_access::{ChunkAccess, ChunkStatus, LevelHeightAccessor, ScheduledTick};
use crate::chunk::chunk_holder::ChunkResult;
use crate::chunk::chunk_map::{ChunkMap, GenerationJob};
use crate::chunk::chunk_pyramid::{ChunkLookup, StageContext, StageLadder};
use crate::chunk::chunk_ticket_manager::{FULL_CHUNK_LEVEL, Ticket, TicketType};
use crate::chunk::entity::MobCategory;
use crate::chunk::light_engine::QueuedLightEngine;
use crate::chunk::natural_spawner::{self, CustomSpawner, SpawnState};
use crate::chunk::observer::{BlockUpdateBatch, ChunkObserver};
use crate::chunk::storage::{ChunkStorage, MemoryChunkStorage};
use crate::chunk::world_gen_context::WorldGenContext;
use crate::config::WorldConfig;
use crate::fatal::fatal_invariant;

const PINNED_SIZE: usize = 4;

/// Chunks within this many chunks of an observer tick.
const OBSERVER_TICK_RANGE: i32 = 8;

/// Managed blocking parks this long when there is nothing to run.
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Consecutive passes with nothing runnable before a blocked request is
/// declared stuck.
const STALL_PASSES: u32 = 3;

const WATER_TICK_DELAY: u64 = 5;
const LAVA_TICK_DELAY: u64 = 30;
const FALLING_BLOCK_DELAY: u64 = 2;

pub type MainThreadTask = Box<dyn FnOnce(&ChunkCache) + Send>;

/// Queue of work that must run on the simulation thread.
pub struct MainThreadExecutor {
    sender: Sender<MainThreadTask>,
    receiver: Receiver<MainThreadTask>,
    thread: ThreadId,
}

impl MainThreadExecutor {
    fn new(thread: ThreadId) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            thread,
        }
    }

    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.thread
    }

    pub fn submit(&self, task: MainThreadTask) {
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.sender.send(task);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Most-recent-first memo of recent `get_chunk` answers.
#[derive(Default)]
struct PinnedCache {
    entries: VecDeque<(ChunkPos, ChunkStatus, Option<Arc<ChunkAccess>>)>,
}

impl PinnedCache {
    fn get(&self, pos: ChunkPos, status: ChunkStatus) -> Option<&Option<Arc<ChunkAccess>>> {
        self.entries
            .iter()
            .find(|(p, s, _)| *p == pos && *s == status)
            .map(|(_, _, chunk)| chunk)
    }

    fn put(&mut self, pos: ChunkPos, status: ChunkStatus, chunk: Option<Arc<ChunkAccess>>) {
        self.entries.retain(|(p, s, _)| !(*p == pos && *s == status));
        self.entries.push_front((pos, status, chunk));
        self.entries.truncate(PINNED_SIZE);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

struct ObserverEntry {
    observer: Arc<dyn ChunkObserver>,
    pos: BlockPos,
}

impl ObserverEntry {
    fn chunk(&self) -> ChunkPos {
        self.pos.chunk()
    }
}

/// Counters for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkCacheStats {
    pub holders: usize,
    pub full_chunks: usize,
    /// Queued holders, stages running on workers and unrun main thread tasks.
    pub pending_tasks: usize,
    pub tickets: usize,
    pub pinned_hits: u64,
    pub pinned_misses: u64,
}

enum JobOutcome {
    Finished(anyhow::Result<()>),
    Panicked(String),
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

pub struct ChunkCache {
    map: Mutex<ChunkMap>,
    world: Arc<WorldGenContext>,
    ladder: Arc<StageLadder>,
    executor: MainThreadExecutor,
    pool: rayon::ThreadPool,
    pinned: Mutex<PinnedCache>,
    pinned_hits: AtomicU64,
    pinned_misses: AtomicU64,
    in_flight: AtomicUsize,
    observers: Mutex<Vec<ObserverEntry>>,
    spawners: Mutex<Vec<Box<dyn CustomSpawner>>>,
    random: Mutex<WorldgenRandom>,
    game_time: AtomicU64,
    sub_tick: AtomicU64,
    pause_on_fatal: bool,
}

impl ChunkCache {
    /// A cache over the configured generator, in-memory storage and the
    /// queued light engine. The calling thread becomes the simulation thread.
    pub fn from_config(config: WorldConfig) -> anyhow::Result<Self> {
        let registry = Arc::new(Registry::overworld());
        let light_engine = Arc::new(QueuedLightEngine::default());
        let world = WorldGenContext::new(Arc::new(config), registry, light_engine)?;
        Self::new(
            Arc::new(world),
            Arc::new(StageLadder::overworld()),
            Arc::new(MemoryChunkStorage::new()),
        )
    }

    /// The calling thread becomes the simulation thread.
    pub fn new(world: Arc<WorldGenContext>, ladder: Arc<StageLadder>, storage: Arc<dyn ChunkStorage>) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(world.config.worker_threads)
            .thread_name(|index| format!("stratum-worldgen-{index}"))
            .build()
            .context("failed to start the generation worker pool")?;
        log::info!(
            "Chunk cache ready with {} generation workers (max level {})",
            pool.current_num_threads(),
            ladder.max_level()
        );

        let pause_on_fatal = world.config.pause_on_fatal;
        let seed = world.seed();
        Ok(Self {
            map: Mutex::new(ChunkMap::new(world.clone(), ladder.clone(), storage)),
            world,
            ladder,
            executor: MainThreadExecutor::new(thread::current().id()),
            pool,
            pinned: Mutex::new(PinnedCache::default()),
            pinned_hits: AtomicU64::new(0),
            pinned_misses: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            observers: Mutex::new(Vec::new()),
            spawners: Mutex::new(Vec::new()),
            random: Mutex::new(WorldgenRandom::new(seed)),
            game_time: AtomicU64::new(0),
            sub_tick: AtomicU64::new(0),
            pause_on_fatal,
        })
    }

    #[inline]
    #[must_use]
    pub fn world(&self) -> &Arc<WorldGenContext> {
        &self.world
    }

    #[inline]
    #[must_use]
    pub fn ladder(&self) -> &Arc<StageLadder> {
        &self.ladder
    }

    #[inline]
    #[must_use]
    pub fn executor(&self) -> &MainThreadExecutor {
        &self.executor
    }

    #[must_use]
    pub fn game_time(&self) -> u64 {
        self.game_time.load(Ordering::Acquire)
    }

    fn clear_pinned(&self) {
        self.pinned.lock().clear();
    }

    /// Returns the chunk at `stage` or better, blocking until it is generated.
    ///
    /// With `load` set the chunk is kept alive for at least one tick and
    /// failing to produce it is fatal. Without it only chunks some ticket
    /// already covers can resolve, and anything else is `None`.
    pub fn get_chunk(&self, x: i32, z: i32, stage: ChunkStatus, load: bool) -> Option<Arc<ChunkAccess>> {
        if !self.executor.is_main_thread() {
            let (reply, answer) = crossbeam_channel::bounded(1);
            self.executor.submit(Box::new(move |cache: &Self| {
                let _ = reply.send(cache.get_chunk(x, z, stage, load));
            }));
            return answer.recv().ok().flatten();
        }

        let pos = ChunkPos::new(x, z);
        {
            let pinned = self.pinned.lock();
            match pinned.get(pos, stage) {
                Some(Some(chunk)) => {
                    self.pinned_hits.fetch_add(1, Ordering::Relaxed);
                    return Some(chunk.clone());
                }
                Some(None) if !load => {
                    self.pinned_hits.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                _ => {}
            }
        }
        self.pinned_misses.fetch_add(1, Ordering::Relaxed);

        let chunk = self.resolve(pos, stage, load);
        self.pinned.lock().put(pos, stage, chunk.clone());
        chunk
    }

    fn resolve(&self, pos: ChunkPos, stage: ChunkStatus, load: bool) -> Option<Arc<ChunkAccess>> {
        let wanted_level = FULL_CHUNK_LEVEL + self.ladder.distance_for(stage);
        {
            let mut map = self.map.lock();
            if load {
                map.distance_mut()
                    .add_ticket(Ticket::new(TicketType::Unknown, pos, wanted_level, pos.as_long()));
            }
            let settled = map
                .holder(pos)
                .is_some_and(|holder| holder.ticket_level() <= wanted_level);
            if !settled {
                map.run_distance_updates();
            }
        }
        self.clear_pinned();

        let mut idle_passes = 0;
        loop {
            let holder = self.map.lock().holder(pos);
            let result = match &holder {
                Some(holder) => holder.future_for(stage, &self.ladder),
                None => ChunkResult::Failed,
            };
            match result {
                ChunkResult::Ready(chunk) => return Some(chunk),
                ChunkResult::Failed => {
                    if load {
                        self.fatal_unresolved(pos, stage);
                    }
                    return None;
                }
                ChunkResult::Pending => {}
            }

            if self.run_task() || self.generate_step() {
                idle_passes = 0;
                continue;
            }
            if self.in_flight.load(Ordering::Acquire) > 0 {
                self.wait_for_task(IDLE_WAIT);
                continue;
            }
            if self.map.lock().take_light_deferred() {
                self.world.light_engine.tick();
                continue;
            }
            idle_passes += 1;
            if idle_passes >= STALL_PASSES {
                let map = self.map.lock();
                let level = map.distance().level(pos);
                let tickets = map.distance().ticket_summary(pos);
                drop(map);
                fatal_invariant(
                    self.pause_on_fatal,
                    &format!("Chunk {pos} stalled below {stage} (level {level:?}, tickets: {tickets})"),
                );
            }
        }
    }

    fn fatal_unresolved(&self, pos: ChunkPos, stage: ChunkStatus) -> ! {
        let map = self.map.lock();
        let level = map.holder(pos).map(|holder| holder.ticket_level());
        let tickets = map.distance().ticket_summary(pos);
        drop(map);
        fatal_invariant(
            self.pause_on_fatal,
            &format!("Chunk {pos} failed to reach {stage} (holder level {level:?}, tickets: {tickets})"),
        );
    }

    /// Runs one queued main thread task.
    fn run_task(&self) -> bool {
        match self.executor.receiver.try_recv() {
            Ok(task) => {
                task(self);
                true
            }
            Err(_) => false,
        }
    }

    fn wait_for_task(&self, timeout: Duration) {
        match self.executor.receiver.recv_timeout(timeout) {
            Ok(task) => task(self),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
        }
    }

    /// Starts the next ready stage. Inline stages run to completion here,
    /// parallel ones are handed to the worker pool.
    fn generate_step(&self) -> bool {
        let Some(job) = self.map.lock().next_job() else {
            return false;
        };
        self.clear_pinned();
        if job.descriptor.parallel {
            self.spawn_job(job);
        } else {
            self.run_inline(job);
        }
        true
    }

    fn run_inline(&self, job: GenerationJob) {
        let pos = job.pos();
        let context = StageContext {
            world: &self.world,
            region: &job.region,
            step: &job.descriptor,
            lookup: Some(self),
        };
        let result = (job.descriptor.task)(&context);
        self.map.lock().complete_job(pos, job.status, result);
        self.clear_pinned();
    }

    fn spawn_job(&self, job: GenerationJob) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let world = self.world.clone();
        let sender = self.executor.sender.clone();
        self.pool.spawn(move || {
            let pos = job.pos();
            let status = job.status;
            let context = StageContext {
                world: &world,
                region: &job.region,
                step: &job.descriptor,
                lookup: None,
            };
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| (job.descriptor.task)(&context))) {
                Ok(result) => JobOutcome::Finished(result),
                Err(payload) => JobOutcome::Panicked(panic_message(payload.as_ref())),
            };
            drop(job);
            let _ = sender.send(Box::new(move |cache: &Self| {
                cache.in_flight.fetch_sub(1, Ordering::AcqRel);
                match outcome {
                    JobOutcome::Finished(result) => cache.map.lock().complete_job(pos, status, result),
                    JobOutcome::Panicked(message) => fatal_invariant(
                        cache.pause_on_fatal,
                        &format!("Chunk {pos} panicked during {status}: {message}"),
                    ),
                }
                cache.clear_pinned();
            }));
        });
    }

    /// Non-blocking: the chunk if it is full or currently being generated.
    /// Simulation thread only.
    #[must_use]
    pub fn get_chunk_now(&self, x: i32, z: i32) -> Option<Arc<ChunkAccess>> {
        let pos = ChunkPos::new(x, z);
        if let Some(Some(chunk)) = self.pinned.lock().get(pos, ChunkStatus::Full) {
            return Some(chunk.clone());
        }
        let holder = self.map.lock().holder(pos)?;
        if let Some((_, chunk)) = holder.currently_generating() {
            return Some(chunk);
        }
        holder.full_chunk()
    }

    /// Highest completed stage at `pos`, without driving any work.
    #[must_use]
    pub fn status_of(&self, pos: ChunkPos) -> Option<ChunkStatus> {
        self.map.lock().holder(pos)?.latest_status()
    }

    /// Whether a ticket keeps the chunk at `Full`.
    #[must_use]
    pub fn has_chunk(&self, x: i32, z: i32) -> bool {
        self.map
            .lock()
            .holder(ChunkPos::new(x, z))
            .is_some_and(|holder| holder.ticket_level() <= FULL_CHUNK_LEVEL)
    }

    /// One simulation tick. Generation and unloading stop once
    /// `has_time_left` says so; the rest always runs.
    pub fn tick(&self, has_time_left: &mut dyn FnMut() -> bool) {
        let game_time = self.game_time();
        {
            let mut map = self.map.lock();
            map.distance_mut().purge_expired(game_time);
            map.run_distance_updates();
        }
        self.clear_pinned();

        self.world.light_engine.tick();
        self.tick_chunks(game_time);

        while has_time_left() && (self.run_task() || self.generate_step()) {}
        self.map.lock().process_unloads(has_time_left);

        self.clear_pinned();
        self.game_time.fetch_add(1, Ordering::AcqRel);
    }

    /// Drives generation until every queued stage has run and nothing is in
    /// flight. Returns the number of tasks and stages processed.
    pub fn run_until_idle(&self) -> usize {
        let mut processed = 0;
        loop {
            if self.run_task() || self.generate_step() {
                processed += 1;
            } else if self.in_flight.load(Ordering::Acquire) > 0 {
                self.wait_for_task(IDLE_WAIT);
            } else if self.map.lock().take_light_deferred() {
                self.world.light_engine.tick();
            } else {
                return processed;
            }
        }
    }

    fn tick_chunks(&self, game_time: u64) {
        let observers: Vec<ChunkPos> = self.observers.lock().iter().map(ObserverEntry::chunk).collect();
        let mut chunks: Vec<Arc<ChunkAccess>> = {
            let map = self.map.lock();
            map.holders()
                .filter(|holder| holder.is_ticking())
                .filter(|holder| {
                    let pos = holder.pos();
                    map.distance().is_forced(pos)
                        || observers
                            .iter()
                            .any(|observer| observer.chebyshev_distance(pos) <= OBSERVER_TICK_RANGE)
                })
                .filter_map(|holder| holder.full_chunk())
                .collect()
        };
        if chunks.is_empty() {
            return;
        }
        chunks.sort_unstable_by_key(|chunk| chunk.pos());

        let registry = self.world.registry.clone();
        let mut spawn_state = SpawnState::new(&chunks, &self.world.config.spawn);
        let mut changes: FxHashMap<ChunkPos, BlockUpdateBatch> = FxHashMap::default();
        {
            let mut random = self.random.lock();
            random.shuffle(&mut chunks);
            for chunk in &chunks {
                natural_spawner::spawn_for_chunk(chunk, &mut spawn_state, &registry, &mut random);
            }
            for chunk in &chunks {
                let batch = changes
                    .entry(chunk.pos())
                    .or_insert_with(|| BlockUpdateBatch::new(chunk.pos()));
                self.run_scheduled_ticks(chunk, &registry, game_time, batch);
                self.random_tick(chunk, &registry, &mut random, game_time, batch);
            }
        }

        let mut spawned = 0;
        for spawner in self.spawners.lock().iter_mut() {
            let count = spawner.tick(&chunks, &registry, game_time);
            if count > 0 {
                log::trace!("Custom spawner {} added {count} entities", spawner.name());
            }
            spawned += count;
        }

        self.broadcast(changes.into_values().filter(|batch| !batch.is_empty()));
        log::trace!(
            "Ticked {} chunks at {game_time} ({} creatures, {} monsters, {spawned} custom)",
            chunks.len(),
            spawn_state.count(MobCategory::Creature),
            spawn_state.count(MobCategory::Monster),
        );
    }

    fn set_block(chunk: &ChunkAccess, registry: &Registry, pos: BlockPos, state: BlockStateId, batch: &mut BlockUpdateBatch) {
        if chunk.set_block_state(pos, state, &registry.blocks).is_some() {
            batch.changes.push((pos, state));
        }
    }

    fn next_sub_tick(&self) -> u64 {
        self.sub_tick.fetch_add(1, Ordering::Relaxed)
    }

    fn run_scheduled_ticks(&self, chunk: &ChunkAccess, registry: &Registry, game_time: u64, batch: &mut BlockUpdateBatch) {
        let (block_ticks, fluid_ticks) = chunk.take_due_ticks(game_time);
        for tick in block_ticks {
            let below = tick.pos.below();
            if chunk.get_block_state(tick.pos) != tick.block || chunk.is_outside_build_height(below.y) {
                continue;
            }
            let under = chunk.get_block_state(below);
            if under.is_air() || registry.blocks.is_fluid(under) {
                Self::set_block(chunk, registry, tick.pos, under, batch);
                Self::set_block(chunk, registry, below, tick.block, batch);
                chunk.schedule_block_tick(ScheduledTick {
                    pos: below,
                    block: tick.block,
                    trigger_tick: game_time + FALLING_BLOCK_DELAY,
                    sub_tick: self.next_sub_tick(),
                });
            }
        }

        for tick in fluid_ticks {
            let below = tick.pos.below();
            if chunk.get_block_state(tick.pos) != tick.block || chunk.is_outside_build_height(below.y) {
                continue;
            }
            if chunk.get_block_state(below).is_air() {
                Self::set_block(chunk, registry, below, tick.block, batch);
                let delay = if tick.block == blocks::LAVA {
                    LAVA_TICK_DELAY
                } else {
                    WATER_TICK_DELAY
                };
                chunk.schedule_fluid_tick(ScheduledTick {
                    pos: below,
                    block: tick.block,
                    trigger_tick: game_time + delay,
                    sub_tick: self.next_sub_tick(),
                });
            }
        }
    }

    fn random_tick(
        &self,
        chunk: &ChunkAccess,
        registry: &Registry,
        random: &mut WorldgenRandom,
        game_time: u64,
        batch: &mut BlockUpdateBatch,
    ) {
        let speed = self.world.config.random_tick_speed;
        if speed == 0 {
            return;
        }
        let pos = chunk.pos();
        for section in 0..chunk.section_count() {
            if chunk.sections().read(section).is_empty() {
                continue;
            }
            let base_y = chunk.min_y() + (section as i32) * 16;
            for _ in 0..speed {
                let block = BlockPos::new(
                    pos.min_block_x() + random.next_i32_bounded(16),
                    base_y + random.next_i32_bounded(16),
                    pos.min_block_z() + random.next_i32_bounded(16),
                );
                let state = chunk.get_block_state(block);
                if registry.blocks.is_random_ticking(state) {
                    self.random_tick_block(chunk, registry, random, block, state, game_time, batch);
                }
            }
        }
    }

    fn random_tick_block(
        &self,
        chunk: &ChunkAccess,
        registry: &Registry,
        random: &mut WorldgenRandom,
        pos: BlockPos,
        state: BlockStateId,
        game_time: u64,
        batch: &mut BlockUpdateBatch,
    ) {
        let above = chunk.get_block_state(pos.above());
        match state {
            blocks::GRASS_BLOCK => {
                if registry.blocks.blocks_motion(above) || registry.blocks.is_fluid(above) {
                    Self::set_block(chunk, registry, pos, blocks::DIRT, batch);
                    return;
                }
                let target = pos.offset(
                    random.next_i32_bounded(3) - 1,
                    random.next_i32_bounded(5) - 3,
                    random.next_i32_bounded(3) - 1,
                );
                if target.chunk() == chunk.pos()
                    && chunk.get_block_state(target) == blocks::DIRT
                    && chunk.get_block_state(target.above()).is_air()
                {
                    Self::set_block(chunk, registry, target, blocks::GRASS_BLOCK, batch);
                }
            }
            blocks::ICE => {
                let biome = chunk.get_noise_biome(pos.x >> 2, pos.y >> 2, pos.z >> 2);
                if above.is_air() && !registry.biomes.get(biome).is_frozen() {
                    Self::set_block(chunk, registry, pos, blocks::WATER, batch);
                    chunk.schedule_fluid_tick(ScheduledTick {
                        pos,
                        block: blocks::WATER,
                        trigger_tick: game_time + WATER_TICK_DELAY,
                        sub_tick: self.next_sub_tick(),
                    });
                }
            }
            blocks::SHORT_GRASS => {
                if chunk.get_block_state(pos.below()) != blocks::GRASS_BLOCK {
                    Self::set_block(chunk, registry, pos, BlockStateId::AIR, batch);
                }
            }
            _ if registry.blocks.is_leaves(state) => {
                if !Self::near_log(chunk, pos) {
                    Self::set_block(chunk, registry, pos, BlockStateId::AIR, batch);
                }
            }
            _ => {}
        }
    }

    /// Whether a log sits within 4 blocks of `pos` inside the same chunk.
    fn near_log(chunk: &ChunkAccess, pos: BlockPos) -> bool {
        for dy in -4..=4 {
            for dz in -4..=4 {
                for dx in -4..=4 {
                    let other = pos.offset(dx, dy, dz);
                    if other.chunk() != chunk.pos() {
                        // Unknown across the border: keep the leaves.
                        return true;
                    }
                    let state = chunk.get_block_state(other);
                    if state == blocks::OAK_LOG || state == blocks::SPRUCE_LOG {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn broadcast(&self, batches: impl Iterator<Item = BlockUpdateBatch>) {
        let view_distance = self.world.config.view_distance.max(0);
        let observers = self.observers.lock();
        for batch in batches {
            for entry in observers.iter() {
                if entry.chunk().chebyshev_distance(batch.chunk) <= view_distance {
                    entry.observer.on_block_updates(&batch);
                }
            }
        }
    }

    /// Queues a block tick `delay` ticks from now. Returns `false` when the
    /// chunk is not loaded at `Full`.
    pub fn schedule_block_tick(&self, pos: BlockPos, block: BlockStateId, delay: u64) -> bool {
        let chunk_pos = pos.chunk();
        let Some(chunk) = self.map.lock().holder(chunk_pos).and_then(|holder| holder.full_chunk()) else {
            return false;
        };
        chunk.schedule_block_tick(ScheduledTick {
            pos,
            block,
            trigger_tick: self.game_time() + delay,
            sub_tick: self.next_sub_tick(),
        });
        true
    }

    fn with_tickets<R>(&self, update: impl FnOnce(&mut ChunkMap) -> R) -> R {
        let result = {
            let mut map = self.map.lock();
            let result = update(&mut map);
            map.run_distance_updates();
            result
        };
        self.clear_pinned();
        result
    }

    pub fn add_region_ticket(&self, kind: TicketType, pos: ChunkPos, radius: u32, owner: u64) -> bool {
        self.with_tickets(|map| map.distance_mut().add_region_ticket(kind, pos, radius, owner))
    }

    pub fn remove_region_ticket(&self, kind: TicketType, pos: ChunkPos, radius: u32, owner: u64) -> bool {
        self.with_tickets(|map| map.distance_mut().remove_region_ticket(kind, pos, radius, owner))
    }

    pub fn register_ticking(&self, pos: ChunkPos, radius: u32, owner: u64) -> bool {
        self.with_tickets(|map| map.distance_mut().register_ticking(pos, radius, owner))
    }

    pub fn release_ticking(&self, pos: ChunkPos, radius: u32, owner: u64) -> bool {
        self.with_tickets(|map| map.distance_mut().release_ticking(pos, radius, owner))
    }

    pub fn update_forced(&self, pos: ChunkPos, forced: bool) -> bool {
        self.with_tickets(|map| map.distance_mut().update_forced(pos, forced))
    }

    fn view_radius(&self) -> u32 {
        self.world.config.view_distance.max(0) as u32
    }

    fn simulation_radius(&self) -> u32 {
        self.world.config.simulation_distance.max(0) as u32
    }

    /// Keeps chunks around `pos` loaded and ticking for `observer`.
    pub fn add_observer(&self, observer: Arc<dyn ChunkObserver>, pos: BlockPos) {
        let id = observer.id();
        let chunk = pos.chunk();
        let (view, simulation) = (self.view_radius(), self.simulation_radius());
        self.with_tickets(|map| {
            let distance = map.distance_mut();
            distance.add_region_ticket(TicketType::Player, chunk, view, id);
            distance.register_ticking(chunk, simulation, id);
        });
        self.observers.lock().push(ObserverEntry { observer, pos });
        log::debug!("Observer {id:#x} added at {pos}");
    }

    /// Moves an observer's tickets when it crosses into another chunk.
    /// Returns `false` for unknown ids.
    pub fn move_observer(&self, id: u64, pos: BlockPos) -> bool {
        let old = {
            let mut observers = self.observers.lock();
            let Some(entry) = observers.iter_mut().find(|entry| entry.observer.id() == id) else {
                return false;
            };
            std::mem::replace(&mut entry.pos, pos).chunk()
        };
        let new = pos.chunk();
        if old != new {
            let (view, simulation) = (self.view_radius(), self.simulation_radius());
            self.with_tickets(|map| {
                let distance = map.distance_mut();
                distance.add_region_ticket(TicketType::Player, new, view, id);
                distance.register_ticking(new, simulation, id);
                distance.remove_region_ticket(TicketType::Player, old, view, id);
                distance.release_ticking(old, simulation, id);
            });
        }
        true
    }

    pub fn remove_observer(&self, id: u64) -> bool {
        let entry = {
            let mut observers = self.observers.lock();
            let Some(index) = observers.iter().position(|entry| entry.observer.id() == id) else {
                return false;
            };
            observers.swap_remove(index)
        };
        let chunk = entry.chunk();
        let (view, simulation) = (self.view_radius(), self.simulation_radius());
        self.with_tickets(|map| {
            let distance = map.distance_mut();
            distance.remove_region_ticket(TicketType::Player, chunk, view, id);
            distance.release_ticking(chunk, simulation, id);
        });
        log::debug!("Observer {id:#x} removed");
        true
    }

    pub fn add_custom_spawner(&self, spawner: Box<dyn CustomSpawner>) {
        log::debug!("Registered custom spawner {}", spawner.name());
        self.spawners.lock().push(spawner);
    }

    /// Writes dirty chunks to storage. Returns how many were saved.
    pub fn save(&self, flush: bool) -> usize {
        let saved = self.map.lock().save_all(flush);
        log::debug!("Saved {saved} chunks");
        saved
    }

    /// Saves everything and shuts the light engine and the map down.
    pub fn close(&self) {
        self.run_until_idle();
        self.save(true);
        self.world.light_engine.close();
        self.map.lock().close();
        self.clear_pinned();
    }

    #[must_use]
    pub fn stats(&self) -> ChunkCacheStats {
        let map = self.map.lock();
        ChunkCacheStats {
            holders: map.holder_count(),
            full_chunks: map.holders().filter(|holder| holder.full_chunk().is_some()).count(),
            pending_tasks: map.pending_count() + self.in_flight.load(Ordering::Acquire) + self.executor.len(),
            tickets: map.distance().ticket_count(),
            pinned_hits: self.pinned_hits.load(Ordering::Relaxed),
            pinned_misses: self.pinned_misses.load(Ordering::Relaxed),
        }
    }

    /// Human readable state of one position, for debugging.
    #[must_use]
    pub fn chunk_debug_data(&self, pos: ChunkPos) -> String {
        let map = self.map.lock();
        let mut out = String::new();
        let _ = writeln!(out, "chunk {pos}");
        match map.holder(pos) {
            Some(holder) => {
                let latest = holder.latest_status().map_or("none", ChunkStatus::name);
                let _ = writeln!(out, "  status: {latest}");
                let _ = writeln!(out, "  level: {}", holder.ticket_level());
                let _ = writeln!(out, "  ticking: {}", holder.is_ticking());
                let generating = holder
                    .currently_generating()
                    .map_or_else(|| "idle".to_owned(), |(status, _)| status.name().to_owned());
                let _ = writeln!(out, "  generating: {generating}");
                let history: Vec<&str> = holder.history().into_iter().map(ChunkStatus::name).collect();
                let _ = writeln!(out, "  history: {}", history.join(" > "));
            }
            None => {
                let _ = writeln!(out, "  no holder");
            }
        }
        let _ = writeln!(out, "  tickets: {}", map.distance().ticket_summary(pos));
        out
    }
}

impl ChunkLookup for ChunkCache {
    fn chunk_now(&self, x: i32, z: i32) -> Option<Arc<ChunkAccess>> {
        self.get_chunk_now(x, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(x: i32) -> Option<Arc<ChunkAccess>> {
        Some(Arc::new(ChunkAccess::new(ChunkPos::new(x, 0), 0, 16)))
    }

    #[test]
    fn pinned_cache_keeps_four_most_recent() {
        let mut pinned = PinnedCache::default();
        for x in 0..5 {
            pinned.put(ChunkPos::new(x, 0), ChunkStatus::Full, chunk(x));
        }
        assert!(pinned.get(ChunkPos::new(0, 0), ChunkStatus::Full).is_none());
        for x in 1..5 {
            assert!(pinned.get(ChunkPos::new(x, 0), ChunkStatus::Full).is_some());
        }
        assert!(pinned.get(ChunkPos::new(4, 0), ChunkStatus::Noise).is_none());
    }

    #[test]
    fn pinned_cache_refreshes_existing_keys() {
        let mut pinned = PinnedCache::default();
        pinned.put(ChunkPos::new(0, 0), ChunkStatus::Full, None);
        pinned.put(ChunkPos::new(0, 0), ChunkStatus::Full, chunk(0));
        assert_eq!(pinned.entries.len(), 1);
        assert!(matches!(pinned.get(ChunkPos::new(0, 0), ChunkStatus::Full), Some(Some(_))));
        pinned.clear();
        assert!(pinned.get(ChunkPos::new(0, 0), ChunkStatus::Full).is_none());
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
