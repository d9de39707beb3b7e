//! Chunk cache behaviour: tickets, pinned answers, blocking from other
//! threads, unloading and the tick loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;
use stratum_core::WorldConfig;
use stratum_core::chunk::chunk_access::{ChunkAccess, ChunkStatus};
use stratum_core::chunk::chunk_cache::ChunkCache;
use stratum_core::chunk::chunk_pyramid::{StageContext, StageLadder};
use stratum_core::chunk::chunk_status_tasks::ChunkStatusTasks;
use stratum_core::chunk::chunk_ticket_manager::{FULL_CHUNK_LEVEL, TicketType};
use stratum_core::chunk::light_engine::QueuedLightEngine;
use stratum_core::chunk::natural_spawner::CustomSpawner;
use stratum_core::chunk::observer::{BlockUpdateBatch, ChunkObserver};
use stratum_core::chunk::storage::MemoryChunkStorage;
use stratum_core::chunk::world_gen_context::WorldGenContext;
use stratum_registry::{Registry, blocks};
use stratum_utils::{BlockPos, ChunkPos};

fn flat_config() -> WorldConfig {
    WorldConfig {
        seed: 42,
        flat: true,
        view_distance: 2,
        simulation_distance: 1,
        worker_threads: 2,
        ..WorldConfig::default()
    }
}

fn cache_with(ladder: StageLadder, storage: Arc<MemoryChunkStorage>) -> ChunkCache {
    let world = WorldGenContext::new(
        Arc::new(flat_config()),
        Arc::new(Registry::overworld()),
        Arc::new(QueuedLightEngine::default()),
    )
    .unwrap();
    ChunkCache::new(Arc::new(world), Arc::new(ladder), storage).unwrap()
}

fn flat_cache() -> ChunkCache {
    ChunkCache::from_config(flat_config()).unwrap()
}

#[test]
fn loading_get_chunk_produces_a_full_chunk() {
    let cache = flat_cache();
    let chunk = cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    assert_eq!(chunk.status(), ChunkStatus::Full);
    assert_eq!(chunk.pos(), ChunkPos::new(0, 0));
    assert_eq!(chunk.get_block_state(BlockPos::new(3, -61, 3)), blocks::GRASS_BLOCK);

    assert!(cache.has_chunk(0, 0));
    assert!(!cache.has_chunk(1, 0));
    assert_eq!(cache.stats().holders, 25);
}

#[test]
fn non_loading_get_chunk_never_creates_work() {
    let cache = flat_cache();
    assert!(cache.get_chunk(10, 10, ChunkStatus::Empty, false).is_none());
    assert_eq!(cache.stats().holders, 0);
}

#[test]
fn repeated_requests_hit_the_pinned_cache() {
    let cache = flat_cache();
    let first = cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    let second = cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let stats = cache.stats();
    assert_eq!(stats.pinned_misses, 1);
    assert_eq!(stats.pinned_hits, 1);

    // Ticket changes invalidate pinned answers.
    cache.add_region_ticket(TicketType::Start, ChunkPos::new(0, 0), 0, 1);
    let third = cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(cache.stats().pinned_misses, 2);
}

#[test]
fn get_chunk_now_sees_only_full_chunks() {
    let cache = flat_cache();
    cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    assert!(cache.get_chunk_now(0, 0).is_some());
    // Neighbours stop short of full.
    assert!(cache.get_chunk_now(2, 0).is_none());
    assert!(cache.get_chunk_now(9, 9).is_none());
}

#[test]
fn requests_from_other_threads_are_served_by_the_tick_loop() {
    let cache = flat_cache();
    let chunk = thread::scope(|scope| {
        let request = scope.spawn(|| cache.get_chunk(4, -3, ChunkStatus::Full, true));
        while !request.is_finished() {
            cache.tick(&mut || true);
        }
        request.join().unwrap()
    });
    let chunk = chunk.unwrap();
    assert_eq!(chunk.pos(), ChunkPos::new(4, -3));
    assert_eq!(chunk.status(), ChunkStatus::Full);
}

#[test]
fn expired_tickets_unload_and_save_chunks() {
    let storage = Arc::new(MemoryChunkStorage::new());
    let cache = cache_with(StageLadder::overworld(), storage.clone());
    let before = cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();

    // The blocking ticket lives for one tick.
    cache.tick(&mut || true);
    assert!(cache.has_chunk(0, 0));
    cache.tick(&mut || true);
    assert!(!cache.has_chunk(0, 0));
    assert_eq!(cache.stats().holders, 0);
    assert_eq!(storage.len(), 25);
    assert!(storage.save_count() >= 25);

    let after = cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.status(), ChunkStatus::Full);
    assert_eq!(after.get_block_state(BlockPos::new(3, -61, 3)), blocks::GRASS_BLOCK);
}

#[test]
fn unloading_releases_light_data() {
    let light = Arc::new(QueuedLightEngine::default());
    let world = WorldGenContext::new(Arc::new(flat_config()), Arc::new(Registry::overworld()), light.clone()).unwrap();
    let cache = ChunkCache::new(
        Arc::new(world),
        Arc::new(StageLadder::overworld()),
        Arc::new(MemoryChunkStorage::new()),
    )
    .unwrap();

    for x in 0..5 {
        cache.get_chunk(x * 10, 0, ChunkStatus::Full, true).unwrap();
    }
    assert!(light.lit_count() >= 5);

    cache.tick(&mut || true);
    cache.tick(&mut || true);
    assert_eq!(cache.stats().holders, 0);
    assert_eq!(light.lit_count(), 0);
}

#[test]
fn loading_request_adds_one_ticket_at_the_stage_level() {
    let cache = flat_cache();
    let pos = ChunkPos::new(5, 5);
    let noise_level = FULL_CHUNK_LEVEL + StageLadder::overworld().distance_for(ChunkStatus::Noise);

    let chunk = cache.get_chunk(5, 5, ChunkStatus::Noise, true).unwrap();
    assert!(chunk.status() >= ChunkStatus::Noise);
    assert_eq!(cache.stats().tickets, 1);
    let debug = cache.chunk_debug_data(pos);
    assert!(debug.contains(&format!("level: {noise_level}\n")), "{debug}");
    assert!(debug.contains(&format!("unknown@{pos} level {noise_level}")), "{debug}");
    assert!(!cache.has_chunk(5, 5));

    cache.get_chunk(5, 5, ChunkStatus::Full, true).unwrap();
    assert_eq!(cache.stats().tickets, 2);
    let debug = cache.chunk_debug_data(pos);
    assert!(debug.contains(&format!("level: {FULL_CHUNK_LEVEL}\n")), "{debug}");
    assert!(cache.has_chunk(5, 5));
}

#[test]
fn save_writes_only_dirty_chunks() {
    let storage = Arc::new(MemoryChunkStorage::new());
    let cache = cache_with(StageLadder::overworld(), storage.clone());
    cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();

    assert_eq!(cache.save(true), 25);
    assert_eq!(cache.save(true), 0);
    assert_eq!(storage.save_count(), 25);
}

static SAW_SELF: AtomicBool = AtomicBool::new(false);

fn spawn_probe(context: &StageContext<'_>) -> anyhow::Result<()> {
    let pos = context.chunk().pos();
    let found = context
        .lookup
        .and_then(|lookup| lookup.chunk_now(pos.x, pos.z))
        .is_some_and(|chunk| Arc::ptr_eq(&chunk, context.chunk()));
    if found {
        SAW_SELF.store(true, Ordering::SeqCst);
    }
    ChunkStatusTasks::generate_spawn(context)
}

#[test]
fn inline_stages_can_reenter_the_cache() {
    let ladder = StageLadder::overworld().with_task(ChunkStatus::Spawn, spawn_probe);
    let cache = cache_with(ladder, Arc::new(MemoryChunkStorage::new()));
    cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    assert!(SAW_SELF.load(Ordering::SeqCst));
}

fn failing_surface(_context: &StageContext<'_>) -> anyhow::Result<()> {
    anyhow::bail!("surface rules exploded")
}

#[test]
fn failed_stages_resolve_to_none_without_load() {
    let ladder = StageLadder::overworld().with_task(ChunkStatus::Surface, failing_surface);
    let cache = cache_with(ladder, Arc::new(MemoryChunkStorage::new()));
    cache.add_region_ticket(TicketType::Start, ChunkPos::new(0, 0), 0, 1);
    assert!(cache.get_chunk(0, 0, ChunkStatus::Full, false).is_none());
    assert!(cache.get_chunk(0, 0, ChunkStatus::Noise, false).is_some());
    assert!(cache.chunk_debug_data(ChunkPos::new(0, 0)).contains("history:"));
}

#[test]
#[should_panic(expected = "failed to reach")]
fn failed_stages_are_fatal_with_load() {
    let ladder = StageLadder::overworld().with_task(ChunkStatus::Surface, failing_surface);
    let cache = cache_with(ladder, Arc::new(MemoryChunkStorage::new()));
    let _ = cache.get_chunk(0, 0, ChunkStatus::Full, true);
}

struct Recorder {
    id: u64,
    batches: Mutex<Vec<BlockUpdateBatch>>,
}

impl ChunkObserver for Recorder {
    fn id(&self) -> u64 {
        self.id
    }

    fn on_block_updates(&self, batch: &BlockUpdateBatch) {
        self.batches.lock().push(batch.clone());
    }
}

#[test]
fn observers_hear_about_falling_blocks() {
    let cache = flat_cache();
    let recorder = Arc::new(Recorder {
        id: 7,
        batches: Mutex::new(Vec::new()),
    });
    cache.add_observer(recorder.clone(), BlockPos::new(8, -60, 8));
    cache.run_until_idle();

    let chunk: Arc<ChunkAccess> = cache.get_chunk(0, 0, ChunkStatus::Full, false).unwrap();
    let sand = BlockPos::new(3, 10, 3);
    chunk.set_block_state(sand, blocks::SAND, &cache.world().registry.blocks);
    assert!(cache.schedule_block_tick(sand, blocks::SAND, 0));

    for _ in 0..4 {
        cache.tick(&mut || true);
    }
    assert_eq!(chunk.get_block_state(sand), blocks::AIR);

    let batches = recorder.batches.lock();
    assert!(
        batches
            .iter()
            .any(|batch| batch.chunk == ChunkPos::new(0, 0) && batch.changes.contains(&(sand, blocks::AIR)))
    );
    drop(batches);

    assert!(cache.move_observer(7, BlockPos::new(40, -60, 8)));
    assert!(cache.remove_observer(7));
    assert!(!cache.remove_observer(7));
}

struct CountingSpawner {
    calls: Arc<AtomicUsize>,
}

impl CustomSpawner for CountingSpawner {
    fn name(&self) -> &str {
        "counting"
    }

    fn tick(&mut self, chunks: &[Arc<ChunkAccess>], _registry: &Registry, _game_time: u64) -> usize {
        assert!(!chunks.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        0
    }
}

#[test]
fn custom_spawners_tick_with_forced_chunks() {
    let cache = flat_cache();
    let calls = Arc::new(AtomicUsize::new(0));
    cache.add_custom_spawner(Box::new(CountingSpawner { calls: calls.clone() }));

    cache.tick(&mut || true);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    cache.update_forced(ChunkPos::new(0, 0), true);
    cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    cache.tick(&mut || true);
    cache.tick(&mut || true);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.has_chunk(0, 0));
}

#[test]
fn close_saves_everything() {
    let storage = Arc::new(MemoryChunkStorage::new());
    let cache = cache_with(StageLadder::overworld(), storage.clone());
    cache.get_chunk(1, 1, ChunkStatus::Full, true).unwrap();
    cache.close();
    assert_eq!(storage.len(), 25);
    assert_eq!(cache.stats().holders, 0);
}
