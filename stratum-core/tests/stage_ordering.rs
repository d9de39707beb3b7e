//! Stage ordering: every chunk walks the ladder in order, and no stage starts
//! before its neighbourhood reached the prior requirement.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stratum_core::WorldConfig;
use stratum_core::chunk::chunk_access::{ChunkStatus, LevelHeightAccessor};
use stratum_core::chunk::chunk_cache::ChunkCache;
use stratum_core::chunk::chunk_pyramid::{StageContext, StageLadder};
use stratum_core::chunk::chunk_status_tasks::ChunkStatusTasks;
use stratum_core::chunk::chunk_ticket_manager::TicketType;
use stratum_core::chunk::light_engine::QueuedLightEngine;
use stratum_core::chunk::storage::MemoryChunkStorage;
use stratum_core::chunk::world_gen_context::WorldGenContext;
use stratum_registry::Registry;
use stratum_utils::ChunkPos;

fn cache(config: WorldConfig, ladder: StageLadder, light: QueuedLightEngine) -> ChunkCache {
    let world = WorldGenContext::new(Arc::new(config), Arc::new(Registry::overworld()), Arc::new(light)).unwrap();
    ChunkCache::new(Arc::new(world), Arc::new(ladder), Arc::new(MemoryChunkStorage::new())).unwrap()
}

fn flat() -> WorldConfig {
    WorldConfig {
        flat: true,
        worker_threads: 2,
        ..WorldConfig::default()
    }
}

#[test]
fn full_chunks_walk_every_stage_in_order() {
    let cache = ChunkCache::from_config(flat()).unwrap();
    cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    let debug = cache.chunk_debug_data(ChunkPos::new(0, 0));
    let expected: Vec<&str> = ChunkStatus::ALL.iter().map(|status| status.name()).collect();
    assert!(
        debug.contains(&format!("history: {}", expected.join(" > "))),
        "{debug}"
    );
    assert!(debug.contains("status: full"), "{debug}");
}

#[test]
fn neighbours_reach_what_the_center_needed() {
    let cache = ChunkCache::from_config(flat()).unwrap();
    cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();

    // Light at the center needed the ring at InitializeLight, and their
    // features needed the outer ring at Carvers.
    for (x, z) in [(1, 0), (-1, 1), (0, -1)] {
        assert!(cache.get_chunk(x, z, ChunkStatus::InitializeLight, false).is_some());
        assert!(cache.get_chunk(x, z, ChunkStatus::Light, false).is_none());
    }
    for (x, z) in [(2, 0), (-2, 2), (1, -2)] {
        assert!(cache.get_chunk(x, z, ChunkStatus::Carvers, false).is_some());
        assert!(cache.get_chunk(x, z, ChunkStatus::Features, false).is_none());
    }
    assert!(cache.get_chunk(3, 0, ChunkStatus::Empty, false).is_none());
}

static FEATURE_RUNS: AtomicUsize = AtomicUsize::new(0);
static EARLY_NEIGHBOURS: AtomicUsize = AtomicUsize::new(0);

fn checked_features(context: &StageContext<'_>) -> anyhow::Result<()> {
    FEATURE_RUNS.fetch_add(1, Ordering::SeqCst);
    let requirement = context.step.prior_requirement;
    if context.region.chunks().any(|chunk| chunk.status() < requirement) {
        EARLY_NEIGHBOURS.fetch_add(1, Ordering::SeqCst);
    }
    assert_eq!(context.region.write_radius(), 1);
    assert_eq!(context.region.chunks().count(), 9);
    ChunkStatusTasks::generate_features(context)
}

#[test]
fn features_start_only_after_neighbours_carved() {
    let ladder = StageLadder::overworld().with_task(ChunkStatus::Features, checked_features);
    let cache = cache(flat(), ladder, QueuedLightEngine::default());
    cache.add_region_ticket(TicketType::Start, ChunkPos::new(0, 0), 1, 1);
    cache.run_until_idle();

    // A 3x3 full area drives the 5x5 ring around it through features.
    assert!(FEATURE_RUNS.load(Ordering::SeqCst) >= 25);
    assert_eq!(EARLY_NEIGHBOURS.load(Ordering::SeqCst), 0);
}

#[test]
fn light_contention_only_delays_generation() {
    let cache = cache(flat(), StageLadder::overworld(), QueuedLightEngine::new(1));
    cache.add_region_ticket(TicketType::Start, ChunkPos::new(0, 0), 1, 1);
    cache.run_until_idle();
    for z in -1..=1 {
        for x in -1..=1 {
            assert!(cache.get_chunk(x, z, ChunkStatus::Full, false).is_some(), "{x},{z}");
        }
    }
}

#[test]
fn noise_terrain_reaches_full() {
    let config = WorldConfig {
        seed: 2024,
        worker_threads: 2,
        ..WorldConfig::default()
    };
    let cache = ChunkCache::from_config(config).unwrap();
    let chunk = cache.get_chunk(0, 0, ChunkStatus::Full, true).unwrap();
    assert_eq!(chunk.status(), ChunkStatus::Full);
    assert_eq!(chunk.min_y(), -64);
    assert_eq!(chunk.section_count(), 24);
    assert!(cache.get_chunk_now(0, 0).is_some());
}
