//! Spawn area preparation with progress logging.
//!
//! During startup, ticks the chunk cache until every chunk around the spawn
//! point reached `Full`.
//!
//! Set the `PREGEN_RADIUS` environment variable to generate a larger area
//! (e.g., 32).

use std::env;
use std::time::{Duration, Instant};

use stratum_core::chunk::chunk_access::{ChunkStatus, LevelHeight};
use stratum_core::chunk::chunk_cache::ChunkCache;
use stratum_core::chunk::chunk_generator::ChunkGenerator;
use stratum_core::chunk::chunk_ticket_manager::{FULL_CHUNK_LEVEL, TicketType};
use stratum_utils::{ChunkPos, SectionPos};
use tokio::time::sleep;

/// Chunks within this radius of spawn reach `Full`.
const SPAWN_RADIUS: i32 = 3;

/// Owner id of the spawn tickets.
const SPAWN_OWNER: u64 = 0;

/// How long each preparation tick may spend on generation.
const TICK_BUDGET: Duration = Duration::from_millis(50);

/// Gets the pregeneration radius from the environment, or the spawn radius.
fn get_pregen_radius() -> i32 {
    env::var("PREGEN_RADIUS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|radius: &i32| *radius >= 0)
        .unwrap_or(SPAWN_RADIUS)
}

/// Finds the spawn chunk, places tickets around it and ticks the cache until
/// the whole area is `Full`. The tickets are released afterwards.
pub async fn generate_spawn_chunks(cache: &ChunkCache) {
    let world = cache.world();
    let view = LevelHeight {
        min_y: world.min_y(),
        height: world.height(),
    };
    let spawn = world.generator.spawn_height(0, 0, &view);
    let pregen_radius = get_pregen_radius();
    let center_chunk = ChunkPos::new(
        SectionPos::block_to_section_coord(spawn.x),
        SectionPos::block_to_section_coord(spawn.z),
    );
    let total_chunks = ((pregen_radius * 2 + 1) * (pregen_radius * 2 + 1)) as usize;

    log::info!(
        "Preparing spawn area: {total_chunks} chunks (radius {pregen_radius}) around chunk {center_chunk}, spawn at {spawn}",
    );

    // A single region ticket reaches at most FULL_CHUNK_LEVEL rings.
    let ticket_positions: Vec<(ChunkPos, u32)> = if (pregen_radius as u32) <= FULL_CHUNK_LEVEL {
        vec![(center_chunk, pregen_radius as u32)]
    } else {
        let mut positions = Vec::with_capacity(total_chunks);
        for z in -pregen_radius..=pregen_radius {
            for x in -pregen_radius..=pregen_radius {
                positions.push((center_chunk.offset(x, z), 0));
            }
        }
        positions
    };

    for &(pos, radius) in &ticket_positions {
        cache.add_region_ticket(TicketType::Start, pos, radius, SPAWN_OWNER);
    }

    let start = Instant::now();
    generate_pregen(cache, center_chunk, pregen_radius).await;
    let elapsed = start.elapsed();

    for &(pos, radius) in &ticket_positions {
        cache.remove_region_ticket(TicketType::Start, pos, radius, SPAWN_OWNER);
    }

    log::info!(
        "Spawn area prepared: {} chunks in {:.2}s ({:.1} chunks/s)",
        total_chunks,
        elapsed.as_secs_f64(),
        total_chunks as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    );
}

/// Ticks until the area is full, reporting progress every 5 seconds.
async fn generate_pregen(cache: &ChunkCache, center_chunk: ChunkPos, radius: i32) {
    let total_chunks = ((radius * 2 + 1) * (radius * 2 + 1)) as usize;
    let mut last_report = Instant::now();
    let mut last_completed = 0usize;

    loop {
        let deadline = Instant::now() + TICK_BUDGET;
        cache.tick(&mut || Instant::now() < deadline);

        let completed = count_full_chunks(cache, center_chunk, radius);

        if last_report.elapsed() >= Duration::from_secs(5) {
            let chunks_per_sec = completed.saturating_sub(last_completed) as f64 / 5.0;
            let percent = (completed as f64 / total_chunks as f64) * 100.0;
            let eta = if chunks_per_sec > 0.0 {
                (total_chunks - completed) as f64 / chunks_per_sec
            } else {
                0.0
            };
            let stats = cache.stats();
            log::info!(
                "Progress: {completed}/{total_chunks} ({percent:.1}%), {chunks_per_sec:.1} chunks/s, ETA: {eta:.0}s, {} pending",
                stats.pending_tasks,
            );
            last_report = Instant::now();
            last_completed = completed;
        }

        if completed == total_chunks {
            break;
        }

        sleep(Duration::from_millis(1)).await;
    }
}

/// Counts how many chunks in the area have reached Full status.
fn count_full_chunks(cache: &ChunkCache, center_chunk: ChunkPos, radius: i32) -> usize {
    let mut completed = 0;
    for dz in -radius..=radius {
        for dx in -radius..=radius {
            if cache.status_of(center_chunk.offset(dx, dz)) == Some(ChunkStatus::Full) {
                completed += 1;
            }
        }
    }
    completed
}
