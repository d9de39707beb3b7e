//! Stratum world generator.
//!
//! Loads `stratum.json` (or the path given as the first argument), prepares
//! the spawn area and then runs the world tick loop. `STRATUM_TICKS` bounds
//! how many ticks run before the world is saved and closed.

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use stratum_core::WorldConfig;
use stratum_core::chunk::chunk_cache::ChunkCache;
use tokio::time::sleep;

mod spawn_progress;

/// One game tick.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

const DEFAULT_TICKS: u64 = 200;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("stratum.json"), PathBuf::from);
    let config = WorldConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    log::debug!("World config:\n{}", config.to_json()?);
    log::info!(
        "Starting world with seed {} ({} terrain)",
        config.seed,
        if config.flat { "flat" } else { "noise" }
    );

    let cache = ChunkCache::from_config(config)?;
    spawn_progress::generate_spawn_chunks(&cache).await;

    let ticks = env::var("STRATUM_TICKS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TICKS);
    run_ticks(&cache, ticks).await;

    let stats = cache.stats();
    log::info!(
        "Stopping: {} holders, {} full chunks, {} tickets, pinned {}/{} hits",
        stats.holders,
        stats.full_chunks,
        stats.tickets,
        stats.pinned_hits,
        stats.pinned_hits + stats.pinned_misses,
    );
    cache.close();
    Ok(())
}

/// Runs `ticks` game ticks, each bounded by the tick interval.
async fn run_ticks(cache: &ChunkCache, ticks: u64) {
    let mut overloaded = 0u64;
    for _ in 0..ticks {
        let start = Instant::now();
        let deadline = start + TICK_INTERVAL;
        cache.tick(&mut || Instant::now() < deadline);

        let elapsed = start.elapsed();
        if elapsed > TICK_INTERVAL {
            overloaded += 1;
            log::debug!("Tick {} took {elapsed:?}", cache.game_time());
        } else {
            sleep(TICK_INTERVAL - elapsed).await;
        }
    }
    if overloaded > 0 {
        log::warn!("{overloaded} of {ticks} ticks ran over {TICK_INTERVAL:?}");
    }
    let saved = cache.save(false);
    log::info!("Ran {ticks} ticks, saved {saved} chunks");
}
