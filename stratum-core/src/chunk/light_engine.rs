//! Light engine seam.
//!
//! The chunk map asks for a slot before running a light stage; a refused
//! slot defers the stage to the next tick.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use stratum_utils::ChunkPos;

use crate::chunk::chunk_access::{ChunkAccess, LevelHeightAccessor};
use crate::chunk::heightmap::HeightmapType;

pub trait LightEngine: Send + Sync {
    /// Reserves capacity for one chunk update. `false` means try again later.
    fn try_schedule_update(&self, pos: ChunkPos) -> bool;

    fn light_chunk(&self, chunk: &ChunkAccess) -> anyhow::Result<()>;

    /// Resets the update budget. Runs at the start of every game tick, and
    /// again whenever a blocking chunk request is stalled on light, so it may
    /// run more than once per game tick.
    fn tick(&self) {}

    /// Drops whatever the engine keeps for an unloaded chunk.
    fn unload(&self, pos: ChunkPos);

    fn close(&self);
}

/// Bounded number of chunk updates per tick. Sky light is tracked as the
/// lowest fully lit y per column.
pub struct QueuedLightEngine {
    per_tick: usize,
    scheduled: AtomicUsize,
    closed: AtomicBool,
    sky: Mutex<FxHashMap<ChunkPos, Box<[i32; 256]>>>,
}

impl QueuedLightEngine {
    #[must_use]
    pub fn new(per_tick: usize) -> Self {
        Self {
            per_tick,
            scheduled: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            sky: Mutex::new(FxHashMap::default()),
        }
    }

    /// Number of chunks with sky data.
    #[must_use]
    pub fn lit_count(&self) -> usize {
        self.sky.lock().len()
    }
}

impl Default for QueuedLightEngine {
    fn default() -> Self {
        Self::new(64)
    }
}

impl LightEngine for QueuedLightEngine {
    fn try_schedule_update(&self, _pos: ChunkPos) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.scheduled
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.per_tick).then_some(n + 1))
            .is_ok()
    }

    fn light_chunk(&self, chunk: &ChunkAccess) -> anyhow::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            anyhow::bail!("light engine closed while lighting {}", chunk.pos());
        }
        let mut column = Box::new([chunk.min_y(); 256]);
        for z in 0..16 {
            for x in 0..16 {
                column[(z << 4) | x] = chunk.get_height(HeightmapType::WorldSurfaceWg, x as i32, z as i32);
            }
        }
        self.sky.lock().insert(chunk.pos(), column);
        Ok(())
    }

    fn tick(&self) {
        self.scheduled.store(0, Ordering::Release);
    }

    fn unload(&self, pos: ChunkPos) {
        self.sky.lock().remove(&pos);
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::debug!("Light engine closed with {} lit chunks", self.sky.lock().len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_past_the_per_tick_budget() {
        let engine = QueuedLightEngine::new(2);
        let pos = ChunkPos::new(0, 0);
        assert!(engine.try_schedule_update(pos));
        assert!(engine.try_schedule_update(pos));
        assert!(!engine.try_schedule_update(pos));
        engine.tick();
        assert!(engine.try_schedule_update(pos));
    }

    #[test]
    fn closed_engine_schedules_nothing() {
        let engine = QueuedLightEngine::default();
        engine.close();
        assert!(!engine.try_schedule_update(ChunkPos::new(0, 0)));
        assert!(engine.light_chunk(&ChunkAccess::new(ChunkPos::new(0, 0), 0, 16)).is_err());
    }

    #[test]
    fn unload_drops_sky_data() {
        let engine = QueuedLightEngine::default();
        let pos = ChunkPos::new(4, -2);
        engine.light_chunk(&ChunkAccess::new(pos, 0, 16)).unwrap();
        engine.light_chunk(&ChunkAccess::new(pos.offset(1, 0), 0, 16)).unwrap();
        assert_eq!(engine.lit_count(), 2);
        engine.unload(pos);
        assert_eq!(engine.lit_count(), 1);
        engine.unload(pos);
        assert_eq!(engine.lit_count(), 1);
    }
}
