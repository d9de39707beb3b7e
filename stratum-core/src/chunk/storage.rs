//! Chunk persistence.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use stratum_utils::ChunkPos;
use thiserror::Error;

use crate::chunk::chunk_access::ChunkAccess;

pub trait ChunkStorage: Send + Sync {
    /// Reads a saved chunk, `None` if nothing was saved at `pos`.
    fn load(&self, pos: ChunkPos) -> anyhow::Result<Option<ChunkAccess>>;

    fn save(&self, pos: ChunkPos, chunk: &ChunkAccess) -> anyhow::Result<()>;

    /// Makes earlier saves durable.
    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLoadError {
    /// The stored chunk belongs to another position.
    #[error("chunk stored for {requested} claims position {stored}")]
    Misplaced { requested: ChunkPos, stored: ChunkPos },
}

/// Keeps snapshots in memory. Saved chunks survive unloading for the life of
/// the storage.
#[derive(Default)]
pub struct MemoryChunkStorage {
    chunks: Mutex<FxHashMap<ChunkPos, ChunkAccess>>,
    saves: Mutex<u64>,
}

impl MemoryChunkStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    /// Total successful saves, including overwrites.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        *self.saves.lock()
    }
}

impl ChunkStorage for MemoryChunkStorage {
    fn load(&self, pos: ChunkPos) -> anyhow::Result<Option<ChunkAccess>> {
        let chunks = self.chunks.lock();
        let Some(stored) = chunks.get(&pos) else {
            return Ok(None);
        };
        if stored.pos() != pos {
            return Err(ChunkLoadError::Misplaced {
                requested: pos,
                stored: stored.pos(),
            }
            .into());
        }
        Ok(Some(stored.snapshot()))
    }

    fn save(&self, pos: ChunkPos, chunk: &ChunkAccess) -> anyhow::Result<()> {
        self.chunks.lock().insert(pos, chunk.snapshot());
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_access::ChunkStatus;

    #[test]
    fn round_trips_a_snapshot() {
        let storage = MemoryChunkStorage::new();
        let pos = ChunkPos::new(-3, 9);
        let chunk = ChunkAccess::new(pos, 0, 32);
        chunk.upgrade_status(ChunkStatus::Noise);
        storage.save(pos, &chunk).unwrap();

        let loaded = storage.load(pos).unwrap().unwrap();
        assert_eq!(loaded.status(), ChunkStatus::Noise);
        assert!(storage.load(ChunkPos::new(0, 0)).unwrap().is_none());
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn misplaced_chunks_are_errors() {
        let storage = MemoryChunkStorage::new();
        storage.save(ChunkPos::new(1, 1), &ChunkAccess::new(ChunkPos::new(2, 2), 0, 16)).unwrap();
        let error = storage.load(ChunkPos::new(1, 1)).unwrap_err();
        assert!(error.to_string().contains("claims position"));
        assert_eq!(
            error.downcast_ref::<ChunkLoadError>(),
            Some(&ChunkLoadError::Misplaced {
                requested: ChunkPos::new(1, 1),
                stored: ChunkPos::new(2, 2),
            })
        );
    }
}
