//! Observers: anything that keeps chunks loaded around a position and wants
//! to hear about block changes near it.

use stratum_utils::{BlockPos, BlockStateId, ChunkPos};

/// Block changes made in one chunk during one tick, in the order they
/// happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockUpdateBatch {
    pub chunk: ChunkPos,
    pub changes: Vec<(BlockPos, BlockStateId)>,
}

impl BlockUpdateBatch {
    #[must_use]
    pub const fn new(chunk: ChunkPos) -> Self {
        Self {
            chunk,
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

pub trait ChunkObserver: Send + Sync {
    /// Stable id; doubles as the owner of the observer's tickets.
    fn id(&self) -> u64;

    fn on_block_updates(&self, batch: &BlockUpdateBatch);
}
