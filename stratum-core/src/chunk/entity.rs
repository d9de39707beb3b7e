//! Entities and block entities carried by a chunk.

use stratum_utils::{BlockPos, BlockStateId};

/// Spawn category, each with its own mob cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MobCategory {
    Creature,
    Monster,
}

impl MobCategory {
    pub const ALL: [Self; 2] = [Self::Creature, Self::Monster];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: &'static str,
    pub category: MobCategory,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Survives unloading; set for mobs placed during generation.
    pub persistent: bool,
}

impl Entity {
    #[must_use]
    pub fn block_pos(&self) -> BlockPos {
        BlockPos::new(self.x.floor() as i32, self.y.floor() as i32, self.z.floor() as i32)
    }
}

/// Extra state attached to a placed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntity {
    pub pos: BlockPos,
    pub block: BlockStateId,
}
