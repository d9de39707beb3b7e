//! Per-column surface heights.
//!
//! Each heightmap stores, per column, one above the highest block matching
//! its predicate (or the minimum build height when nothing matches).

use serde::{Deserialize, Serialize};
use stratum_registry::BlockRegistry;
use stratum_utils::BlockStateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeightmapType {
    /// Any non-air block, maintained during generation.
    WorldSurfaceWg,
    /// Motion blocking blocks, maintained during generation.
    OceanFloorWg,
    WorldSurface,
    OceanFloor,
    /// Motion blocking blocks and fluids.
    MotionBlocking,
    MotionBlockingNoLeaves,
}

impl HeightmapType {
    pub const ALL: [Self; 6] = [
        Self::WorldSurfaceWg,
        Self::OceanFloorWg,
        Self::WorldSurface,
        Self::OceanFloor,
        Self::MotionBlocking,
        Self::MotionBlockingNoLeaves,
    ];

    /// Maintained while the chunk is still generating.
    pub const WORLDGEN: [Self; 2] = [Self::WorldSurfaceWg, Self::OceanFloorWg];

    /// Maintained once the chunk is full.
    pub const LIVE: [Self; 4] = [
        Self::WorldSurface,
        Self::OceanFloor,
        Self::MotionBlocking,
        Self::MotionBlockingNoLeaves,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether `state` counts as surface for this heightmap.
    #[must_use]
    pub fn is_opaque(self, blocks: &BlockRegistry, state: BlockStateId) -> bool {
        match self {
            Self::WorldSurfaceWg | Self::WorldSurface => !state.is_air(),
            Self::OceanFloorWg | Self::OceanFloor => blocks.blocks_motion(state),
            Self::MotionBlocking => blocks.blocks_motion(state) || blocks.is_fluid(state),
            Self::MotionBlockingNoLeaves => {
                (blocks.blocks_motion(state) || blocks.is_fluid(state)) && !blocks.is_leaves(state)
            }
        }
    }

    /// Parses the upper snake case name used in commands and configs.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "WORLD_SURFACE_WG" => Self::WorldSurfaceWg,
            "OCEAN_FLOOR_WG" => Self::OceanFloorWg,
            "WORLD_SURFACE" => Self::WorldSurface,
            "OCEAN_FLOOR" => Self::OceanFloor,
            "MOTION_BLOCKING" => Self::MotionBlocking,
            "MOTION_BLOCKING_NO_LEAVES" => Self::MotionBlockingNoLeaves,
            _ => return None,
        })
    }
}

/// One heightmap for a 16x16 chunk.
#[derive(Debug, Clone)]
pub struct Heightmap {
    kind: HeightmapType,
    min_y: i32,
    heights: [i32; 256],
}

#[inline]
const fn column(x: usize, z: usize) -> usize {
    (z << 4) | x
}

impl Heightmap {
    #[must_use]
    pub fn new(kind: HeightmapType, min_y: i32) -> Self {
        Self {
            kind,
            min_y,
            heights: [min_y; 256],
        }
    }

    #[must_use]
    pub const fn kind(&self) -> HeightmapType {
        self.kind
    }

    /// One above the highest matching block in the column.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, z: usize) -> i32 {
        self.heights[column(x, z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, z: usize, height: i32) {
        self.heights[column(x, z)] = height;
    }

    /// Applies a block change at `y`. `below` reads the column when the top
    /// block stops matching and the height has to be searched down.
    ///
    /// Returns whether the height changed.
    pub fn update(
        &mut self,
        blocks: &BlockRegistry,
        x: usize,
        y: i32,
        z: usize,
        state: BlockStateId,
        below: impl Fn(i32) -> BlockStateId,
    ) -> bool {
        let current = self.get(x, z);
        if y + 1 < current {
            return false;
        }

        if self.kind.is_opaque(blocks, state) {
            if y >= current {
                self.set(x, z, y + 1);
                return true;
            }
            return false;
        }

        if current - 1 == y {
            let mut search = y - 1;
            while search >= self.min_y {
                if self.kind.is_opaque(blocks, below(search)) {
                    self.set(x, z, search + 1);
                    return true;
                }
                search -= 1;
            }
            self.set(x, z, self.min_y);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_registry::blocks::{AIR, OAK_LEAVES, STONE, WATER};

    #[test]
    fn rises_and_falls_with_the_top_block() {
        let blocks = BlockRegistry::overworld();
        let mut column = vec![AIR; 32];
        let mut map = Heightmap::new(HeightmapType::WorldSurfaceWg, 0);

        column[4] = STONE;
        assert!(map.update(&blocks, 0, 4, 0, STONE, |y| column[y as usize]));
        column[10] = STONE;
        assert!(map.update(&blocks, 0, 10, 0, STONE, |y| column[y as usize]));
        assert_eq!(map.get(0, 0), 11);

        column[10] = AIR;
        assert!(map.update(&blocks, 0, 10, 0, AIR, |y| column[y as usize]));
        assert_eq!(map.get(0, 0), 5);
    }

    #[test]
    fn predicates_differ_per_kind() {
        let blocks = BlockRegistry::overworld();
        assert!(HeightmapType::WorldSurface.is_opaque(&blocks, WATER));
        assert!(!HeightmapType::OceanFloor.is_opaque(&blocks, WATER));
        assert!(HeightmapType::MotionBlocking.is_opaque(&blocks, WATER));
        assert!(HeightmapType::MotionBlocking.is_opaque(&blocks, OAK_LEAVES));
        assert!(!HeightmapType::MotionBlockingNoLeaves.is_opaque(&blocks, OAK_LEAVES));
    }

    #[test]
    fn parses_names() {
        assert_eq!(HeightmapType::from_name("OCEAN_FLOOR"), Some(HeightmapType::OceanFloor));
        assert_eq!(HeightmapType::from_name("ocean_floor"), None);
    }
}
