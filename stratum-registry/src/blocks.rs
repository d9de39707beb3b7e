//! The block palette.
//!
//! A block state id indexes straight into the palette. Only the handful of
//! properties the generator and heightmaps care about are tracked.

use stratum_utils::BlockStateId;

pub const AIR: BlockStateId = BlockStateId(0);
pub const STONE: BlockStateId = BlockStateId(1);
pub const DEEPSLATE: BlockStateId = BlockStateId(2);
pub const BEDROCK: BlockStateId = BlockStateId(3);
pub const DIRT: BlockStateId = BlockStateId(4);
pub const GRASS_BLOCK: BlockStateId = BlockStateId(5);
pub const SAND: BlockStateId = BlockStateId(6);
pub const SANDSTONE: BlockStateId = BlockStateId(7);
pub const GRAVEL: BlockStateId = BlockStateId(8);
pub const WATER: BlockStateId = BlockStateId(9);
pub const LAVA: BlockStateId = BlockStateId(10);
pub const SNOW_BLOCK: BlockStateId = BlockStateId(11);
pub const ICE: BlockStateId = BlockStateId(12);
pub const OAK_LOG: BlockStateId = BlockStateId(13);
pub const OAK_LEAVES: BlockStateId = BlockStateId(14);
pub const SHORT_GRASS: BlockStateId = BlockStateId(15);
pub const SPRUCE_LOG: BlockStateId = BlockStateId(16);
pub const SPRUCE_LEAVES: BlockStateId = BlockStateId(17);
pub const CACTUS: BlockStateId = BlockStateId(18);
pub const CLAY: BlockStateId = BlockStateId(19);
pub const SPAWNER: BlockStateId = BlockStateId(20);

/// Static properties of one block state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockProperties {
    pub name: &'static str,
    /// Stops entity movement; feeds the motion blocking heightmaps.
    pub blocks_motion: bool,
    pub fluid: bool,
    pub leaves: bool,
    /// Carries a block entity while placed.
    pub block_entity: bool,
    /// Must be revisited when the chunk becomes full (fluids start flowing).
    pub post_process: bool,
    pub random_ticks: bool,
    /// Carvers may replace it.
    pub carvable: bool,
}

impl BlockProperties {
    const fn solid(name: &'static str) -> Self {
        Self {
            name,
            blocks_motion: true,
            fluid: false,
            leaves: false,
            block_entity: false,
            post_process: false,
            random_ticks: false,
            carvable: true,
        }
    }

    const fn fluid(name: &'static str) -> Self {
        Self {
            name,
            blocks_motion: false,
            fluid: true,
            leaves: false,
            block_entity: false,
            post_process: true,
            random_ticks: false,
            carvable: false,
        }
    }

    const fn plant(name: &'static str) -> Self {
        Self {
            name,
            blocks_motion: false,
            fluid: false,
            leaves: false,
            block_entity: false,
            post_process: false,
            random_ticks: true,
            carvable: false,
        }
    }

    const fn not_carvable(mut self) -> Self {
        self.carvable = false;
        self
    }

    const fn ticking(mut self) -> Self {
        self.random_ticks = true;
        self
    }
}

const PALETTE: [BlockProperties; 21] = [
    BlockProperties {
        name: "air",
        blocks_motion: false,
        fluid: false,
        leaves: false,
        block_entity: false,
        post_process: false,
        random_ticks: false,
        carvable: false,
    },
    BlockProperties::solid("stone"),
    BlockProperties::solid("deepslate"),
    BlockProperties::solid("bedrock").not_carvable(),
    BlockProperties::solid("dirt"),
    BlockProperties::solid("grass_block").ticking(),
    BlockProperties::solid("sand"),
    BlockProperties::solid("sandstone"),
    BlockProperties::solid("gravel"),
    BlockProperties::fluid("water"),
    BlockProperties::fluid("lava"),
    BlockProperties::solid("snow_block"),
    BlockProperties::solid("ice").ticking(),
    BlockProperties::solid("oak_log").not_carvable(),
    BlockProperties {
        name: "oak_leaves",
        blocks_motion: true,
        fluid: false,
        leaves: true,
        block_entity: false,
        post_process: false,
        random_ticks: true,
        carvable: false,
    },
    BlockProperties::plant("short_grass"),
    BlockProperties::solid("spruce_log").not_carvable(),
    BlockProperties {
        name: "spruce_leaves",
        blocks_motion: true,
        fluid: false,
        leaves: true,
        block_entity: false,
        post_process: false,
        random_ticks: true,
        carvable: false,
    },
    BlockProperties::plant("cactus"),
    BlockProperties::solid("clay"),
    BlockProperties {
        name: "spawner",
        blocks_motion: true,
        fluid: false,
        leaves: false,
        block_entity: true,
        post_process: false,
        random_ticks: false,
        carvable: false,
    },
];

/// Id-indexed block palette.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    states: Vec<BlockProperties>,
}

impl BlockRegistry {
    #[must_use]
    pub fn overworld() -> Self {
        Self {
            states: PALETTE.to_vec(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Properties of `state`. Unknown ids read as air.
    #[inline]
    #[must_use]
    pub fn get(&self, state: BlockStateId) -> &BlockProperties {
        self.states.get(usize::from(state.0)).unwrap_or(&self.states[0])
    }

    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<BlockStateId> {
        self.states
            .iter()
            .position(|p| p.name == name)
            .map(|i| BlockStateId(i as u16))
    }

    #[inline]
    #[must_use]
    pub fn is_air(&self, state: BlockStateId) -> bool {
        state.is_air()
    }

    #[inline]
    #[must_use]
    pub fn is_fluid(&self, state: BlockStateId) -> bool {
        self.get(state).fluid
    }

    #[inline]
    #[must_use]
    pub fn blocks_motion(&self, state: BlockStateId) -> bool {
        self.get(state).blocks_motion
    }

    #[inline]
    #[must_use]
    pub fn is_leaves(&self, state: BlockStateId) -> bool {
        self.get(state).leaves
    }

    #[inline]
    #[must_use]
    pub fn has_block_entity(&self, state: BlockStateId) -> bool {
        self.get(state).block_entity
    }

    #[inline]
    #[must_use]
    pub fn needs_post_processing(&self, state: BlockStateId) -> bool {
        self.get(state).post_process
    }

    #[inline]
    #[must_use]
    pub fn is_random_ticking(&self, state: BlockStateId) -> bool {
        self.get(state).random_ticks
    }

    #[inline]
    #[must_use]
    pub fn is_carvable(&self, state: BlockStateId) -> bool {
        self.get(state).carvable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_palette_names() {
        let registry = BlockRegistry::overworld();
        for (id, name) in [
            (AIR, "air"),
            (STONE, "stone"),
            (WATER, "water"),
            (LAVA, "lava"),
            (OAK_LEAVES, "oak_leaves"),
            (SPAWNER, "spawner"),
        ] {
            assert_eq!(registry.id_of(name), Some(id), "{name}");
        }
    }

    #[test]
    fn fluids_need_post_processing() {
        let registry = BlockRegistry::overworld();
        assert!(registry.needs_post_processing(WATER));
        assert!(registry.is_fluid(LAVA));
        assert!(!registry.blocks_motion(WATER));
        assert!(!registry.needs_post_processing(STONE));
    }

    #[test]
    fn unknown_ids_read_as_air() {
        let registry = BlockRegistry::overworld();
        assert_eq!(registry.get(BlockStateId(9999)).name, "air");
    }
}
