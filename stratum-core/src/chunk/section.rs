//! Vertical 16x16x16 sections of a chunk.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use stratum_utils::{BiomeId, BlockStateId};

pub const SECTION_WIDTH: usize = 16;
pub const SECTION_VOLUME: usize = SECTION_WIDTH * SECTION_WIDTH * SECTION_WIDTH;
/// Biome cells per section (4x4x4).
pub const BIOME_VOLUME: usize = 64;

/// Block states and biomes of one section.
#[derive(Debug, Clone)]
pub struct ChunkSection {
    states: Box<[BlockStateId; SECTION_VOLUME]>,
    biomes: [BiomeId; BIOME_VOLUME],
    non_air: u16,
}

#[inline]
const fn block_index(x: usize, y: usize, z: usize) -> usize {
    (y << 8) | (z << 4) | x
}

#[inline]
const fn biome_index(x: usize, y: usize, z: usize) -> usize {
    (y << 4) | (z << 2) | x
}

impl ChunkSection {
    #[must_use]
    pub fn new_empty() -> Self {
        Self {
            states: Box::new([BlockStateId::AIR; SECTION_VOLUME]),
            biomes: [BiomeId::default(); BIOME_VOLUME],
            non_air: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.non_air == 0
    }

    #[inline]
    #[must_use]
    pub fn get_block(&self, x: usize, y: usize, z: usize) -> BlockStateId {
        self.states[block_index(x, y, z)]
    }

    /// Returns the previous state.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, state: BlockStateId) -> BlockStateId {
        let slot = &mut self.states[block_index(x, y, z)];
        let old = std::mem::replace(slot, state);
        match (old.is_air(), state.is_air()) {
            (true, false) => self.non_air += 1,
            (false, true) => self.non_air -= 1,
            _ => {}
        }
        old
    }

    /// Biome at local quart coordinates (0..4 each).
    #[inline]
    #[must_use]
    pub fn get_biome(&self, x: usize, y: usize, z: usize) -> BiomeId {
        self.biomes[biome_index(x, y, z)]
    }

    #[inline]
    pub fn set_biome(&mut self, x: usize, y: usize, z: usize, biome: BiomeId) {
        self.biomes[biome_index(x, y, z)] = biome;
    }

    /// Block states in `y, z, x` order.
    #[must_use]
    pub fn states(&self) -> &[BlockStateId] {
        self.states.as_slice()
    }
}

/// The vertical stack of sections, each behind its own lock.
///
/// Bulk fills pin the sections they write; a chunk with pinned sections is
/// never unloaded.
#[derive(Debug)]
pub struct Sections {
    sections: Box<[RwLock<ChunkSection>]>,
    pins: AtomicU32,
}

impl Sections {
    #[must_use]
    pub fn new_empty(count: usize) -> Self {
        Self::from_owned((0..count).map(|_| ChunkSection::new_empty()).collect())
    }

    #[must_use]
    pub fn from_owned(sections: Box<[ChunkSection]>) -> Self {
        Self {
            sections: sections.into_vec().into_iter().map(RwLock::new).collect(),
            pins: AtomicU32::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    #[inline]
    pub fn read(&self, index: usize) -> RwLockReadGuard<'_, ChunkSection> {
        self.sections[index].read()
    }

    #[inline]
    pub fn write(&self, index: usize) -> RwLockWriteGuard<'_, ChunkSection> {
        self.sections[index].write()
    }

    /// Copies every section.
    #[must_use]
    pub fn snapshot(&self) -> Box<[ChunkSection]> {
        self.sections.iter().map(|s| s.read().clone()).collect()
    }

    /// Pins every section until the guard drops.
    #[must_use]
    pub fn pin_all(&self) -> SectionPin<'_> {
        self.pins.fetch_add(1, Ordering::AcqRel);
        SectionPin { sections: self }
    }

    #[inline]
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) > 0
    }
}

/// Unpins on drop, including while unwinding.
pub struct SectionPin<'a> {
    sections: &'a Sections,
}

impl Drop for SectionPin<'_> {
    fn drop(&mut self) {
        self.sections.pins.fetch_sub(1, Ordering::AcqRel);
    }
}
