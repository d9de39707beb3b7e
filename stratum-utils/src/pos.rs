use std::fmt;

/// Horizontal position of a chunk column, in chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Packs both coordinates into one `u64`, x in the low half.
    #[inline]
    #[must_use]
    pub const fn as_long(self) -> u64 {
        (self.x as u32 as u64) | ((self.z as u32 as u64) << 32)
    }

    #[inline]
    #[must_use]
    pub const fn from_long(packed: u64) -> Self {
        Self::new(packed as u32 as i32, (packed >> 32) as u32 as i32)
    }

    /// Chunk containing the given block coordinates.
    #[inline]
    #[must_use]
    pub const fn from_block(x: i32, z: i32) -> Self {
        Self::new(x >> 4, z >> 4)
    }

    #[inline]
    #[must_use]
    pub const fn min_block_x(self) -> i32 {
        self.x << 4
    }

    #[inline]
    #[must_use]
    pub const fn min_block_z(self) -> i32 {
        self.z << 4
    }

    /// Chebyshev (chessboard) distance, the metric tickets propagate with.
    #[inline]
    #[must_use]
    pub const fn chebyshev_distance(self, other: Self) -> i32 {
        let dx = (self.x - other.x).abs();
        let dz = (self.z - other.z).abs();
        if dx > dz { dx } else { dz }
    }

    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Absolute block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::from_block(self.x, self.z)
    }

    #[inline]
    #[must_use]
    pub const fn above(self) -> Self {
        Self::new(self.x, self.y + 1, self.z)
    }

    #[inline]
    #[must_use]
    pub const fn below(self) -> Self {
        Self::new(self.x, self.y - 1, self.z)
    }

    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Packs into 26/12/26 bits (x, y, z), the layout aquifer caches key on.
    #[inline]
    #[must_use]
    pub const fn as_long(self) -> i64 {
        ((self.x as i64 & 0x3FF_FFFF) << 38) | ((self.z as i64 & 0x3FF_FFFF) << 12) | (self.y as i64 & 0xFFF)
    }

    #[inline]
    #[must_use]
    pub const fn unpack_x(packed: i64) -> i32 {
        (packed >> 38) as i32
    }

    #[inline]
    #[must_use]
    pub const fn unpack_y(packed: i64) -> i32 {
        ((packed << 52) >> 52) as i32
    }

    #[inline]
    #[must_use]
    pub const fn unpack_z(packed: i64) -> i32 {
        ((packed << 26) >> 38) as i32
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Section (16x16x16) coordinate helpers.
pub struct SectionPos;

impl SectionPos {
    #[inline]
    #[must_use]
    pub const fn block_to_section_coord(coord: i32) -> i32 {
        coord >> 4
    }

    #[inline]
    #[must_use]
    pub const fn section_to_block_coord(coord: i32) -> i32 {
        coord << 4
    }
}
