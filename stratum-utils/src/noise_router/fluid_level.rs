use crate::BlockStateId;

/// A fluid column: `block` fills every y below `max_y_exclusive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluidLevel {
    pub max_y_exclusive: i32,
    pub block: BlockStateId,
}

impl FluidLevel {
    #[inline]
    #[must_use]
    pub const fn new(max_y_exclusive: i32, block: BlockStateId) -> Self {
        Self { max_y_exclusive, block }
    }

    /// Fluid at `y`, or `air` above the level.
    #[inline]
    #[must_use]
    pub const fn at(&self, y: i32, air: BlockStateId) -> BlockStateId {
        if y < self.max_y_exclusive { self.block } else { air }
    }
}

/// The world-wide fluid picker: lava below a hard depth, the default fluid
/// up to sea level.
#[derive(Debug, Clone, Copy)]
pub struct FluidPicker {
    lava: FluidLevel,
    sea: FluidLevel,
}

impl FluidPicker {
    #[must_use]
    pub const fn new(sea_level: i32, default_fluid: BlockStateId, lava_level: i32, lava: BlockStateId) -> Self {
        Self {
            lava: FluidLevel::new(lava_level, lava),
            sea: FluidLevel::new(sea_level, default_fluid),
        }
    }

    #[inline]
    #[must_use]
    pub const fn pick(&self, _x: i32, y: i32, _z: i32) -> FluidLevel {
        let lava_top = if self.lava.max_y_exclusive < self.sea.max_y_exclusive {
            self.lava.max_y_exclusive
        } else {
            self.sea.max_y_exclusive
        };
        if y < lava_top { self.lava } else { self.sea }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER: BlockStateId = BlockStateId(2);
    const LAVA: BlockStateId = BlockStateId(3);

    #[test]
    fn lava_below_threshold_then_sea() {
        let picker = FluidPicker::new(63, WATER, -54, LAVA);
        assert_eq!(picker.pick(0, -60, 0).at(-60, BlockStateId::AIR), LAVA);
        assert_eq!(picker.pick(0, 10, 0).at(10, BlockStateId::AIR), WATER);
        assert_eq!(picker.pick(0, 70, 0).at(70, BlockStateId::AIR), BlockStateId::AIR);
    }
}
