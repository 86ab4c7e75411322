//! Logical-to-physical slot mapping.
//!
//! The placement engine works entirely in logical slot indices. Physical
//! coordinates are only consulted to compare relocation costs during
//! compaction (same block is cheaper than same stage, which is cheaper
//! than crossing stages) and to report final coordinates in move records.

use crate::SlotIndex;
use serde::{Deserialize, Serialize};

/// Physical coordinates of one TCAM slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysLocation {
    pub stage: u32,
    pub block: u32,
    pub row: u32,
    pub subword: u32,
}

/// Pure mapping between logical slot indices and physical coordinates.
///
/// Implementations must be side-effect free: the engine may call these
/// functions any number of times during planning, including for plans that
/// are later discarded.
pub trait LocationMapper {
    fn decode(&self, index: SlotIndex) -> PhysLocation;
    fn encode(&self, loc: &PhysLocation) -> SlotIndex;
}

/// Straight-line mapper: consecutive logical indices fill a stage row by
/// row, blocks are contiguous index ranges of `block_size`.
#[derive(Debug, Clone, Copy)]
pub struct LinearLocationMapper {
    pub slots_per_stage: usize,
    pub block_size: usize,
}

impl LinearLocationMapper {
    pub fn new(slots_per_stage: usize, block_size: usize) -> Self {
        Self {
            slots_per_stage: slots_per_stage.max(1),
            block_size: block_size.max(1),
        }
    }
}

impl Default for LinearLocationMapper {
    fn default() -> Self {
        Self::new(512, 8)
    }
}

impl LocationMapper for LinearLocationMapper {
    fn decode(&self, index: SlotIndex) -> PhysLocation {
        PhysLocation {
            stage: (index / self.slots_per_stage) as u32,
            block: (index / self.block_size) as u32,
            row: (index % self.slots_per_stage) as u32,
            subword: 0,
        }
    }

    fn encode(&self, loc: &PhysLocation) -> SlotIndex {
        loc.stage as usize * self.slots_per_stage + loc.row as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_linear_round_trip() {
        let mapper = LinearLocationMapper::new(64, 8);
        for index in [0usize, 7, 8, 63, 64, 130] {
            let loc = mapper.decode(index);
            assert_eq!(mapper.encode(&loc), index);
        }
    }

    #[test]
    fn test_block_boundaries() {
        let mapper = LinearLocationMapper::new(64, 8);
        assert_eq!(mapper.decode(7).block, 0);
        assert_eq!(mapper.decode(8).block, 1);
        assert_eq!(mapper.decode(0).stage, 0);
        assert_eq!(mapper.decode(64).stage, 1);
    }
}
