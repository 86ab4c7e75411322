//! Table configuration and statistics.

use serde::{Deserialize, Serialize};
use tcam_types::{TcamError, TcamResult};

/// Match kind of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchKind {
    /// Full ternary match.
    #[default]
    Ternary,
    /// Exact-expansion (algorithmic TCAM); rules route to partitions by
    /// the partition key in their match payload.
    ExactExpansion,
}

/// Immutable geometry and behavior of one logical table.
///
/// Only the symmetric flag can change after creation, and only while the
/// table holds no rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    pub match_kind: MatchKind,
    /// One shared instance across pipes, or one replica per pipe.
    pub symmetric: bool,
    pub num_pipes: u32,
    /// Independent key-space partitions per pipe instance.
    pub partitions: u32,
    /// Slots per partition, fixed at creation.
    pub partition_slots: usize,
    /// Hardware block size; range-rule siblings never cross a block
    /// boundary. 1 degenerates to plain contiguous search.
    pub block_size: usize,
    /// Reserve the last slot of partition 0 for the direct default rule.
    pub reserve_default_slot: bool,
    /// Action resource reuse forces modify to relocate instead of
    /// rewriting in place.
    pub atomic_modify: bool,
    /// Free slots left after the previous priority's run when choosing the
    /// forward scan start, to reduce future churn.
    pub placement_buffer: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            match_kind: MatchKind::Ternary,
            symmetric: true,
            num_pipes: 1,
            partitions: 1,
            partition_slots: 512,
            block_size: 8,
            reserve_default_slot: false,
            atomic_modify: false,
            placement_buffer: 2,
        }
    }
}

impl TableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_match_kind(mut self, kind: MatchKind) -> Self {
        self.match_kind = kind;
        self
    }

    pub fn with_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    pub fn with_num_pipes(mut self, pipes: u32) -> Self {
        self.num_pipes = pipes;
        self
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_partition_slots(mut self, slots: usize) -> Self {
        self.partition_slots = slots;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_default_slot(mut self, reserve: bool) -> Self {
        self.reserve_default_slot = reserve;
        self
    }

    pub fn with_atomic_modify(mut self, atomic: bool) -> Self {
        self.atomic_modify = atomic;
        self
    }

    pub fn with_placement_buffer(mut self, buffer: usize) -> Self {
        self.placement_buffer = buffer;
        self
    }

    pub fn validate(&self) -> TcamResult<()> {
        if self.name.is_empty() {
            return Err(TcamError::invalid("table name must not be empty"));
        }
        if self.num_pipes == 0 {
            return Err(TcamError::invalid("table needs at least one pipe"));
        }
        if self.partitions == 0 {
            return Err(TcamError::invalid("table needs at least one partition"));
        }
        if self.block_size == 0 {
            return Err(TcamError::invalid("block size must be at least 1"));
        }
        if self.reserve_default_slot && self.partition_slots == 0 {
            return Err(TcamError::invalid(
                "default slot reservation needs a non-empty partition 0",
            ));
        }
        Ok(())
    }
}

/// Cumulative counters for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementStats {
    pub placements: u64,
    pub deletes: u64,
    pub modifies: u64,
    /// Individual rule relocations performed by compaction.
    pub relocations: u64,
    /// Placements that needed at least one relocation.
    pub compactions: u64,
    pub no_space: u64,
    pub commits: u64,
    pub aborts: u64,
    pub replays: u64,
}
