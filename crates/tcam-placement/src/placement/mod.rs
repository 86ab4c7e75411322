//! Placement planning.
//!
//! Given a group and priority, the planner resolves the slot span for a new
//! rule: first by searching the open interval between the neighboring
//! priorities for free block-contained slots, then, if the interval is
//! full, by planning a compaction (a sequence of rule relocations that
//! opens a window). Compaction is planned in simulation in both directions
//! and the cheaper plan wins; infeasibility is detected before any live
//! state changes, so a `NoSpace` result is always side-effect free.

mod sim;

use std::collections::HashMap;

use log::debug;
use tcam_types::{
    GroupId, LocationMapper, Priority, RuleHandle, SlotIndex, TcamError, TcamResult,
};

use crate::move_list::SlotSpan;
use crate::prio_index::PrioIndex;
use crate::slot_store::SlotStore;
use sim::PlanSim;

/// One planned relocation of an existing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitMove {
    pub handle: RuleHandle,
    pub priority: Priority,
    pub from: SlotSpan,
    pub to: SlotSpan,
}

/// Planner decision for one new rule: relocations to perform first (in
/// order; every destination is free by the time it is written), then the
/// span the rule lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub span: SlotSpan,
    pub moves: Vec<UnitMove>,
}

/// Read-only placement planner over one partition's state.
pub struct Planner<'a> {
    store: &'a SlotStore,
    index: &'a PrioIndex,
    spans: &'a HashMap<RuleHandle, SlotSpan>,
    mapper: &'a dyn LocationMapper,
    block_size: usize,
    buffer: usize,
}

impl<'a> Planner<'a> {
    pub fn new(
        store: &'a SlotStore,
        index: &'a PrioIndex,
        spans: &'a HashMap<RuleHandle, SlotSpan>,
        mapper: &'a dyn LocationMapper,
        block_size: usize,
        buffer: usize,
    ) -> Self {
        Self {
            store,
            index,
            spans,
            mapper,
            block_size,
            buffer,
        }
    }

    /// Resolves a span for a new rule of `slot_count` slots.
    pub fn place(
        &self,
        group: GroupId,
        priority: Priority,
        slot_count: usize,
    ) -> TcamResult<Placement> {
        self.place_excluding(group, priority, slot_count, None)
    }

    /// Like [`Planner::place`], but never relocates `exclude` (used while
    /// atomically modifying that rule).
    pub fn place_excluding(
        &self,
        group: GroupId,
        priority: Priority,
        slot_count: usize,
        exclude: Option<RuleHandle>,
    ) -> TcamResult<Placement> {
        if slot_count == 0 {
            return Err(TcamError::invalid("placement of zero slots"));
        }
        if self.block_size > 0 && slot_count > self.block_size {
            return Err(TcamError::invalid(format!(
                "{} slots cannot fit one block of {}",
                slot_count, self.block_size
            )));
        }
        if self.store.limit() == 0 {
            return Err(TcamError::NoSpace);
        }

        let (lo, hi) = self.interval(group, priority);

        if let Some(base) = self.direct_search(group, priority, slot_count, lo, hi) {
            return Ok(Placement {
                span: SlotSpan::new(base, slot_count),
                moves: Vec::new(),
            });
        }

        // Interval is full: plan compaction both ways and keep the cheaper.
        let mut down = PlanSim::build(
            self.store,
            self.spans,
            self.mapper,
            self.block_size,
            group,
            exclude,
        )?;
        let down_base = down.open_shift_down(priority, slot_count)?;

        let mut up = PlanSim::build(
            self.store,
            self.spans,
            self.mapper,
            self.block_size,
            group,
            exclude,
        )?;
        let up_base = up.open_shift_up(priority, slot_count)?;

        let (base, sim) = match (down_base, up_base) {
            (None, None) => return Err(TcamError::NoSpace),
            (Some(b), None) => (b, down),
            (None, Some(b)) => (b, up),
            (Some(db), Some(ub)) => {
                let down_key = (down.cost(), down.move_count());
                let up_key = (up.cost(), up.move_count());
                if down_key <= up_key {
                    (db, down)
                } else {
                    (ub, up)
                }
            }
        };

        let moves = sim.into_moves();
        debug!(
            "compaction for group {} priority {}: {} move(s), window at {}",
            group,
            priority,
            moves.len(),
            base
        );
        Ok(Placement {
            span: SlotSpan::new(base, slot_count),
            moves,
        })
    }

    /// Open interval `[lo, hi)` bounded by the neighboring priorities.
    fn interval(&self, group: GroupId, priority: Priority) -> (SlotIndex, SlotIndex) {
        let lo = self
            .index
            .prev_priority_end(group, priority)
            .map(|e| e + 1)
            .unwrap_or(0);
        let hi = self
            .index
            .next_priority_start(group, priority)
            .unwrap_or(self.store.limit());
        (lo, hi.max(lo))
    }

    /// Free-slot search inside the interval: forward from the preferred
    /// start (after the equal-priority run, or past the churn buffer),
    /// falling back to the full interval forward, then backward from the
    /// interval end.
    fn direct_search(
        &self,
        group: GroupId,
        priority: Priority,
        slot_count: usize,
        lo: SlotIndex,
        hi: SlotIndex,
    ) -> Option<SlotIndex> {
        let fits = |base: SlotIndex| base >= lo && base + slot_count <= hi;

        let preferred = match self.index.range_of(group, priority) {
            Some(run) => run.end + 1,
            None if lo > 0 => lo + self.buffer,
            None => lo,
        }
        .min(hi);

        if let Some(base) = self.store.find_next_free(preferred, slot_count, self.block_size) {
            if fits(base) {
                return Some(base);
            }
        }
        if preferred > lo {
            if let Some(base) = self.store.find_next_free(lo, slot_count, self.block_size) {
                if fits(base) {
                    return Some(base);
                }
            }
        }
        if let Some(base) = self.store.find_prev_free(hi, slot_count, self.block_size) {
            if fits(base) {
                return Some(base);
            }
        }
        None
    }
}
