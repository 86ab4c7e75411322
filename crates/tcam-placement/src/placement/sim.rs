//! Compaction simulation.
//!
//! Compaction plans are built entirely against this scratch view and only
//! applied to the live slot store after the whole move sequence is known to
//! succeed; a plan that runs out of room leaves the live state untouched.
//!
//! The simulation tracks the target group's rules as movable units and
//! treats every other occupant (other groups, the excluded rule of an
//! atomic modify) as an immovable obstacle, which can never violate another
//! group's ordering.

use std::collections::{BTreeMap, HashMap};

use tcam_types::{GroupId, LocationMapper, Priority, RuleHandle, SlotIndex, TcamError, TcamResult};

use crate::move_list::SlotSpan;
use crate::placement::UnitMove;
use crate::slot_store::SlotStore;

#[derive(Debug, Clone, Copy)]
struct SimUnit {
    priority: Priority,
    span: SlotSpan,
}

/// Scratch placement state for one compaction attempt.
pub(crate) struct PlanSim<'a> {
    free: Vec<bool>,
    units: HashMap<RuleHandle, SimUnit>,
    /// Target group's runs: priority -> unit base -> handle.
    members: BTreeMap<Priority, BTreeMap<SlotIndex, RuleHandle>>,
    mapper: &'a dyn LocationMapper,
    block_size: usize,
    limit: usize,
    moves: Vec<UnitMove>,
    cost: (u64, u64),
}

impl<'a> PlanSim<'a> {
    pub(crate) fn build(
        store: &SlotStore,
        spans: &HashMap<RuleHandle, SlotSpan>,
        mapper: &'a dyn LocationMapper,
        block_size: usize,
        group: GroupId,
        exclude: Option<RuleHandle>,
    ) -> TcamResult<Self> {
        let limit = store.limit();
        let mut free = vec![true; limit];
        for (i, slot) in free.iter_mut().enumerate() {
            *slot = !store.is_used(i);
        }

        let mut units = HashMap::new();
        let mut members: BTreeMap<Priority, BTreeMap<SlotIndex, RuleHandle>> = BTreeMap::new();
        for (&handle, &span) in spans {
            if Some(handle) == exclude {
                continue;
            }
            let rule = store.get(span.base).ok_or_else(|| {
                TcamError::unexpected(format!("{} has span at empty slot {}", handle, span.base))
            })?;
            if rule.group != group {
                continue;
            }
            units.insert(
                handle,
                SimUnit {
                    priority: rule.priority,
                    span,
                },
            );
            members
                .entry(rule.priority)
                .or_default()
                .insert(span.base, handle);
        }

        Ok(Self {
            free,
            units,
            members,
            mapper,
            block_size,
            limit,
            moves: Vec::new(),
            cost: (0, 0),
        })
    }

    /// Accumulated plan cost: (crossing-class total, index-distance total),
    /// compared lexicographically so distance never outweighs the class.
    pub(crate) fn cost(&self) -> (u64, u64) {
        self.cost
    }

    pub(crate) fn into_moves(self) -> Vec<UnitMove> {
        self.moves
    }

    pub(crate) fn move_count(&self) -> usize {
        self.moves.len()
    }

    fn block_contained(&self, base: SlotIndex, count: usize) -> bool {
        self.block_size == 0 || base / self.block_size == (base + count - 1) / self.block_size
    }

    fn span_free(&self, base: SlotIndex, count: usize) -> bool {
        self.free[base..base + count].iter().all(|f| *f)
    }

    /// Lowest free block-contained span base within `[from, to_excl)`.
    fn find_free_span_fwd(&self, from: SlotIndex, to_excl: SlotIndex, count: usize) -> Option<SlotIndex> {
        let to_excl = to_excl.min(self.limit);
        let mut base = from;
        while base + count <= to_excl {
            if !self.block_contained(base, count) {
                base = (base / self.block_size + 1) * self.block_size;
                continue;
            }
            if self.span_free(base, count) {
                return Some(base);
            }
            base += 1;
        }
        None
    }

    /// Highest free block-contained span base with `base >= lo` and
    /// `base + count <= below_excl`.
    fn find_free_span_bwd(&self, below_excl: SlotIndex, lo: SlotIndex, count: usize) -> Option<SlotIndex> {
        let below_excl = below_excl.min(self.limit);
        if below_excl < lo + count {
            return None;
        }
        let mut base = below_excl - count;
        loop {
            if self.block_contained(base, count) && self.span_free(base, count) {
                return Some(base);
            }
            if base == lo {
                return None;
            }
            base -= 1;
        }
    }

    /// End slot (inclusive) of the last unit in a run.
    fn run_end(&self, run: &BTreeMap<SlotIndex, RuleHandle>) -> TcamResult<SlotIndex> {
        let (&base, handle) = run
            .last_key_value()
            .ok_or_else(|| TcamError::unexpected("empty priority run in plan"))?;
        Ok(base + self.unit(*handle)?.span.count - 1)
    }

    /// Allowed lower bound for units of `priority`: one past the end of the
    /// closest strictly-lower-priority run.
    fn region_lo(&self, priority: Priority) -> TcamResult<SlotIndex> {
        match self.members.range(..priority).next_back() {
            Some((_, run)) => Ok(self.run_end(run)? + 1),
            None => Ok(0),
        }
    }

    /// Allowed upper bound (exclusive) for units of `priority`: the start
    /// of the closest strictly-higher-priority run.
    fn region_hi(&self, priority: Priority) -> SlotIndex {
        use std::ops::Bound::{Excluded, Unbounded};
        self.members
            .range((Excluded(priority), Unbounded))
            .next()
            .and_then(|(_, run)| run.first_key_value().map(|(&base, _)| base))
            .unwrap_or(self.limit)
    }

    fn unit(&self, handle: RuleHandle) -> TcamResult<SimUnit> {
        self.units
            .get(&handle)
            .copied()
            .ok_or_else(|| TcamError::unexpected(format!("{} not in plan", handle)))
    }

    fn apply_move(&mut self, handle: RuleHandle, new_base: SlotIndex) -> TcamResult<()> {
        let unit = self.unit(handle)?;
        let from = unit.span;
        let to = SlotSpan::new(new_base, from.count);
        for i in from.indices() {
            self.free[i] = true;
        }
        for i in to.indices() {
            if !self.free[i] {
                return Err(TcamError::unexpected(format!(
                    "planned destination slot {} not free",
                    i
                )));
            }
            self.free[i] = false;
        }
        let run = self.members.get_mut(&unit.priority).ok_or_else(|| {
            TcamError::unexpected(format!("priority {} run missing", unit.priority))
        })?;
        run.remove(&from.base);
        run.insert(to.base, handle);
        self.units
            .get_mut(&handle)
            .ok_or_else(|| TcamError::unexpected(format!("{} not in plan", handle)))?
            .span = to;
        let (class, dist) = self.move_cost(from.base, to.base);
        self.cost.0 += class;
        self.cost.1 += dist;
        self.moves.push(UnitMove {
            handle,
            priority: unit.priority,
            from,
            to,
        });
        Ok(())
    }

    /// Relocation cost used to pick a compaction direction: staying within
    /// the block is cheapest, staying within the stage next, crossing
    /// stages worst; ties break on index distance.
    fn move_cost(&self, from: SlotIndex, to: SlotIndex) -> (u64, u64) {
        let a = self.mapper.decode(from);
        let b = self.mapper.decode(to);
        let class: u64 = if a.stage == b.stage && a.block == b.block {
            0
        } else if a.stage == b.stage {
            1
        } else {
            2
        };
        (class, from.abs_diff(to) as u64)
    }

    /// Moves `handle` strictly below its current base, cascading through
    /// lower-priority runs when its own region has no room. Returns false
    /// when no sequence of moves can open room below.
    fn displace_down(&mut self, handle: RuleHandle) -> TcamResult<bool> {
        loop {
            let unit = self.unit(handle)?;
            let lo = self.region_lo(unit.priority)?;
            if let Some(base) = self.find_free_span_bwd(unit.span.base, lo, unit.span.count) {
                self.apply_move(handle, base)?;
                return Ok(true);
            }
            let boundary = match self.members.range(..unit.priority).next_back() {
                Some((_, run)) => run
                    .last_key_value()
                    .map(|(_, h)| *h)
                    .ok_or_else(|| TcamError::unexpected("empty priority run in plan"))?,
                None => return Ok(false),
            };
            if !self.displace_down(boundary)? {
                return Ok(false);
            }
        }
    }

    /// Mirror of `displace_down`: moves `handle` strictly above its
    /// current base, cascading through higher-priority runs.
    fn displace_up(&mut self, handle: RuleHandle) -> TcamResult<bool> {
        use std::ops::Bound::{Excluded, Unbounded};
        loop {
            let unit = self.unit(handle)?;
            let hi = self.region_hi(unit.priority);
            if let Some(base) = self.find_free_span_fwd(unit.span.base + 1, hi, unit.span.count) {
                self.apply_move(handle, base)?;
                return Ok(true);
            }
            let boundary = match self.members.range((Excluded(unit.priority), Unbounded)).next() {
                Some((_, run)) => run
                    .first_key_value()
                    .map(|(_, h)| *h)
                    .ok_or_else(|| TcamError::unexpected("empty priority run in plan"))?,
                None => return Ok(false),
            };
            if !self.displace_up(boundary)? {
                return Ok(false);
            }
        }
    }

    /// Opens a `count`-slot block-contained window for `priority` by
    /// shifting rules toward lower indices. Returns the window base, with
    /// the accumulated moves left in the sim.
    pub(crate) fn open_shift_down(&mut self, priority: Priority, count: usize) -> TcamResult<Option<SlotIndex>> {
        loop {
            let lo = self.region_lo(priority)?;
            let hi = self.region_hi(priority);
            if let Some(base) = self.find_free_span_bwd(hi, lo, count) {
                return Ok(Some(base));
            }
            let pick = self
                .members
                .get(&priority)
                .and_then(|run| run.last_key_value().map(|(_, h)| *h))
                .or_else(|| {
                    self.members
                        .range(..priority)
                        .next_back()
                        .and_then(|(_, run)| run.last_key_value().map(|(_, h)| *h))
                });
            let Some(handle) = pick else {
                return Ok(None);
            };
            if !self.displace_down(handle)? {
                return Ok(None);
            }
        }
    }

    /// Opens a window by shifting rules toward higher indices.
    pub(crate) fn open_shift_up(&mut self, priority: Priority, count: usize) -> TcamResult<Option<SlotIndex>> {
        use std::ops::Bound::{Excluded, Unbounded};
        loop {
            let lo = self.region_lo(priority)?;
            let hi = self.region_hi(priority);
            if let Some(base) = self.find_free_span_fwd(lo, hi, count) {
                return Ok(Some(base));
            }
            let pick = self
                .members
                .get(&priority)
                .and_then(|run| run.first_key_value().map(|(_, h)| *h))
                .or_else(|| {
                    self.members
                        .range((Excluded(priority), Unbounded))
                        .next()
                        .and_then(|(_, run)| run.first_key_value().map(|(_, h)| *h))
                });
            let Some(handle) = pick else {
                return Ok(None);
            };
            if !self.displace_up(handle)? {
                return Ok(None);
            }
        }
    }
}
