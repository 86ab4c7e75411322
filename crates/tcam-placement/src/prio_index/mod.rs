//! Per-group priority index.
//!
//! For every group this tracks, per priority value, the contiguous span of
//! slot indices currently holding that priority, plus the set of occupied
//! indices in the group. Smaller priority values rank first and occupy
//! smaller indices, so the ascending order of the priority map is also the
//! physical slot order. Insertion-point and neighbor queries are O(log n).

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

use serde::{Deserialize, Serialize};
use tcam_types::{GroupId, Priority, SlotIndex, TcamError, TcamResult};

/// Inclusive slot-index span of one priority's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioRange {
    pub start: SlotIndex,
    pub end: SlotIndex,
}

/// Index state of a single group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupIndex {
    runs: BTreeMap<Priority, PrioRange>,
    occupied: BTreeMap<SlotIndex, Priority>,
}

impl GroupIndex {
    pub fn runs(&self) -> &BTreeMap<Priority, PrioRange> {
        &self.runs
    }

    pub fn occupied(&self) -> &BTreeMap<SlotIndex, Priority> {
        &self.occupied
    }
}

/// Priority index over all groups sharing one partition.
///
/// A group's index is created on first insertion and destroyed when its
/// last slot is removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrioIndex {
    groups: HashMap<GroupId, GroupIndex>,
}

impl PrioIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, group: GroupId) -> Option<&GroupIndex> {
        self.groups.get(&group)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of occupied slots in one group.
    pub fn occupied_count(&self, group: GroupId) -> usize {
        self.groups.get(&group).map_or(0, |g| g.occupied.len())
    }

    /// Priority of the rule occupying `index` in `group`, if any.
    pub fn priority_at(&self, group: GroupId, index: SlotIndex) -> Option<Priority> {
        self.groups.get(&group)?.occupied.get(&index).copied()
    }

    /// Records that `index` now holds a rule of `priority`, growing or
    /// creating the priority's run.
    pub fn insert(&mut self, group: GroupId, priority: Priority, index: SlotIndex) -> TcamResult<()> {
        let g = self.groups.entry(group).or_default();
        if g.occupied.insert(index, priority).is_some() {
            return Err(TcamError::unexpected(format!(
                "group {} index {} double-inserted",
                group, index
            )));
        }
        match g.runs.entry(priority) {
            Entry::Vacant(e) => {
                e.insert(PrioRange {
                    start: index,
                    end: index,
                });
            }
            Entry::Occupied(mut e) => {
                let run = e.get_mut();
                run.start = run.start.min(index);
                run.end = run.end.max(index);
            }
        }
        Ok(())
    }

    /// Records that `index` no longer holds a rule of `priority`,
    /// shrinking the run or destroying it with its group when empty.
    ///
    /// Removal order is arbitrary (warm-restart replay does not mirror
    /// insertion order), so a boundary removal recomputes the surviving
    /// boundary by scanning the occupied set inside the old span.
    pub fn remove(&mut self, group: GroupId, priority: Priority, index: SlotIndex) -> TcamResult<()> {
        let g = self
            .groups
            .get_mut(&group)
            .ok_or_else(|| TcamError::unexpected(format!("group {} not indexed", group)))?;
        match g.occupied.remove(&index) {
            Some(p) if p == priority => {}
            Some(p) => {
                // Put it back before failing; the caller's view was wrong.
                g.occupied.insert(index, p);
                return Err(TcamError::unexpected(format!(
                    "group {} index {} holds priority {}, not {}",
                    group, index, p, priority
                )));
            }
            None => {
                return Err(TcamError::unexpected(format!(
                    "group {} index {} not occupied",
                    group, index
                )));
            }
        }
        let run = *g.runs.get(&priority).ok_or_else(|| {
            TcamError::unexpected(format!("group {} priority {} has no run", group, priority))
        })?;

        let survivor = |g: &GroupIndex, range: (SlotIndex, SlotIndex), from_start: bool| {
            let iter = g
                .occupied
                .range(range.0..=range.1)
                .filter(|(_, p)| **p == priority);
            if from_start {
                iter.clone().next().map(|(i, _)| *i)
            } else {
                iter.last().map(|(i, _)| *i)
            }
        };

        if run.start == index && run.end == index {
            g.runs.remove(&priority);
            if g.occupied.is_empty() {
                self.groups.remove(&group);
            }
        } else if run.start == index {
            let new_start = survivor(g, (index + 1, run.end), true).ok_or_else(|| {
                TcamError::unexpected(format!(
                    "group {} priority {} run has no occupant above {}",
                    group, priority, index
                ))
            })?;
            g.runs
                .get_mut(&priority)
                .ok_or_else(|| {
                    TcamError::unexpected(format!(
                        "group {} priority {} has no run",
                        group, priority
                    ))
                })?
                .start = new_start;
        } else if run.end == index {
            let new_end = survivor(g, (run.start, index - 1), false).ok_or_else(|| {
                TcamError::unexpected(format!(
                    "group {} priority {} run has no occupant below {}",
                    group, priority, index
                ))
            })?;
            g.runs
                .get_mut(&priority)
                .ok_or_else(|| {
                    TcamError::unexpected(format!(
                        "group {} priority {} has no run",
                        group, priority
                    ))
                })?
                .end = new_end;
        }
        Ok(())
    }

    /// Slot span currently holding `priority` in `group`.
    pub fn range_of(&self, group: GroupId, priority: Priority) -> Option<PrioRange> {
        self.groups.get(&group)?.runs.get(&priority).copied()
    }

    /// End slot of the closest priority ranked strictly before `priority`,
    /// or `None` at the group's low extreme.
    pub fn prev_priority_end(&self, group: GroupId, priority: Priority) -> Option<SlotIndex> {
        let g = self.groups.get(&group)?;
        g.runs.range(..priority).next_back().map(|(_, r)| r.end)
    }

    /// Start slot of the closest priority ranked strictly after
    /// `priority`, or `None` at the group's high extreme.
    pub fn next_priority_start(&self, group: GroupId, priority: Priority) -> Option<SlotIndex> {
        let g = self.groups.get(&group)?;
        g.runs
            .range((Excluded(priority), Unbounded))
            .next()
            .map(|(_, r)| r.start)
    }

    /// Total occupied slots across all groups.
    pub fn total_occupied(&self) -> usize {
        self.groups.values().map(|g| g.occupied.len()).sum()
    }
}
