//! One partition: slot store, priority index, and handle-to-span map.

use std::collections::HashMap;
use std::sync::Arc;

use tcam_types::{
    ActionRef, GroupId, Priority, RuleHandle, RulePayload, SlotIndex, TcamError, TcamResult,
};

use crate::move_list::SlotSpan;
use crate::prio_index::PrioIndex;
use crate::rule::Rule;
use crate::slot_store::SlotStore;

/// Slot store plus the indexes that must stay consistent with it.
///
/// All mutations go through [`Partition::install`], [`Partition::remove`],
/// and [`Partition::relocate`], which update the store, the priority index,
/// and the span map together.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    store: SlotStore,
    index: PrioIndex,
    spans: HashMap<RuleHandle, SlotSpan>,
}

impl Partition {
    pub fn new(total_slots: usize, reserve_tail: bool) -> Self {
        Self {
            store: SlotStore::new(total_slots, reserve_tail),
            index: PrioIndex::new(),
            spans: HashMap::new(),
        }
    }

    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    pub fn index(&self) -> &PrioIndex {
        &self.index
    }

    pub fn spans(&self) -> &HashMap<RuleHandle, SlotSpan> {
        &self.spans
    }

    pub fn span_of(&self, handle: RuleHandle) -> Option<SlotSpan> {
        self.spans.get(&handle).copied()
    }

    pub fn rule_at(&self, index: SlotIndex) -> Option<&Rule> {
        self.store.get(index)
    }

    pub fn usage(&self) -> usize {
        self.store.used_count()
    }

    /// Writes a rule into a free span and indexes it.
    #[allow(clippy::too_many_arguments)]
    pub fn install(
        &mut self,
        handle: RuleHandle,
        group: GroupId,
        priority: Priority,
        span: SlotSpan,
        payload: Arc<RulePayload>,
        action: ActionRef,
        ttl: u32,
    ) -> TcamResult<()> {
        if self.spans.contains_key(&handle) {
            return Err(TcamError::invalid(format!("{} already placed", handle)));
        }
        for (k, i) in span.indices().enumerate() {
            self.store.set(
                i,
                Rule {
                    handle,
                    group,
                    priority,
                    subentry: k as u8,
                    payload: Arc::clone(&payload),
                    action,
                    ttl,
                },
            )?;
            self.index.insert(group, priority, i)?;
        }
        self.spans.insert(handle, span);
        Ok(())
    }

    /// Removes a rule, freeing all its sibling slots. Returns the vacated
    /// span and the base-slot record for the caller's move record.
    pub fn remove(&mut self, handle: RuleHandle) -> TcamResult<(SlotSpan, Rule)> {
        let span = self
            .spans
            .remove(&handle)
            .ok_or_else(|| TcamError::invalid(format!("unknown {}", handle)))?;
        let mut base_rule = None;
        for i in span.indices() {
            let rule = self.store.take(i)?;
            if rule.handle != handle {
                return Err(TcamError::unexpected(format!(
                    "slot {} holds {}, expected sibling of {}",
                    i, rule.handle, handle
                )));
            }
            self.index.remove(rule.group, rule.priority, i)?;
            if base_rule.is_none() {
                base_rule = Some(rule);
            }
        }
        let rule = base_rule
            .ok_or_else(|| TcamError::unexpected(format!("{} had an empty span", handle)))?;
        Ok((span, rule))
    }

    /// Moves a rule to a new span whose slots are free. Subentry order is
    /// preserved across the move.
    pub fn relocate(&mut self, handle: RuleHandle, to: SlotSpan) -> TcamResult<SlotSpan> {
        let from = self
            .spans
            .get(&handle)
            .copied()
            .ok_or_else(|| TcamError::invalid(format!("unknown {}", handle)))?;
        if from.count != to.count {
            return Err(TcamError::unexpected(format!(
                "{} resized from {} to {} slots in a move",
                handle, from.count, to.count
            )));
        }
        let mut rules = Vec::with_capacity(from.count);
        for i in from.indices() {
            let rule = self.store.take(i)?;
            self.index.remove(rule.group, rule.priority, i)?;
            rules.push(rule);
        }
        for (rule, i) in rules.into_iter().zip(to.indices()) {
            self.index.insert(rule.group, rule.priority, i)?;
            self.store.set(i, rule)?;
        }
        self.spans.insert(handle, to);
        Ok(from)
    }

    /// Rewrites payload/action/ttl of a rule in place.
    pub fn rewrite(
        &mut self,
        handle: RuleHandle,
        payload: Arc<RulePayload>,
        action: ActionRef,
        ttl: u32,
    ) -> TcamResult<SlotSpan> {
        let span = self
            .spans
            .get(&handle)
            .copied()
            .ok_or_else(|| TcamError::invalid(format!("unknown {}", handle)))?;
        for i in span.indices() {
            let rule = self
                .store
                .get_mut(i)
                .ok_or_else(|| TcamError::unexpected(format!("slot {} empty mid-span", i)))?;
            rule.payload = Arc::clone(&payload);
            rule.action = action;
            rule.ttl = ttl;
        }
        Ok(span)
    }

    pub(crate) fn store_mut(&mut self) -> &mut SlotStore {
        &mut self.store
    }

    pub(crate) fn index_mut(&mut self) -> &mut PrioIndex {
        &mut self.index
    }

    pub(crate) fn spans_mut(&mut self) -> &mut HashMap<RuleHandle, SlotSpan> {
        &mut self.spans
    }

    /// Verifies the partition invariants: bitmap/index agreement, slot
    /// exclusivity, per-group priority ordering, and block containment of
    /// every span.
    pub fn check_consistency(&self, block_size: usize) -> TcamResult<()> {
        // Slots vs. bitmap vs. priority index.
        let mut span_slots = 0usize;
        for (handle, span) in &self.spans {
            span_slots += span.count;
            if block_size > 0 && span.base / block_size != (span.end() - 1) / block_size {
                return Err(TcamError::unexpected(format!(
                    "{} span {:?} crosses a block boundary",
                    handle, span
                )));
            }
            for (k, i) in span.indices().enumerate() {
                let rule = self.store.get(i).ok_or_else(|| {
                    TcamError::unexpected(format!("{} span slot {} is empty", handle, i))
                })?;
                if rule.handle != *handle || rule.subentry as usize != k {
                    return Err(TcamError::unexpected(format!(
                        "slot {} does not hold subentry {} of {}",
                        i, k, handle
                    )));
                }
                if self.index.priority_at(rule.group, i) != Some(rule.priority) {
                    return Err(TcamError::unexpected(format!(
                        "index and slot {} disagree on priority",
                        i
                    )));
                }
            }
        }
        let indexed: usize = self.index.total_occupied();
        let used = self
            .store
            .used_count()
            .saturating_sub(usize::from(self.default_slot_used()));
        if span_slots != used || indexed != used {
            return Err(TcamError::unexpected(format!(
                "occupancy disagreement: spans {} indexed {} bitmap {}",
                span_slots, indexed, used
            )));
        }

        // Priority ordering within each group: runs of ascending priority
        // must occupy strictly ascending, non-overlapping index ranges.
        for group in self.groups() {
            let g = self
                .index
                .group(group)
                .ok_or_else(|| TcamError::unexpected(format!("group {} not indexed", group)))?;
            let mut prev_end: Option<SlotIndex> = None;
            for (priority, run) in g.runs() {
                if run.start > run.end {
                    return Err(TcamError::unexpected(format!(
                        "group {} priority {} has inverted run",
                        group, priority
                    )));
                }
                if let Some(pe) = prev_end {
                    if run.start <= pe {
                        return Err(TcamError::unexpected(format!(
                            "group {} priority {} run starts at {} inside the previous run",
                            group, priority, run.start
                        )));
                    }
                }
                prev_end = Some(run.end);
            }
        }
        Ok(())
    }

    fn default_slot_used(&self) -> bool {
        let last = self.store.total_slots();
        last > self.store.limit() && self.store.is_used(last - 1)
    }

    fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self
            .spans
            .values()
            .filter_map(|span| self.store.get(span.base))
            .map(|rule| rule.group)
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    /// Writes the direct default rule into the reserved tail slot.
    pub(crate) fn set_default_slot(&mut self, rule: Rule) -> TcamResult<SlotIndex> {
        let total = self.store.total_slots();
        if total == 0 || self.store.limit() == total {
            return Err(TcamError::invalid("table reserves no default slot"));
        }
        let index = total - 1;
        self.store.set(index, rule)?;
        Ok(index)
    }

    /// Clears the reserved tail slot.
    pub(crate) fn clear_default_slot(&mut self) -> TcamResult<SlotIndex> {
        let total = self.store.total_slots();
        if total == 0 || self.store.limit() == total {
            return Err(TcamError::invalid("table reserves no default slot"));
        }
        let index = total - 1;
        self.store.take(index)?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tcam_types::RulePayload;

    fn payload() -> Arc<RulePayload> {
        Arc::new(RulePayload::default())
    }

    fn h(raw: u64) -> RuleHandle {
        RuleHandle::from_raw(raw)
    }

    #[test]
    fn test_install_remove_round_trip() {
        let mut part = Partition::new(8, false);
        part.install(h(1), 0, 10, SlotSpan::new(2, 3), payload(), ActionRef::default(), 0)
            .unwrap();
        assert_eq!(part.usage(), 3);
        assert_eq!(part.span_of(h(1)), Some(SlotSpan::new(2, 3)));
        assert_eq!(part.rule_at(3).unwrap().subentry, 1);
        part.check_consistency(8).unwrap();

        let (span, rule) = part.remove(h(1)).unwrap();
        assert_eq!(span, SlotSpan::new(2, 3));
        assert_eq!(rule.handle, h(1));
        assert_eq!(part.usage(), 0);
        assert!(part.index().is_empty());
    }

    #[test]
    fn test_relocate_preserves_subentry_order() {
        let mut part = Partition::new(16, false);
        part.install(h(1), 0, 10, SlotSpan::new(0, 3), payload(), ActionRef::default(), 0)
            .unwrap();
        part.relocate(h(1), SlotSpan::new(8, 3)).unwrap();
        for (k, i) in (8..11).enumerate() {
            assert_eq!(part.rule_at(i).unwrap().subentry, k as u8);
        }
        assert!(part.rule_at(0).is_none());
        part.check_consistency(8).unwrap();
    }

    #[test]
    fn test_double_install_rejected() {
        let mut part = Partition::new(8, false);
        part.install(h(1), 0, 10, SlotSpan::single(0), payload(), ActionRef::default(), 0)
            .unwrap();
        let err = part
            .install(h(1), 0, 20, SlotSpan::single(1), payload(), ActionRef::default(), 0)
            .unwrap_err();
        assert!(matches!(err, TcamError::InvalidArgument(_)));
    }

    #[test]
    fn test_rewrite_in_place() {
        let mut part = Partition::new(8, false);
        part.install(h(1), 0, 10, SlotSpan::single(4), payload(), ActionRef::default(), 5)
            .unwrap();
        let new_payload = Arc::new(RulePayload {
            action_data: vec![0xAB],
            ..Default::default()
        });
        part.rewrite(h(1), new_payload, ActionRef::default(), 9).unwrap();
        let rule = part.rule_at(4).unwrap();
        assert_eq!(rule.payload.action_data, vec![0xAB]);
        assert_eq!(rule.ttl, 9);
    }
}
