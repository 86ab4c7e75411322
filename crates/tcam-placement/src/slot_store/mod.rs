//! Fixed-capacity slot array with a used/free bitmap.
//!
//! One `SlotStore` backs one partition of one pipe instance. Slots hold at
//! most one [`Rule`] each; a word-packed bitmap mirrors occupancy so free
//! and used queries are O(1) per slot. Free-slot searches respect hardware
//! block boundaries: a run of slots never crosses a multiple of the block
//! size.

use crate::rule::Rule;
use tcam_types::{SlotIndex, TcamError, TcamResult};

/// Fixed array of optional rule slots plus its occupancy bitmap.
///
/// When the owning table reserves a direct default slot, the last slot is
/// excluded from every search (`limit() == total_slots() - 1`) and is only
/// written through the default-rule path.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStore {
    slots: Vec<Option<Rule>>,
    used: Vec<u64>,
    used_count: usize,
    limit: usize,
}

impl SlotStore {
    /// Creates an empty store. `reserve_tail` excludes the last slot from
    /// placement searches for use as the direct default slot.
    pub fn new(total_slots: usize, reserve_tail: bool) -> Self {
        let limit = if reserve_tail {
            total_slots.saturating_sub(1)
        } else {
            total_slots
        };
        Self {
            slots: vec![None; total_slots],
            used: vec![0; total_slots.div_ceil(64)],
            used_count: 0,
            limit,
        }
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    /// Upper bound (exclusive) of the placement-searchable index range.
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn used_count(&self) -> usize {
        self.used_count
    }

    pub fn is_used(&self, index: SlotIndex) -> bool {
        index < self.slots.len() && self.used[index / 64] & (1u64 << (index % 64)) != 0
    }

    pub fn get(&self, index: SlotIndex) -> Option<&Rule> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, index: SlotIndex) -> Option<&mut Rule> {
        self.slots.get_mut(index).and_then(|s| s.as_mut())
    }

    /// Marks a free slot used. Redundant calls are a programming error.
    pub fn mark_used(&mut self, index: SlotIndex) -> TcamResult<()> {
        if index >= self.slots.len() {
            return Err(TcamError::invalid(format!("slot {} out of range", index)));
        }
        if self.is_used(index) {
            return Err(TcamError::unexpected(format!(
                "slot {} already marked used",
                index
            )));
        }
        self.used[index / 64] |= 1u64 << (index % 64);
        self.used_count += 1;
        Ok(())
    }

    /// Marks a used slot free. Redundant calls are a programming error.
    pub fn mark_free(&mut self, index: SlotIndex) -> TcamResult<()> {
        if index >= self.slots.len() {
            return Err(TcamError::invalid(format!("slot {} out of range", index)));
        }
        if !self.is_used(index) {
            return Err(TcamError::unexpected(format!(
                "slot {} already marked free",
                index
            )));
        }
        self.used[index / 64] &= !(1u64 << (index % 64));
        self.used_count -= 1;
        Ok(())
    }

    /// Installs a rule into an empty slot, updating the bitmap.
    pub fn set(&mut self, index: SlotIndex, rule: Rule) -> TcamResult<()> {
        self.mark_used(index)?;
        self.slots[index] = Some(rule);
        Ok(())
    }

    /// Removes and returns the rule at a used slot, updating the bitmap.
    pub fn take(&mut self, index: SlotIndex) -> TcamResult<Rule> {
        self.mark_free(index)?;
        self.slots[index]
            .take()
            .ok_or_else(|| TcamError::unexpected(format!("used slot {} holds no rule", index)))
    }

    fn span_free(&self, base: SlotIndex, count: usize) -> bool {
        (base..base + count).all(|i| !self.is_used(i))
    }

    fn block_contained(base: SlotIndex, count: usize, block_size: usize) -> bool {
        block_size == 0 || base / block_size == (base + count - 1) / block_size
    }

    /// Finds the lowest base index `>= from` of `count` contiguous free
    /// slots that do not cross a block boundary, within the searchable
    /// range. Returns `None` when no such run exists.
    pub fn find_next_free(
        &self,
        from: SlotIndex,
        count: usize,
        block_size: usize,
    ) -> Option<SlotIndex> {
        if count == 0 || count > self.limit {
            return None;
        }
        let mut base = from;
        while base + count <= self.limit {
            if !Self::block_contained(base, count, block_size) {
                // Jump to the next block boundary.
                base = (base / block_size + 1) * block_size;
                continue;
            }
            if self.span_free(base, count) {
                return Some(base);
            }
            base += 1;
        }
        None
    }

    /// Finds the highest base index of `count` contiguous free,
    /// block-contained slots ending at or before `before` (exclusive).
    pub fn find_prev_free(
        &self,
        before: SlotIndex,
        count: usize,
        block_size: usize,
    ) -> Option<SlotIndex> {
        if count == 0 {
            return None;
        }
        let before = before.min(self.limit);
        if count > before {
            return None;
        }
        let mut base = before - count;
        loop {
            if Self::block_contained(base, count, block_size) && self.span_free(base, count) {
                return Some(base);
            }
            if base == 0 {
                return None;
            }
            base -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tcam_types::{ActionRef, RuleHandle, RulePayload};

    fn rule(handle: u64) -> Rule {
        Rule {
            handle: RuleHandle::from_raw(handle),
            group: 0,
            priority: 10,
            subentry: 0,
            payload: Arc::new(RulePayload::default()),
            action: ActionRef::default(),
            ttl: 0,
        }
    }

    #[test]
    fn test_set_take_round_trip() {
        let mut store = SlotStore::new(8, false);
        store.set(3, rule(1)).unwrap();
        assert!(store.is_used(3));
        assert_eq!(store.used_count(), 1);

        let r = store.take(3).unwrap();
        assert_eq!(r.handle, RuleHandle::from_raw(1));
        assert!(!store.is_used(3));
        assert_eq!(store.used_count(), 0);
    }

    #[test]
    fn test_redundant_toggle_is_error() {
        let mut store = SlotStore::new(8, false);
        store.mark_used(0).unwrap();
        assert!(store.mark_used(0).is_err());
        store.mark_free(0).unwrap();
        assert!(store.mark_free(0).is_err());
    }

    #[test]
    fn test_find_next_free_respects_blocks() {
        let mut store = SlotStore::new(16, false);
        // Occupy 5..8 so that a 4-wide run starting in block 0 cannot fit.
        for i in 5..8 {
            store.mark_used(i).unwrap();
        }
        // A 4-slot run must not straddle index 8 (block boundary).
        assert_eq!(store.find_next_free(0, 4, 8), Some(0));
        assert_eq!(store.find_next_free(2, 4, 8), Some(8));
    }

    #[test]
    fn test_find_prev_free() {
        let mut store = SlotStore::new(8, false);
        store.mark_used(6).unwrap();
        store.mark_used(7).unwrap();
        assert_eq!(store.find_prev_free(8, 2, 8), Some(4));
        assert_eq!(store.find_prev_free(2, 2, 8), Some(0));
        store.mark_used(0).unwrap();
        assert_eq!(store.find_prev_free(2, 2, 8), None);
    }

    #[test]
    fn test_reserved_tail_excluded_from_search() {
        let store = SlotStore::new(8, true);
        assert_eq!(store.limit(), 7);
        assert_eq!(store.find_next_free(0, 8, 8), None);
        assert_eq!(store.find_next_free(7, 1, 8), None);
        assert_eq!(store.find_next_free(6, 1, 8), Some(6));
    }

    #[test]
    fn test_no_space() {
        let mut store = SlotStore::new(4, false);
        for i in 0..4 {
            store.mark_used(i).unwrap();
        }
        assert_eq!(store.find_next_free(0, 1, 4), None);
        assert_eq!(store.find_prev_free(4, 1, 4), None);
    }
}
