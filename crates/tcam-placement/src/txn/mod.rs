//! Session transaction backup.
//!
//! A session wraps a batch of lifecycle operations on one table. While a
//! session is active, the first write to any slot captures that slot's
//! pre-session content (a deep copy of the rule, or an explicit "was
//! empty" marker) into the shadow store; later writes to the same slot are
//! no-ops. Abort restores every shadowed slot and rebuilds the priority
//! index from the restored contents; commit discards the shadow without
//! touching live state.
//!
//! Group/priority metadata is deliberately not snapshotted: it is
//! reconstructed from slots on abort, which keeps the shadow write-once and
//! the bitmap/index consistency invariant intact.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tcam_types::SlotIndex;

use crate::rule::{DefaultRule, Rule};

/// Session state machine per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Committed,
    Aborted,
}

/// Addresses one slot across the table's pipe instances and partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub pipe: u32,
    pub partition: u32,
    pub index: SlotIndex,
}

/// Lazily populated backup of the slots a session has touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowStore {
    slots: HashMap<SlotKey, Option<Rule>>,
    defaults: HashMap<u32, Option<DefaultRule>>,
    /// Length of the table's move list when the session began; everything
    /// after it is dropped on abort.
    moves_mark: usize,
}

impl ShadowStore {
    pub fn new(moves_mark: usize) -> Self {
        Self {
            slots: HashMap::new(),
            defaults: HashMap::new(),
            moves_mark,
        }
    }

    pub fn moves_mark(&self) -> usize {
        self.moves_mark
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.defaults.is_empty()
    }

    /// Captures a slot's pre-session content. Write-once: only the first
    /// capture per slot per session is kept.
    pub fn capture_slot(&mut self, key: SlotKey, current: Option<&Rule>) {
        self.slots.entry(key).or_insert_with(|| current.cloned());
    }

    /// Captures a pipe instance's default rule, write-once.
    pub fn capture_default(&mut self, pipe: u32, current: Option<&DefaultRule>) {
        self.defaults.entry(pipe).or_insert_with(|| current.cloned());
    }

    pub fn slot(&self, key: &SlotKey) -> Option<&Option<Rule>> {
        self.slots.get(key)
    }

    pub fn slots(&self) -> impl Iterator<Item = (&SlotKey, &Option<Rule>)> {
        self.slots.iter()
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&u32, &Option<DefaultRule>)> {
        self.defaults.iter()
    }
}
