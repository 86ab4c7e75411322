//! Rule records stored in slots.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tcam_types::{ActionRef, GroupId, Priority, RuleHandle, RulePayload};

/// One slot's view of a rule.
///
/// A single-slot rule occupies one slot with `subentry == 0`. A range rule
/// occupies several contiguous slots in one block; each sibling slot holds
/// a record with the same handle and an ascending `subentry`, and all
/// siblings share the payload. The handle stays stable when compaction
/// moves the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub handle: RuleHandle,
    pub group: GroupId,
    pub priority: Priority,
    /// Position of this slot within the rule's expansion; 0 for singles.
    pub subentry: u8,
    pub payload: Arc<RulePayload>,
    pub action: ActionRef,
    /// Remaining time-to-live reported by the aging collaborator; carried
    /// through moves and backup, never interpreted here.
    pub ttl: u32,
}

/// Physical placement variant of the table's default rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultRuleKind {
    /// Occupies the reserved last slot of partition 0.
    Direct,
    /// Programmed through a side register; owns no slot.
    Indirect,
}

/// Per-pipe-instance default rule. Singleton; matched only when no
/// priority-ordered rule hits, so it never participates in placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultRule {
    pub kind: DefaultRuleKind,
    pub handle: RuleHandle,
    pub payload: Arc<RulePayload>,
    pub action: ActionRef,
}
