//! Move records handed to the hardware-apply layer.
//!
//! Every lifecycle operation appends one or more [`MoveNode`]s: relocations
//! first (in an order that guarantees each destination is free before it is
//! written), then the node for the operation itself. Nodes are emitted
//! strictly in call order across operations; the apply layer and the
//! warm-restart replay both consume them front to back.
//!
//! The list is `serde`-serializable so the external persisted-state
//! serializer can snapshot it across restarts; replaying a snapshot
//! reproduces identical in-memory state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tcam_types::{ActionRef, GroupId, PipeId, Priority, RuleHandle, RulePayload, SlotIndex};

/// Contiguous span of physical slots: `base, base + 1, .., base + count - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpan {
    pub base: SlotIndex,
    pub count: usize,
}

impl SlotSpan {
    pub fn new(base: SlotIndex, count: usize) -> Self {
        Self { base, count }
    }

    pub fn single(base: SlotIndex) -> Self {
        Self { base, count: 1 }
    }

    /// Exclusive end index.
    pub fn end(&self) -> SlotIndex {
        self.base + self.count
    }

    pub fn contains(&self, index: SlotIndex) -> bool {
        index >= self.base && index < self.end()
    }

    pub fn overlaps(&self, other: &SlotSpan) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    pub fn indices(&self) -> impl Iterator<Item = SlotIndex> {
        self.base..self.end()
    }
}

/// Operation kind of one move record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveOp {
    /// New rule written into its resolved slot(s).
    Allocate,
    /// Existing rule relocated during compaction or atomic modify.
    Move,
    /// Rule removed, slot(s) freed.
    Delete,
    /// Payload/action of an existing rule replaced.
    Modify,
    /// Default rule installed.
    SetDefault,
    /// Default rule removed.
    ClearDefault,
}

/// One record consumable by the hardware-apply layer.
///
/// Range rules carry their slots as span lists; single-slot rules use one
/// span of count 1. `SetDefault`/`ClearDefault` for the indirect variant
/// carry empty span lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveNode {
    pub op: MoveOp,
    pub handle: RuleHandle,
    pub pipe: PipeId,
    pub partition: u32,
    pub group: GroupId,
    pub priority: Priority,
    pub old_spans: Vec<SlotSpan>,
    pub new_spans: Vec<SlotSpan>,
    pub payload: Option<Arc<RulePayload>>,
    pub action: ActionRef,
    pub ttl: u32,
}

impl MoveNode {
    #[allow(clippy::too_many_arguments)]
    pub fn allocate(
        handle: RuleHandle,
        pipe: PipeId,
        partition: u32,
        group: GroupId,
        priority: Priority,
        span: SlotSpan,
        payload: Arc<RulePayload>,
        action: ActionRef,
        ttl: u32,
    ) -> Self {
        Self {
            op: MoveOp::Allocate,
            handle,
            pipe,
            partition,
            group,
            priority,
            old_spans: Vec::new(),
            new_spans: vec![span],
            payload: Some(payload),
            action,
            ttl,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn relocate(
        handle: RuleHandle,
        pipe: PipeId,
        partition: u32,
        group: GroupId,
        priority: Priority,
        from: SlotSpan,
        to: SlotSpan,
    ) -> Self {
        Self {
            op: MoveOp::Move,
            handle,
            pipe,
            partition,
            group,
            priority,
            old_spans: vec![from],
            new_spans: vec![to],
            payload: None,
            action: ActionRef::default(),
            ttl: 0,
        }
    }
}

/// Ordered list of move records for one or more operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveList {
    nodes: Vec<MoveNode>,
}

impl MoveList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: MoveNode) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MoveNode> {
        self.nodes.iter()
    }

    pub fn nodes(&self) -> &[MoveNode] {
        &self.nodes
    }

    /// Drops every node from `mark` onward; used when a session aborts.
    pub fn truncate(&mut self, mark: usize) {
        self.nodes.truncate(mark);
    }

    /// Splits off and returns every node from `mark` onward.
    pub fn drain_from(&mut self, mark: usize) -> MoveList {
        MoveList {
            nodes: self.nodes.split_off(mark),
        }
    }
}

impl IntoIterator for MoveList {
    type Item = MoveNode;
    type IntoIter = std::vec::IntoIter<MoveNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_span_geometry() {
        let span = SlotSpan::new(4, 3);
        assert_eq!(span.end(), 7);
        assert!(span.contains(4) && span.contains(6) && !span.contains(7));
        assert!(span.overlaps(&SlotSpan::new(6, 2)));
        assert!(!span.overlaps(&SlotSpan::new(7, 2)));
        assert_eq!(span.indices().collect::<Vec<_>>(), vec![4, 5, 6]);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut list = MoveList::new();
        list.push(MoveNode::relocate(
            RuleHandle::from_raw(9),
            PipeId::All,
            0,
            1,
            50,
            SlotSpan::single(2),
            SlotSpan::single(6),
        ));
        list.push(MoveNode::allocate(
            RuleHandle::from_raw(10),
            PipeId::Pipe(1),
            0,
            1,
            40,
            SlotSpan::new(2, 2),
            Arc::new(RulePayload::for_partition(0)),
            ActionRef::default(),
            30,
        ));

        let json = serde_json::to_string(&list).unwrap();
        let back: MoveList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }

    #[test]
    fn test_drain_from() {
        let mut list = MoveList::new();
        for i in 0..4 {
            list.push(MoveNode::relocate(
                RuleHandle::from_raw(i),
                PipeId::All,
                0,
                0,
                10,
                SlotSpan::single(i as usize),
                SlotSpan::single(i as usize + 4),
            ));
        }
        let tail = list.drain_from(3);
        assert_eq!(list.len(), 3);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail.nodes()[0].handle, RuleHandle::from_raw(3));
    }
}
