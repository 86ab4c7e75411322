//! End-to-end tests for the placement engine public API.
//!
//! These tests drive whole tables through add/delete/modify/session
//! sequences and verify the ordering, exclusivity, and recovery guarantees
//! the engine makes to the hardware-apply layer.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tcam_placement::{
    replay, MatchKind, MoveOp, Planner, SlotSpan, TableConfig, TableRegistry, TcamTable,
};
use tcam_types::{
    ActionRef, FixedWidthExpander, LinearLocationMapper, PipeId, Priority, RuleHandle,
    RulePayload, TableId, TcamError,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_config(name: &str) -> TableConfig {
    TableConfig::new(name)
        .with_partition_slots(8)
        .with_block_size(8)
        .with_placement_buffer(0)
}

fn small_table(name: &str) -> TcamTable {
    TcamTable::new(
        TableId::from_raw(0),
        small_config(name),
        Arc::new(LinearLocationMapper::new(8, 8)),
        Arc::new(tcam_types::SingleSlotExpander),
    )
    .unwrap()
}

fn h(raw: u64) -> RuleHandle {
    RuleHandle::from_raw(raw)
}

fn payload() -> Arc<RulePayload> {
    Arc::new(RulePayload::default())
}

fn add(table: &mut TcamTable, handle: u64, priority: Priority) {
    table
        .add(
            PipeId::All,
            h(handle),
            0,
            priority,
            payload(),
            ActionRef::default(),
            0,
        )
        .unwrap();
}

/// Collects (slot, priority) pairs of group 0 in slot order.
fn slot_priorities(table: &TcamTable) -> Vec<(usize, Priority)> {
    let part = table.partition(PipeId::All, 0).unwrap();
    (0..part.store().limit())
        .filter_map(|i| part.rule_at(i).map(|r| (i, r.priority)))
        .collect()
}

#[test]
fn test_priority_order_after_interleaved_adds() {
    init();
    // Priorities [10, 20, 10, 5]: 5 must land before both 10s, the 10s
    // before 20, and four slots end up occupied.
    let mut table = small_table("order");
    add(&mut table, 1, 10);
    add(&mut table, 2, 20);
    add(&mut table, 3, 10);
    add(&mut table, 4, 5);

    let placed = slot_priorities(&table);
    assert_eq!(placed.len(), 4);
    let priorities: Vec<Priority> = placed.iter().map(|&(_, p)| p).collect();
    assert_eq!(priorities, vec![5, 10, 10, 20]);
    table.check_consistency().unwrap();
}

#[test]
fn test_range_rule_direct_fit() {
    init();
    // Slots 2..=4 hold singles ranked before the new rule; 5..=7 are free
    // and take the 3-slot range rule without any relocation.
    let mut table = small_table("range_direct");
    // Occupy 0..=4 so the singles sit exactly at 2, 3, 4.
    for (slot, handle) in (0..5).zip(1..) {
        add(&mut table, handle, 10);
        let part = table.partition(PipeId::All, 0).unwrap();
        assert_eq!(part.span_of(h(handle)), Some(SlotSpan::single(slot)));
    }
    table.delete(h(1)).unwrap();
    table.delete(h(2)).unwrap();

    let part = table.partition(PipeId::All, 0).unwrap();
    let mapper = LinearLocationMapper::new(8, 8);
    let planner = Planner::new(part.store(), part.index(), part.spans(), &mapper, 8, 0);
    let plan = planner.place(0, 20, 3).unwrap();
    assert_eq!(plan.span, SlotSpan::new(5, 3));
    assert!(plan.moves.is_empty());
}

#[test]
fn test_range_rule_compacts_within_block() {
    init();
    // Slots 2..=4 hold singles ranked after the new rule; the only way to
    // open 3 contiguous slots ahead of them is to relocate. The resulting
    // span must stay inside block 0.
    let mut table = small_table("range_compact");
    for handle in 1..=5 {
        add(&mut table, handle, 20);
    }
    table.delete(h(1)).unwrap();
    table.delete(h(2)).unwrap();

    let part = table.partition(PipeId::All, 0).unwrap();
    let mapper = LinearLocationMapper::new(8, 8);
    let planner = Planner::new(part.store(), part.index(), part.spans(), &mapper, 8, 0);
    let plan = planner.place(0, 10, 3).unwrap();
    assert_eq!(plan.span.count, 3);
    assert_eq!(plan.span.base / 8, (plan.span.end() - 1) / 8);
    assert!(!plan.moves.is_empty());
    // Every relocated rule keeps its rank ahead of nothing: all obstacles
    // share priority 20, so order within the run is free to change, but no
    // move may leave block 0.
    for m in &plan.moves {
        assert!(m.to.end() <= 8);
    }
}

#[test]
fn test_abort_restores_touched_slot() {
    init();
    let mut table = small_table("abort_slot");
    add(&mut table, 1, 10);
    let before = table.partition(PipeId::All, 0).unwrap().clone();

    table.begin_session().unwrap();
    table
        .modify(
            h(1),
            Arc::new(RulePayload {
                action_data: vec![0xEE],
                ..Default::default()
            }),
            ActionRef::default(),
            7,
        )
        .unwrap();
    table.abort().unwrap();

    let after = table.partition(PipeId::All, 0).unwrap();
    assert_eq!(*after, before);
    let rule = after.rule_at(0).unwrap();
    assert_eq!(rule.handle, h(1));
    assert_eq!(rule.priority, 10);
    assert!(rule.payload.action_data.is_empty());
}

#[test]
fn test_abort_round_trips_arbitrary_session() {
    init();
    let mut table = small_table("abort_full");
    add(&mut table, 1, 10);
    add(&mut table, 2, 30);
    let before = table.partition(PipeId::All, 0).unwrap().clone();
    let moves_before = table.pending_moves().len();

    table.begin_session().unwrap();
    add(&mut table, 3, 20); // forces a relocation of handle 2
    table.delete(h(1)).unwrap();
    table
        .modify(h(2), payload(), ActionRef::default(), 9)
        .unwrap();
    table.abort().unwrap();

    assert_eq!(*table.partition(PipeId::All, 0).unwrap(), before);
    assert_eq!(table.pending_moves().len(), moves_before);
    assert_eq!(table.usage(), 2);
    table.check_consistency().unwrap();

    // The table stays operational after an abort.
    add(&mut table, 4, 15);
    assert_eq!(table.usage(), 3);
}

#[test]
fn test_commit_keeps_session_state() {
    init();
    let mut table = small_table("commit");
    table.begin_session().unwrap();
    add(&mut table, 1, 10);
    add(&mut table, 2, 20);
    let list = table.commit().unwrap();

    assert_eq!(list.len(), 2);
    assert_eq!(table.usage(), 2);
    assert!(table.pending_moves().is_empty());
    table.check_consistency().unwrap();
}

#[test]
fn test_no_space_leaves_state_untouched() {
    init();
    let mut table = small_table("full");
    for handle in 1..=8 {
        add(&mut table, handle, 10 * handle as Priority);
    }
    assert_eq!(table.usage(), 8);
    let before = table.partition(PipeId::All, 0).unwrap().clone();

    let err = table
        .add(
            PipeId::All,
            h(9),
            0,
            45,
            payload(),
            ActionRef::default(),
            0,
        )
        .unwrap_err();
    assert_eq!(err, TcamError::NoSpace);
    assert_eq!(*table.partition(PipeId::All, 0).unwrap(), before);
    assert_eq!(table.stats().no_space, 1);
    assert!(table
        .pending_moves()
        .iter()
        .all(|n| n.handle != h(9)));
    table.check_consistency().unwrap();
}

#[test]
fn test_delete_sole_priority_removes_run() {
    init();
    let mut table = small_table("runs");
    add(&mut table, 1, 10);
    add(&mut table, 2, 20);
    add(&mut table, 3, 30);
    table.delete(h(2)).unwrap();

    let index = table.partition(PipeId::All, 0).unwrap().index();
    assert_eq!(index.range_of(0, 20), None);
    // Queries around the vacated priority skip to the survivors.
    assert_eq!(index.prev_priority_end(0, 20), Some(0));
    assert_eq!(index.next_priority_start(0, 20), Some(2));
    assert_eq!(index.prev_priority_end(0, 10), None);
    assert_eq!(index.next_priority_start(0, 30), None);
}

#[test]
fn test_replay_matches_live_compaction() {
    init();
    // Two rules at priority 10 in slots 0..=1, three at priority 30 packed
    // right behind them. Adding priority 20 forces relocations; replaying
    // the emitted list from empty must land every rule where the live
    // table has it.
    let mut table = small_table("replay");
    add(&mut table, 1, 10);
    add(&mut table, 2, 10);
    for handle in 3..=7 {
        add(&mut table, handle, 30);
    }
    table.delete(h(7)).unwrap();
    add(&mut table, 8, 20);

    let list = table.drain_moves();
    assert!(list.iter().any(|n| n.op == MoveOp::Move));

    let mut rebuilt = small_table("replay");
    replay(&mut rebuilt, &list).unwrap();
    assert_eq!(
        rebuilt.partition(PipeId::All, 0).unwrap(),
        table.partition(PipeId::All, 0).unwrap()
    );
    assert_eq!(rebuilt.stats().replays, 1);
}

#[test]
fn test_capacity_conservation() {
    init();
    let mut table = small_table("conserve");
    let mut added = 0usize;
    let mut deleted = 0usize;
    for handle in 1..=6 {
        add(&mut table, handle, (handle % 3) as Priority * 10 + 5);
        added += 1;
    }
    for handle in [2u64, 5] {
        table.delete(h(handle)).unwrap();
        deleted += 1;
    }
    assert_eq!(table.usage(), added - deleted);
    assert!(table.usage() <= 8);
    table.check_consistency().unwrap();
}

#[test]
fn test_range_rules_through_table() {
    init();
    // A fixed 2-slot expansion: each add consumes a 2-slot span that never
    // crosses a block boundary.
    let mut table = TcamTable::new(
        TableId::from_raw(0),
        TableConfig::new("range_table")
            .with_partition_slots(16)
            .with_block_size(4)
            .with_placement_buffer(0),
        Arc::new(LinearLocationMapper::new(16, 4)),
        Arc::new(FixedWidthExpander::new(2)),
    )
    .unwrap();
    for handle in 1..=4 {
        add(&mut table, handle, 10 * handle as Priority);
    }
    assert_eq!(table.usage(), 8);
    let part = table.partition(PipeId::All, 0).unwrap();
    for handle in 1..=4 {
        let span = part.span_of(h(handle)).unwrap();
        assert_eq!(span.count, 2);
        assert_eq!(span.base / 4, (span.end() - 1) / 4);
    }
    table.check_consistency().unwrap();
}

#[test]
fn test_default_rule_direct() {
    init();
    let mut table = TcamTable::new(
        TableId::from_raw(0),
        small_config("default").with_default_slot(true),
        Arc::new(LinearLocationMapper::new(8, 8)),
        Arc::new(tcam_types::SingleSlotExpander),
    )
    .unwrap();

    table
        .set_default(PipeId::All, h(99), payload(), ActionRef::default())
        .unwrap();
    // Reserved slot is the last one; searches never hand it out.
    for handle in 1..=7 {
        add(&mut table, handle, 10);
    }
    assert!(matches!(
        table.add(PipeId::All, h(8), 0, 10, payload(), ActionRef::default(), 0),
        Err(TcamError::NoSpace)
    ));

    let list = table.drain_moves();
    let set = list.iter().find(|n| n.op == MoveOp::SetDefault).unwrap();
    assert_eq!(set.new_spans, vec![SlotSpan::single(7)]);

    assert!(table
        .set_default(PipeId::All, h(98), payload(), ActionRef::default())
        .is_err());
    table.clear_default(PipeId::All).unwrap();
    table.check_consistency().unwrap();
}

#[test]
fn test_asymmetric_pipes_are_independent() {
    init();
    let mut table = TcamTable::new(
        TableId::from_raw(0),
        small_config("pipes").with_symmetric(false).with_num_pipes(2),
        Arc::new(LinearLocationMapper::new(8, 8)),
        Arc::new(tcam_types::SingleSlotExpander),
    )
    .unwrap();

    table
        .add(PipeId::Pipe(0), h(1), 0, 10, payload(), ActionRef::default(), 0)
        .unwrap();
    table
        .add(PipeId::Pipe(1), h(2), 0, 10, payload(), ActionRef::default(), 0)
        .unwrap();
    // Symmetric handles are rejected in per-pipe mode.
    assert!(table
        .add(PipeId::All, h(3), 0, 10, payload(), ActionRef::default(), 0)
        .is_err());

    assert_eq!(table.partition(PipeId::Pipe(0), 0).unwrap().usage(), 1);
    assert_eq!(table.partition(PipeId::Pipe(1), 0).unwrap().usage(), 1);
    table.check_consistency().unwrap();
}

#[test]
fn test_exact_expansion_routes_by_partition_key() {
    init();
    // An exact-expansion table routes every rule to the partition named by
    // its payload key; partitions place independently.
    let mut table = TcamTable::new(
        TableId::from_raw(0),
        TableConfig::new("atcam")
            .with_match_kind(MatchKind::ExactExpansion)
            .with_partitions(2)
            .with_partition_slots(8)
            .with_placement_buffer(0),
        Arc::new(LinearLocationMapper::new(8, 8)),
        Arc::new(tcam_types::SingleSlotExpander),
    )
    .unwrap();

    let in_part = |p: u32| Arc::new(RulePayload::for_partition(p));
    table
        .add(PipeId::All, h(1), 0, 10, in_part(0), ActionRef::default(), 0)
        .unwrap();
    table
        .add(PipeId::All, h(2), 0, 10, in_part(1), ActionRef::default(), 0)
        .unwrap();
    table
        .add(PipeId::All, h(3), 0, 5, in_part(1), ActionRef::default(), 0)
        .unwrap();

    let p0 = table.partition(PipeId::All, 0).unwrap();
    let p1 = table.partition(PipeId::All, 1).unwrap();
    assert_eq!(p0.span_of(h(1)), Some(SlotSpan::single(0)));
    assert_eq!(p0.usage(), 1);
    assert_eq!(p1.usage(), 2);
    // Ordering holds within the partition: 5 ranks before 10.
    assert_eq!(p1.rule_at(0).unwrap().handle, h(3));
    assert_eq!(p1.span_of(h(1)), None);

    // Out-of-range partition key.
    assert!(matches!(
        table.add(PipeId::All, h(9), 0, 10, in_part(2), ActionRef::default(), 0),
        Err(TcamError::InvalidArgument(_))
    ));

    // Modify follows the handle to its partition.
    table
        .modify(
            h(2),
            Arc::new(RulePayload {
                partition: 1,
                action_data: vec![7],
                ..Default::default()
            }),
            ActionRef::default(),
            0,
        )
        .unwrap();
    let p1 = table.partition(PipeId::All, 1).unwrap();
    let span = p1.span_of(h(2)).unwrap();
    assert_eq!(p1.rule_at(span.base).unwrap().payload.action_data, vec![7]);

    // An aborted session restores both partitions independently.
    let p0_before = table.partition(PipeId::All, 0).unwrap().clone();
    let p1_before = table.partition(PipeId::All, 1).unwrap().clone();
    table.begin_session().unwrap();
    table
        .add(PipeId::All, h(4), 0, 20, in_part(0), ActionRef::default(), 0)
        .unwrap();
    table.delete(h(3)).unwrap();
    table.abort().unwrap();
    assert_eq!(*table.partition(PipeId::All, 0).unwrap(), p0_before);
    assert_eq!(*table.partition(PipeId::All, 1).unwrap(), p1_before);

    for handle in [1u64, 2, 3] {
        table.delete(h(handle)).unwrap();
    }
    assert_eq!(table.usage(), 0);
    table.check_consistency().unwrap();
}

#[test]
fn test_ternary_table_rejects_partition_key() {
    init();
    // Ternary match has no partition dimension; a non-zero partition key
    // is malformed even when the geometry allocates spare partitions.
    let mut table = TcamTable::new(
        TableId::from_raw(0),
        small_config("ternary").with_partitions(2),
        Arc::new(LinearLocationMapper::new(8, 8)),
        Arc::new(tcam_types::SingleSlotExpander),
    )
    .unwrap();
    assert!(matches!(
        table.add(
            PipeId::All,
            h(1),
            0,
            10,
            Arc::new(RulePayload::for_partition(1)),
            ActionRef::default(),
            0,
        ),
        Err(TcamError::InvalidArgument(_))
    ));
    assert_eq!(table.usage(), 0);
}

#[test]
fn test_atomic_modify_relocates() {
    init();
    // With atomic modify the new content is written to a fresh span before
    // the old slots are released, so the rule is never absent.
    let mut table = TcamTable::new(
        TableId::from_raw(0),
        small_config("atomic").with_atomic_modify(true),
        Arc::new(LinearLocationMapper::new(8, 8)),
        Arc::new(tcam_types::SingleSlotExpander),
    )
    .unwrap();
    add(&mut table, 1, 10);
    let old_span = table
        .partition(PipeId::All, 0)
        .unwrap()
        .span_of(h(1))
        .unwrap();

    table
        .modify(
            h(1),
            Arc::new(RulePayload {
                action_data: vec![0x42],
                ..Default::default()
            }),
            ActionRef::default(),
            0,
        )
        .unwrap();

    let part = table.partition(PipeId::All, 0).unwrap();
    let new_span = part.span_of(h(1)).unwrap();
    assert_ne!(new_span, old_span);
    assert!(part.rule_at(old_span.base).is_none());
    assert_eq!(part.rule_at(new_span.base).unwrap().payload.action_data, vec![0x42]);

    let list = table.drain_moves();
    let node = list.iter().find(|n| n.op == MoveOp::Modify).unwrap();
    assert_eq!(node.old_spans, vec![old_span]);
    assert_eq!(node.new_spans, vec![new_span]);
    table.check_consistency().unwrap();
}

#[test]
fn test_symmetric_toggle_requires_empty_table() {
    init();
    let mut table = small_table("toggle");
    table.set_symmetric(false).unwrap();
    table
        .add(PipeId::Pipe(0), h(1), 0, 10, payload(), ActionRef::default(), 0)
        .unwrap();
    assert!(table.set_symmetric(true).is_err());

    table.delete(h(1)).unwrap();
    table.set_symmetric(true).unwrap();
    add(&mut table, 2, 10);
}

#[test]
fn test_registry_drives_full_lifecycle() {
    init();
    let mut reg = TableRegistry::new();
    let id = reg.create_table(small_config("lifecycle")).unwrap();

    let table = reg.table_mut(id).unwrap();
    table
        .add(PipeId::All, h(1), 0, 10, payload(), ActionRef::default(), 0)
        .unwrap();
    table
        .modify(h(1), payload(), ActionRef::default(), 3)
        .unwrap();
    table.delete(h(1)).unwrap();
    assert_eq!(table.stats().placements, 1);
    assert_eq!(table.stats().modifies, 1);
    assert_eq!(table.stats().deletes, 1);

    reg.destroy_table(id).unwrap();
    assert!(reg.is_empty());
}
