//! Warm-restart recovery.
//!
//! Two paths back to a consistent in-memory state after a process restart:
//!
//! - [`replay`]: a move list persisted by the external serializer is
//!   applied against a freshly created table, deterministically rebuilding
//!   slot stores and priority indexes. Replaying the same list onto two
//!   independently created tables yields identical state.
//! - [`reconcile`]: after an uncontrolled restart the desired rule set
//!   (software intent) is diffed against the state observed from hardware
//!   introspection. The result is a move list that converges the hardware
//!   to the desired state; nothing is touched until the caller applies it.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use tcam_types::{
    ActionRef, GroupId, LocationMapper, PipeId, Priority, RangeExpander, RuleHandle, RulePayload,
    TableId, TcamError, TcamResult,
};

use crate::move_list::{MoveList, MoveOp, SlotSpan};
use crate::table::{TableConfig, TcamTable};

/// Rebuilds `table` from a move list recorded by a prior session.
///
/// The table must be freshly created (zero usage); the list is trusted to
/// be self-consistent, so any conflict it produces surfaces as
/// `Unexpected`.
pub fn replay(table: &mut TcamTable, list: &MoveList) -> TcamResult<()> {
    if table.usage() != 0 {
        return Err(TcamError::invalid("replay target table is not empty"));
    }
    for node in list.iter() {
        match node.op {
            MoveOp::Allocate => table.install_at(node)?,
            MoveOp::Move => table.relocate_replayed(node)?,
            MoveOp::Delete => table.delete_replayed(node)?,
            MoveOp::Modify => table.modify_replayed(node)?,
            MoveOp::SetDefault => table.set_default_replayed(node)?,
            MoveOp::ClearDefault => table.clear_default(node.pipe)?,
        }
    }
    // Replay reconstructs state; it does not produce new work for the
    // apply layer.
    let _ = table.drain_moves();
    table.note_replay();
    table.check_consistency()?;
    info!("{}: replayed {} move(s)", table.id(), list.len());
    Ok(())
}

/// One rule as reported by hardware introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEntry {
    pub handle: RuleHandle,
    pub pipe: PipeId,
    pub partition: u32,
    pub group: GroupId,
    pub priority: Priority,
    pub span: SlotSpan,
    pub payload: Arc<RulePayload>,
    pub action: ActionRef,
    pub ttl: u32,
}

/// Hardware-confirmed state: what the chip actually holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedView {
    entries: Vec<ObservedEntry>,
}

impl ObservedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ObservedEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ObservedEntry] {
        &self.entries
    }
}

/// One rule the caller wants placed.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredEntry {
    pub pipe: PipeId,
    pub group: GroupId,
    pub priority: Priority,
    pub payload: Arc<RulePayload>,
    pub action: ActionRef,
    pub ttl: u32,
}

/// Software intent: the rule set that should exist, keyed by handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredView {
    entries: BTreeMap<RuleHandle, DesiredEntry>,
}

impl DesiredView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: RuleHandle, entry: DesiredEntry) {
        self.entries.insert(handle, entry);
    }

    pub fn entries(&self) -> &BTreeMap<RuleHandle, DesiredEntry> {
        &self.entries
    }
}

/// Computes the move list that converges `observed` to `desired`.
///
/// Entries are matched by handle. A payload/action difference at matching
/// group and priority becomes an in-place `Modify` at the observed
/// location; a group or priority difference becomes `Delete` plus a
/// planned `Allocate`. The diff is computed on a scratch table seeded from
/// the observed state, so live structures stay untouched until the caller
/// applies the returned list. Operations are emitted in handle order, so
/// the result is deterministic for a given pair of views.
pub fn reconcile(
    id: TableId,
    config: &TableConfig,
    mapper: Arc<dyn LocationMapper + Send + Sync>,
    expander: Arc<dyn RangeExpander + Send + Sync>,
    observed: &ObservedView,
    desired: &DesiredView,
) -> TcamResult<MoveList> {
    let mut scratch = TcamTable::new(id, config.clone(), mapper, expander)?;

    // Seed the scratch table with the observed state.
    let mut seed = MoveList::new();
    let mut seeded: Vec<&ObservedEntry> = observed.entries().iter().collect();
    seeded.sort_by_key(|e| e.handle);
    for entry in &seeded {
        seed.push(crate::move_list::MoveNode {
            op: MoveOp::Allocate,
            handle: entry.handle,
            pipe: entry.pipe,
            partition: entry.partition,
            group: entry.group,
            priority: entry.priority,
            old_spans: Vec::new(),
            new_spans: vec![entry.span],
            payload: Some(Arc::clone(&entry.payload)),
            action: entry.action,
            ttl: entry.ttl,
        });
    }
    replay(&mut scratch, &seed)?;

    // Deletes and modifies for observed entries.
    for entry in &seeded {
        match desired.entries().get(&entry.handle) {
            None => scratch.delete(entry.handle)?,
            Some(want) => {
                if want.pipe != entry.pipe
                    || want.group != entry.group
                    || want.priority != entry.priority
                {
                    scratch.delete(entry.handle)?;
                } else if want.payload != entry.payload
                    || want.action != entry.action
                    || want.ttl != entry.ttl
                {
                    scratch.modify(
                        entry.handle,
                        Arc::clone(&want.payload),
                        want.action,
                        want.ttl,
                    )?;
                }
            }
        }
    }

    // Adds for desired entries with no surviving observed counterpart.
    for (&handle, want) in desired.entries() {
        let survives = seeded.iter().any(|e| {
            e.handle == handle
                && e.pipe == want.pipe
                && e.group == want.group
                && e.priority == want.priority
        });
        if survives {
            continue;
        }
        scratch.add(
            want.pipe,
            handle,
            want.group,
            want.priority,
            Arc::clone(&want.payload),
            want.action,
            want.ttl,
        )?;
    }

    let delta = scratch.drain_moves();
    debug!(
        "{}: reconcile produced {} move(s) from {} observed / {} desired",
        id,
        delta.len(),
        observed.entries().len(),
        desired.entries().len()
    );
    Ok(delta)
}
