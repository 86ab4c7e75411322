//! Logical table: pipe instances, lifecycle operations, sessions.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tcam_types::{
    ActionRef, GroupId, LocationMapper, PipeId, Priority, RangeExpander, RuleHandle, RulePayload,
    TableId, TcamError, TcamResult,
};

use super::config::{MatchKind, PlacementStats, TableConfig};
use super::partition::Partition;
use crate::move_list::{MoveList, MoveNode, MoveOp, SlotSpan};
use crate::placement::Planner;
use crate::rule::{DefaultRule, DefaultRuleKind, Rule};
use crate::txn::{SessionState, ShadowStore, SlotKey};

/// One replica of the table, bound to a pipe or to all pipes.
#[derive(Debug, Clone)]
pub struct PipeInstance {
    pipe: PipeId,
    partitions: Vec<Partition>,
    default_rule: Option<DefaultRule>,
}

impl PipeInstance {
    fn new(pipe: PipeId, config: &TableConfig) -> Self {
        let partitions = (0..config.partitions)
            .map(|p| {
                // Only partition 0 reserves the direct default slot.
                Partition::new(config.partition_slots, p == 0 && config.reserve_default_slot)
            })
            .collect();
        Self {
            pipe,
            partitions,
            default_rule: None,
        }
    }

    pub fn pipe(&self) -> PipeId {
        self.pipe
    }

    pub fn default_rule(&self) -> Option<&DefaultRule> {
        self.default_rule.as_ref()
    }
}

/// Priority value reported in move records for the default rule, which
/// ranks after every priority-ordered rule.
const DEFAULT_RULE_PRIORITY: Priority = Priority::MAX;

/// One logical match table.
///
/// All lifecycle operations (`add`, `delete`, `modify`, `set_default`,
/// `clear_default`) go through this type, which routes them to the right
/// pipe instance and partition, runs the placement planner, keeps the slot
/// stores and priority indexes consistent, and appends the resulting move
/// records for the hardware-apply layer.
///
/// The table assumes external serialization: one session mutates one table
/// at a time; distinct tables share nothing.
pub struct TcamTable {
    id: TableId,
    config: TableConfig,
    pipes: Vec<PipeInstance>,
    mapper: Arc<dyn LocationMapper + Send + Sync>,
    expander: Arc<dyn RangeExpander + Send + Sync>,
    session: SessionState,
    shadow: Option<ShadowStore>,
    moves: MoveList,
    stats: PlacementStats,
    /// Routing: handle -> (pipe instance index, partition index).
    locations: HashMap<RuleHandle, (u32, u32)>,
}

impl TcamTable {
    pub fn new(
        id: TableId,
        config: TableConfig,
        mapper: Arc<dyn LocationMapper + Send + Sync>,
        expander: Arc<dyn RangeExpander + Send + Sync>,
    ) -> TcamResult<Self> {
        config.validate()?;
        let pipes = Self::build_pipes(&config);
        info!(
            "created {} ({}): {} pipe instance(s), {} partition(s) of {} slots",
            id,
            config.name,
            pipes.len(),
            config.partitions,
            config.partition_slots
        );
        Ok(Self {
            id,
            config,
            pipes,
            mapper,
            expander,
            session: SessionState::Idle,
            shadow: None,
            moves: MoveList::new(),
            stats: PlacementStats::default(),
            locations: HashMap::new(),
        })
    }

    fn build_pipes(config: &TableConfig) -> Vec<PipeInstance> {
        if config.symmetric {
            vec![PipeInstance::new(PipeId::All, config)]
        } else {
            (0..config.num_pipes)
                .map(|p| PipeInstance::new(PipeId::Pipe(p), config))
                .collect()
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn stats(&self) -> &PlacementStats {
        &self.stats
    }

    pub fn session_state(&self) -> SessionState {
        self.session
    }

    pub fn pipe_instances(&self) -> &[PipeInstance] {
        &self.pipes
    }

    /// Total occupied slots across every pipe instance and partition,
    /// including a direct default slot when set.
    pub fn usage(&self) -> usize {
        self.pipes
            .iter()
            .flat_map(|pi| pi.partitions.iter())
            .map(|p| p.usage())
            .sum()
    }

    pub fn partition(&self, pipe: PipeId, partition: u32) -> TcamResult<&Partition> {
        let pipe_idx = self.pipe_index(pipe)?;
        self.pipes[pipe_idx]
            .partitions
            .get(partition as usize)
            .ok_or_else(|| TcamError::invalid(format!("partition {} out of range", partition)))
    }

    /// Runs the consistency checker over every partition.
    pub fn check_consistency(&self) -> TcamResult<()> {
        for pi in &self.pipes {
            for part in &pi.partitions {
                part.check_consistency(self.config.block_size)?;
            }
        }
        Ok(())
    }

    fn pipe_index(&self, pipe: PipeId) -> TcamResult<usize> {
        if self.config.symmetric {
            match pipe {
                PipeId::All => Ok(0),
                PipeId::Pipe(_) => Err(TcamError::invalid(
                    "symmetric table is addressed with PipeId::All",
                )),
            }
        } else {
            match pipe {
                PipeId::Pipe(p) if p < self.config.num_pipes => Ok(p as usize),
                PipeId::Pipe(p) => {
                    Err(TcamError::invalid(format!("pipe {} out of range", p)))
                }
                PipeId::All => Err(TcamError::invalid(
                    "asymmetric table needs a specific pipe",
                )),
            }
        }
    }

    fn route_partition(&self, payload: &RulePayload) -> TcamResult<u32> {
        if payload.partition >= self.config.partitions {
            return Err(TcamError::invalid(format!(
                "partition key {} out of range ({} partitions)",
                payload.partition, self.config.partitions
            )));
        }
        if self.config.match_kind == MatchKind::Ternary && payload.partition != 0 {
            return Err(TcamError::invalid(
                "ternary tables have a single partition",
            ));
        }
        Ok(payload.partition)
    }

    fn resolve(&self, handle: RuleHandle) -> TcamResult<(usize, u32)> {
        self.locations
            .get(&handle)
            .map(|&(pipe, part)| (pipe as usize, part))
            .ok_or_else(|| TcamError::invalid(format!("unknown {}", handle)))
    }

    /// Captures pre-mutation content of a span if a session is active.
    fn backup_span(&mut self, pipe_idx: usize, part_idx: u32, span: SlotSpan) {
        let Some(shadow) = self.shadow.as_mut() else {
            return;
        };
        let part = &self.pipes[pipe_idx].partitions[part_idx as usize];
        for index in span.indices() {
            shadow.capture_slot(
                SlotKey {
                    pipe: pipe_idx as u32,
                    partition: part_idx,
                    index,
                },
                part.rule_at(index),
            );
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------

    /// Places a new rule. On `NoSpace` no state changes and no move
    /// records are emitted.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        pipe: PipeId,
        handle: RuleHandle,
        group: GroupId,
        priority: Priority,
        payload: Arc<RulePayload>,
        action: ActionRef,
        ttl: u32,
    ) -> TcamResult<()> {
        if self.locations.contains_key(&handle) {
            return Err(TcamError::invalid(format!("{} already placed", handle)));
        }
        let pipe_idx = self.pipe_index(pipe)?;
        let part_idx = self.route_partition(&payload)?;
        let expansion = self.expander.expand(&payload)?;

        let placement = {
            let part = &self.pipes[pipe_idx].partitions[part_idx as usize];
            let planner = Planner::new(
                part.store(),
                part.index(),
                part.spans(),
                self.mapper.as_ref(),
                self.config.block_size,
                self.config.placement_buffer,
            );
            planner.place(group, priority, expansion.slot_count)
        };
        let placement = match placement {
            Ok(p) => p,
            Err(TcamError::NoSpace) => {
                self.stats.no_space += 1;
                debug!("{}: no space for group {} priority {}", self.id, group, priority);
                return Err(TcamError::NoSpace);
            }
            Err(e) => return Err(e),
        };

        // Snapshot everything the placement will touch, then apply.
        for m in &placement.moves {
            self.backup_span(pipe_idx, part_idx, m.from);
            self.backup_span(pipe_idx, part_idx, m.to);
        }
        self.backup_span(pipe_idx, part_idx, placement.span);

        let node_pipe = self.pipes[pipe_idx].pipe;
        for m in &placement.moves {
            self.pipes[pipe_idx].partitions[part_idx as usize].relocate(m.handle, m.to)?;
            self.moves.push(MoveNode::relocate(
                m.handle, node_pipe, part_idx, group, m.priority, m.from, m.to,
            ));
        }
        self.pipes[pipe_idx].partitions[part_idx as usize].install(
            handle,
            group,
            priority,
            placement.span,
            Arc::clone(&payload),
            action,
            ttl,
        )?;
        self.locations.insert(handle, (pipe_idx as u32, part_idx));
        self.moves.push(MoveNode::allocate(
            handle,
            node_pipe,
            part_idx,
            group,
            priority,
            placement.span,
            payload,
            action,
            ttl,
        ));

        self.stats.placements += 1;
        self.stats.relocations += placement.moves.len() as u64;
        if !placement.moves.is_empty() {
            self.stats.compactions += 1;
        }
        debug!(
            "{}: placed {} group {} priority {} at {:?} ({} relocation(s))",
            self.id,
            handle,
            group,
            priority,
            placement.span,
            placement.moves.len()
        );
        Ok(())
    }

    /// Removes a rule and all its range siblings.
    pub fn delete(&mut self, handle: RuleHandle) -> TcamResult<()> {
        let (pipe_idx, part_idx) = self.resolve(handle)?;
        let span = self.pipes[pipe_idx].partitions[part_idx as usize]
            .span_of(handle)
            .ok_or_else(|| TcamError::unexpected(format!("{} lost its span", handle)))?;
        self.backup_span(pipe_idx, part_idx, span);

        let node_pipe = self.pipes[pipe_idx].pipe;
        let (span, rule) =
            self.pipes[pipe_idx].partitions[part_idx as usize].remove(handle)?;
        self.locations.remove(&handle);
        self.moves.push(MoveNode {
            op: MoveOp::Delete,
            handle,
            pipe: node_pipe,
            partition: part_idx,
            group: rule.group,
            priority: rule.priority,
            old_spans: vec![span],
            new_spans: Vec::new(),
            payload: Some(rule.payload),
            action: rule.action,
            ttl: rule.ttl,
        });
        self.stats.deletes += 1;
        Ok(())
    }

    /// Replaces a rule's payload and action.
    ///
    /// Atomic-modify tables relocate the rule to a freshly placed span and
    /// emit a `Modify` node carrying both spans, so the apply layer writes
    /// the new slots before erasing the old ones. Other tables rewrite in
    /// place. A change in range expansion forces the relocating path.
    pub fn modify(
        &mut self,
        handle: RuleHandle,
        payload: Arc<RulePayload>,
        action: ActionRef,
        ttl: u32,
    ) -> TcamResult<()> {
        let (pipe_idx, part_idx) = self.resolve(handle)?;
        let old_span = self.pipes[pipe_idx].partitions[part_idx as usize]
            .span_of(handle)
            .ok_or_else(|| TcamError::unexpected(format!("{} lost its span", handle)))?;
        let (group, priority) = {
            let rule = self.pipes[pipe_idx].partitions[part_idx as usize]
                .rule_at(old_span.base)
                .ok_or_else(|| TcamError::unexpected(format!("{} base slot empty", handle)))?;
            (rule.group, rule.priority)
        };
        let expansion = self.expander.expand(&payload)?;
        let relocating = self.config.atomic_modify || expansion.slot_count != old_span.count;
        let node_pipe = self.pipes[pipe_idx].pipe;

        if relocating {
            let placement = {
                let part = &self.pipes[pipe_idx].partitions[part_idx as usize];
                let planner = Planner::new(
                    part.store(),
                    part.index(),
                    part.spans(),
                    self.mapper.as_ref(),
                    self.config.block_size,
                    self.config.placement_buffer,
                );
                planner.place_excluding(group, priority, expansion.slot_count, Some(handle))
            };
            let placement = match placement {
                Ok(p) => p,
                Err(TcamError::NoSpace) => {
                    self.stats.no_space += 1;
                    return Err(TcamError::NoSpace);
                }
                Err(e) => return Err(e),
            };

            for m in &placement.moves {
                self.backup_span(pipe_idx, part_idx, m.from);
                self.backup_span(pipe_idx, part_idx, m.to);
            }
            self.backup_span(pipe_idx, part_idx, old_span);
            self.backup_span(pipe_idx, part_idx, placement.span);

            for m in &placement.moves {
                self.pipes[pipe_idx].partitions[part_idx as usize].relocate(m.handle, m.to)?;
                self.moves.push(MoveNode::relocate(
                    m.handle, node_pipe, part_idx, group, m.priority, m.from, m.to,
                ));
            }
            let part = &mut self.pipes[pipe_idx].partitions[part_idx as usize];
            part.remove(handle)?;
            part.install(
                handle,
                group,
                priority,
                placement.span,
                Arc::clone(&payload),
                action,
                ttl,
            )?;
            self.moves.push(MoveNode {
                op: MoveOp::Modify,
                handle,
                pipe: node_pipe,
                partition: part_idx,
                group,
                priority,
                old_spans: vec![old_span],
                new_spans: vec![placement.span],
                payload: Some(payload),
                action,
                ttl,
            });
            self.stats.relocations += placement.moves.len() as u64;
        } else {
            self.backup_span(pipe_idx, part_idx, old_span);
            self.pipes[pipe_idx].partitions[part_idx as usize].rewrite(
                handle,
                Arc::clone(&payload),
                action,
                ttl,
            )?;
            self.moves.push(MoveNode {
                op: MoveOp::Modify,
                handle,
                pipe: node_pipe,
                partition: part_idx,
                group,
                priority,
                old_spans: vec![old_span],
                new_spans: vec![old_span],
                payload: Some(payload),
                action,
                ttl,
            });
        }
        self.stats.modifies += 1;
        Ok(())
    }

    /// Installs the pipe instance's default rule (singleton).
    pub fn set_default(
        &mut self,
        pipe: PipeId,
        handle: RuleHandle,
        payload: Arc<RulePayload>,
        action: ActionRef,
    ) -> TcamResult<()> {
        let pipe_idx = self.pipe_index(pipe)?;
        if self.pipes[pipe_idx].default_rule.is_some() {
            return Err(TcamError::invalid("default rule already set"));
        }
        let node_pipe = self.pipes[pipe_idx].pipe;
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.capture_default(pipe_idx as u32, self.pipes[pipe_idx].default_rule.as_ref());
        }

        let (kind, spans) = if self.config.reserve_default_slot {
            let slot_span = SlotSpan::single(self.config.partition_slots - 1);
            self.backup_span(pipe_idx, 0, slot_span);
            let index = self.pipes[pipe_idx].partitions[0].set_default_slot(Rule {
                handle,
                group: 0,
                priority: DEFAULT_RULE_PRIORITY,
                subentry: 0,
                payload: Arc::clone(&payload),
                action,
                ttl: 0,
            })?;
            (DefaultRuleKind::Direct, vec![SlotSpan::single(index)])
        } else {
            (DefaultRuleKind::Indirect, Vec::new())
        };

        self.pipes[pipe_idx].default_rule = Some(DefaultRule {
            kind,
            handle,
            payload: Arc::clone(&payload),
            action,
        });
        self.moves.push(MoveNode {
            op: MoveOp::SetDefault,
            handle,
            pipe: node_pipe,
            partition: 0,
            group: 0,
            priority: DEFAULT_RULE_PRIORITY,
            old_spans: Vec::new(),
            new_spans: spans,
            payload: Some(payload),
            action,
            ttl: 0,
        });
        Ok(())
    }

    /// Removes the pipe instance's default rule.
    pub fn clear_default(&mut self, pipe: PipeId) -> TcamResult<()> {
        let pipe_idx = self.pipe_index(pipe)?;
        let Some(current) = self.pipes[pipe_idx].default_rule.clone() else {
            return Err(TcamError::invalid("no default rule set"));
        };
        let node_pipe = self.pipes[pipe_idx].pipe;
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.capture_default(pipe_idx as u32, Some(&current));
        }

        let spans = match current.kind {
            DefaultRuleKind::Direct => {
                let slot_span = SlotSpan::single(self.config.partition_slots - 1);
                self.backup_span(pipe_idx, 0, slot_span);
                let index = self.pipes[pipe_idx].partitions[0].clear_default_slot()?;
                vec![SlotSpan::single(index)]
            }
            DefaultRuleKind::Indirect => Vec::new(),
        };

        self.pipes[pipe_idx].default_rule = None;
        self.moves.push(MoveNode {
            op: MoveOp::ClearDefault,
            handle: current.handle,
            pipe: node_pipe,
            partition: 0,
            group: 0,
            priority: DEFAULT_RULE_PRIORITY,
            old_spans: spans,
            new_spans: Vec::new(),
            payload: Some(current.payload),
            action: current.action,
            ttl: 0,
        });
        Ok(())
    }

    /// Switches between symmetric and per-pipe replicas. Requires zero
    /// usage and no default rules.
    pub fn set_symmetric(&mut self, symmetric: bool) -> TcamResult<()> {
        if self.config.symmetric == symmetric {
            return Ok(());
        }
        if self.usage() != 0 || self.pipes.iter().any(|p| p.default_rule.is_some()) {
            return Err(TcamError::invalid(
                "symmetric mode can only change while the table is empty",
            ));
        }
        self.config.symmetric = symmetric;
        self.pipes = Self::build_pipes(&self.config);
        info!("{}: symmetric mode set to {}", self.id, symmetric);
        Ok(())
    }

    /// Hands over every pending move record.
    pub fn drain_moves(&mut self) -> MoveList {
        self.moves.drain_from(0)
    }

    pub fn pending_moves(&self) -> &MoveList {
        &self.moves
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Opens a session. The first write to each slot inside the session is
    /// snapshotted so the whole session can be rolled back.
    pub fn begin_session(&mut self) -> TcamResult<()> {
        if self.session == SessionState::Active {
            return Err(TcamError::invalid("session already active"));
        }
        self.shadow = Some(ShadowStore::new(self.moves.len()));
        self.session = SessionState::Active;
        Ok(())
    }

    /// Commits the session: live state stays exactly as the operations
    /// left it, the shadow is discarded, and the session's move records
    /// are handed to the caller.
    pub fn commit(&mut self) -> TcamResult<MoveList> {
        if self.session != SessionState::Active {
            return Err(TcamError::invalid("no active session"));
        }
        let shadow = self
            .shadow
            .take()
            .ok_or_else(|| TcamError::unexpected("active session lost its shadow"))?;
        let list = self.moves.drain_from(shadow.moves_mark());
        self.session = SessionState::Committed;
        self.stats.commits += 1;
        debug!("{}: committed session with {} move(s)", self.id, list.len());
        Ok(list)
    }

    /// Aborts the session, restoring every touched slot and the priority
    /// index to their pre-session state and dropping the session's moves.
    pub fn abort(&mut self) -> TcamResult<()> {
        if self.session != SessionState::Active {
            return Err(TcamError::invalid("no active session"));
        }
        let shadow = self
            .shadow
            .take()
            .ok_or_else(|| TcamError::unexpected("active session lost its shadow"))?;

        // Pass 1: strip live entries that differ from their snapshot, so
        // re-insertion cannot corrupt still-valid priority runs mid-walk.
        let mut affected: Vec<RuleHandle> = Vec::new();
        for (key, snapshot) in shadow.slots() {
            let part = &mut self.pipes[key.pipe as usize].partitions[key.partition as usize];
            let is_default_slot = key.index >= part.store().limit();
            if part.rule_at(key.index) == snapshot.as_ref() {
                continue;
            }
            if part.rule_at(key.index).is_some() {
                let rule = part.store_mut().take(key.index)?;
                if !is_default_slot {
                    part.index_mut().remove(rule.group, rule.priority, key.index)?;
                }
                affected.push(rule.handle);
            }
        }

        // Pass 2: re-insert snapshot content.
        for (key, snapshot) in shadow.slots() {
            let Some(rule) = snapshot else {
                continue;
            };
            let part = &mut self.pipes[key.pipe as usize].partitions[key.partition as usize];
            if part.rule_at(key.index).is_some() {
                continue; // was identical, left alone in pass 1
            }
            let is_default_slot = key.index >= part.store().limit();
            if !is_default_slot {
                part.index_mut().insert(rule.group, rule.priority, key.index)?;
            }
            part.store_mut().set(key.index, rule.clone())?;
            affected.push(rule.handle);
        }

        // Pass 3: rebuild span and routing entries for every handle the
        // session touched.
        affected.sort_unstable();
        affected.dedup();
        for handle in affected {
            self.rebuild_handle_entries(handle)?;
        }

        for (&pipe, snapshot) in shadow.defaults() {
            self.pipes[pipe as usize].default_rule = snapshot.clone();
        }

        self.moves.truncate(shadow.moves_mark());
        self.session = SessionState::Aborted;
        self.stats.aborts += 1;
        warn!("{}: session aborted, state restored", self.id);
        Ok(())
    }

    /// Recomputes the span and routing entry of one handle by scanning its
    /// partition; drops both when the handle no longer owns slots.
    fn rebuild_handle_entries(&mut self, handle: RuleHandle) -> TcamResult<()> {
        for (pipe_idx, pi) in self.pipes.iter_mut().enumerate() {
            for (part_idx, part) in pi.partitions.iter_mut().enumerate() {
                let limit = part.store().limit();
                let slots: Vec<usize> = (0..limit)
                    .filter(|&i| part.rule_at(i).is_some_and(|r| r.handle == handle))
                    .collect();
                if slots.is_empty() {
                    continue;
                }
                let base = slots[0];
                let count = slots.len();
                if slots != (base..base + count).collect::<Vec<_>>() {
                    return Err(TcamError::unexpected(format!(
                        "{} restored to non-contiguous slots",
                        handle
                    )));
                }
                part.spans_mut().insert(handle, SlotSpan::new(base, count));
                self.locations
                    .insert(handle, (pipe_idx as u32, part_idx as u32));
                return Ok(());
            }
        }
        // No slots anywhere: the handle was added during the session.
        for pi in self.pipes.iter_mut() {
            for part in pi.partitions.iter_mut() {
                part.spans_mut().remove(&handle);
            }
        }
        self.locations.remove(&handle);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Replay support (used by the restart module)
    // ------------------------------------------------------------------

    pub(crate) fn install_at(&mut self, node: &MoveNode) -> TcamResult<()> {
        let pipe_idx = self.pipe_index(node.pipe)?;
        let span = single_span(node, &node.new_spans)?;
        let payload = node
            .payload
            .clone()
            .ok_or_else(|| TcamError::invalid(format!("allocate node for {} lacks payload", node.handle)))?;
        self.pipes[pipe_idx].partitions[node.partition as usize].install(
            node.handle,
            node.group,
            node.priority,
            span,
            payload,
            node.action,
            node.ttl,
        )?;
        self.locations
            .insert(node.handle, (pipe_idx as u32, node.partition));
        Ok(())
    }

    pub(crate) fn relocate_replayed(&mut self, node: &MoveNode) -> TcamResult<()> {
        let pipe_idx = self.pipe_index(node.pipe)?;
        let to = single_span(node, &node.new_spans)?;
        self.pipes[pipe_idx].partitions[node.partition as usize].relocate(node.handle, to)?;
        Ok(())
    }

    pub(crate) fn delete_replayed(&mut self, node: &MoveNode) -> TcamResult<()> {
        let pipe_idx = self.pipe_index(node.pipe)?;
        self.pipes[pipe_idx].partitions[node.partition as usize].remove(node.handle)?;
        self.locations.remove(&node.handle);
        Ok(())
    }

    pub(crate) fn modify_replayed(&mut self, node: &MoveNode) -> TcamResult<()> {
        let pipe_idx = self.pipe_index(node.pipe)?;
        let payload = node
            .payload
            .clone()
            .ok_or_else(|| TcamError::invalid(format!("modify node for {} lacks payload", node.handle)))?;
        let old = single_span(node, &node.old_spans)?;
        let new = single_span(node, &node.new_spans)?;
        let part = &mut self.pipes[pipe_idx].partitions[node.partition as usize];
        if old != new {
            part.remove(node.handle)?;
            part.install(
                node.handle,
                node.group,
                node.priority,
                new,
                payload,
                node.action,
                node.ttl,
            )?;
        } else {
            part.rewrite(node.handle, payload, node.action, node.ttl)?;
        }
        Ok(())
    }

    pub(crate) fn set_default_replayed(&mut self, node: &MoveNode) -> TcamResult<()> {
        let payload = node
            .payload
            .clone()
            .ok_or_else(|| TcamError::invalid("set-default node lacks payload"))?;
        self.set_default(node.pipe, node.handle, payload, node.action)
    }

    pub(crate) fn note_replay(&mut self) {
        self.stats.replays += 1;
    }
}

fn single_span(node: &MoveNode, spans: &[SlotSpan]) -> TcamResult<SlotSpan> {
    match spans {
        [span] => Ok(*span),
        _ => Err(TcamError::invalid(format!(
            "node for {} carries {} spans, expected 1",
            node.handle,
            spans.len()
        ))),
    }
}
