//! TCAM placement and compaction engine.
//!
//! This crate manages the placement of priority-ordered match rules into
//! fixed-capacity ternary match arrays of a programmable forwarding ASIC.
//! Rules occupy physical slots in an order consistent with their match
//! priority (lower slot index is evaluated first); the engine keeps that
//! ordering across insertions, deletions, modifications, and multi-slot
//! range rules, relocating existing rules (compaction) when no suitable
//! free slot exists.
//!
//! # Architecture
//!
//! ```text
//! [caller intent] ──> [TcamTable] ──> [Planner] ──> [MoveList] ──> hardware apply
//!                        │               │
//!                        ├─ Partition ───┴─ SlotStore + PrioIndex
//!                        ├─ ShadowStore (session backup/abort)
//!                        └─ restart::{replay, reconcile}
//! ```
//!
//! # Key Components
//!
//! - [`slot_store::SlotStore`]: fixed array of rule slots plus used bitmap
//! - [`prio_index::PrioIndex`]: per-group priority-to-slot-range index
//! - [`placement::Planner`]: free-slot search and compaction planning
//! - [`move_list::MoveList`]: ordered move records for the apply layer
//! - [`table::TcamTable`] / [`table::TableRegistry`]: lifecycle operations,
//!   sessions, partition routing
//! - [`restart`]: warm-restart replay and desired/observed reconciliation
//!
//! The engine performs no I/O and no locking; one session mutates one table
//! at a time under external synchronization. Hardware programming is the
//! consumer's job: the contract ends at handing over a complete, internally
//! consistent [`move_list::MoveList`].

pub mod move_list;
pub mod placement;
pub mod prio_index;
pub mod restart;
pub mod rule;
pub mod slot_store;
pub mod table;
pub mod txn;

pub use move_list::{MoveList, MoveNode, MoveOp, SlotSpan};
pub use placement::{Placement, Planner, UnitMove};
pub use prio_index::{PrioIndex, PrioRange};
pub use restart::{reconcile, replay, DesiredEntry, DesiredView, ObservedEntry, ObservedView};
pub use rule::{DefaultRule, DefaultRuleKind, Rule};
pub use slot_store::SlotStore;
pub use table::{MatchKind, Partition, PlacementStats, TableConfig, TableRegistry, TcamTable};
pub use txn::{SessionState, ShadowStore, SlotKey};
