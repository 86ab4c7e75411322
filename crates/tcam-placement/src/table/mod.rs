//! Logical tables and their registry.
//!
//! A [`TcamTable`] composes per-pipe, per-partition slot stores under one
//! handle and routes every lifecycle operation to the right partition
//! (based on the partition key in the rule payload). The [`TableRegistry`]
//! owns the tables and hands out ids.
//!
//! # Key Components
//!
//! - [`TableConfig`]: table geometry and behavior, builder style
//! - [`Partition`]: slot store + priority index + span map, kept consistent
//! - [`TcamTable`]: add/delete/modify/default-rule operations and sessions
//! - [`TableRegistry`]: table lookup and lifetime

mod config;
mod partition;
mod registry;
mod tcam_table;

pub use config::{MatchKind, PlacementStats, TableConfig};
pub use partition::Partition;
pub use registry::TableRegistry;
pub use tcam_table::{PipeInstance, TcamTable};
