//! Common types for TCAM rule placement.
//!
//! This crate provides the vocabulary shared between the placement engine
//! and its collaborators:
//!
//! - [`RuleHandle`], [`TableId`], [`PipeId`]: stable identifiers
//! - [`TcamError`]: the error taxonomy for all placement operations
//! - [`PhysLocation`] / [`LocationMapper`]: logical-to-physical slot mapping
//! - [`HandleAllocator`]: entry-handle allocation interface
//! - [`RangeExpander`]: logical-rule to physical-slot expansion interface
//!
//! The placement engine treats every collaborator as a pure, synchronous
//! interface; the default implementations here exist for tests and for
//! callers that need nothing chip-specific.

mod error;
mod expand;
mod handle;
mod ids;
mod location;
mod payload;

pub use error::{TcamError, TcamResult};
pub use expand::{FixedWidthExpander, RangeExpander, RangeExpansion, SingleSlotExpander};
pub use handle::{BitmapHandleAllocator, HandleAllocator, RuleHandle};
pub use ids::{PipeId, TableId};
pub use location::{LinearLocationMapper, LocationMapper, PhysLocation};
pub use payload::{ActionRef, RulePayload};

/// Priority value within a group. Smaller values rank first and therefore
/// occupy smaller slot indices.
pub type Priority = u32;

/// Coarse priority namespace. Priorities are only compared within a group.
pub type GroupId = u32;

/// Logical slot index within one partition's slot store.
pub type SlotIndex = usize;
