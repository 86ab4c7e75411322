//! Entry handles and the handle-allocator interface.
//!
//! A [`RuleHandle`] is the caller-visible identity of a rule. It is stable
//! across relocations: compaction may move a rule between physical slots,
//! but its handle never changes. The engine treats handles as opaque keys
//! and never inspects their bit layout.

use crate::error::{TcamError, TcamResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier for one logical rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleHandle(u64);

impl RuleHandle {
    pub const fn from_raw(raw: u64) -> Self {
        RuleHandle(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hdl-0x{:x}", self.0)
    }
}

/// Allocator for entry handles.
///
/// The engine only requires that handles are unique while allocated and
/// remain valid until released.
pub trait HandleAllocator {
    /// Allocates a fresh handle, or `NoSpace` when the handle space is
    /// exhausted.
    fn allocate(&mut self) -> TcamResult<RuleHandle>;

    /// Releases a previously allocated handle.
    fn release(&mut self, handle: RuleHandle) -> TcamResult<()>;

    /// Returns true if the handle is currently allocated.
    fn is_set(&self, handle: RuleHandle) -> bool;
}

/// Bitmap-backed handle allocator with monotonic scan-forward behavior.
///
/// Handles are reused only after release, and allocation prefers the lowest
/// free id at or after the most recently allocated one, so recently freed
/// ids are not handed back immediately.
#[derive(Debug, Clone)]
pub struct BitmapHandleAllocator {
    words: Vec<u64>,
    capacity: u64,
    next: u64,
    allocated: u64,
}

impl BitmapHandleAllocator {
    pub fn new(capacity: u64) -> Self {
        let nwords = capacity.div_ceil(64) as usize;
        Self {
            words: vec![0; nwords],
            capacity,
            next: 0,
            allocated: 0,
        }
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    fn bit(&self, id: u64) -> bool {
        self.words[(id / 64) as usize] & (1u64 << (id % 64)) != 0
    }

    fn set_bit(&mut self, id: u64, value: bool) {
        let word = &mut self.words[(id / 64) as usize];
        if value {
            *word |= 1u64 << (id % 64);
        } else {
            *word &= !(1u64 << (id % 64));
        }
    }
}

impl HandleAllocator for BitmapHandleAllocator {
    fn allocate(&mut self) -> TcamResult<RuleHandle> {
        if self.allocated >= self.capacity {
            return Err(TcamError::NoSpace);
        }
        // Scan forward from `next`, wrapping once.
        for probe in 0..self.capacity {
            let id = (self.next + probe) % self.capacity;
            if !self.bit(id) {
                self.set_bit(id, true);
                self.allocated += 1;
                self.next = (id + 1) % self.capacity;
                return Ok(RuleHandle::from_raw(id));
            }
        }
        Err(TcamError::NoSpace)
    }

    fn release(&mut self, handle: RuleHandle) -> TcamResult<()> {
        let id = handle.as_raw();
        if id >= self.capacity || !self.bit(id) {
            return Err(TcamError::invalid(format!("release of unallocated {}", handle)));
        }
        self.set_bit(id, false);
        self.allocated -= 1;
        Ok(())
    }

    fn is_set(&self, handle: RuleHandle) -> bool {
        let id = handle.as_raw();
        id < self.capacity && self.bit(id)
    }
}
