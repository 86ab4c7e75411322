//! Table and pipe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical match-table identifier, assigned by the table registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(u32);

impl TableId {
    pub const fn from_raw(id: u32) -> Self {
        TableId(id)
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table-{}", self.0)
    }
}

/// Target pipe for a table operation.
///
/// Symmetric tables are programmed identically across pipes and address a
/// single shared instance via [`PipeId::All`]; asymmetric tables address one
/// replica per pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipeId {
    /// All pipes (the single instance of a symmetric table).
    All,
    /// One specific pipe.
    Pipe(u32),
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeId::All => write!(f, "all-pipes"),
            PipeId::Pipe(p) => write!(f, "pipe-{}", p),
        }
    }
}
