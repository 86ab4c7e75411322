//! Error taxonomy for placement operations.
//!
//! Every fallible operation in the placement engine returns [`TcamResult`].
//! The variants map one-to-one onto the outcomes a caller can act on:
//! `NoSpace` and `InvalidArgument` are returned without side effects,
//! `Unexpected` marks an internal consistency violation and is fatal to the
//! operation (the enclosing session can still abort cleanly).

use thiserror::Error;

/// Errors produced by the placement engine and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TcamError {
    /// Bad group/priority/size, unknown handle, or malformed payload.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The table is not fully initialized. Propagated from collaborators,
    /// never generated by the core.
    #[error("table not ready")]
    NotReady,

    /// Placement is infeasible within the table's capacity. Not retryable
    /// without freeing entries first.
    #[error("no space left for placement")]
    NoSpace,

    /// An internal invariant was violated. This is a programming-error
    /// class and is never expected in correct operation.
    #[error("internal inconsistency: {0}")]
    Unexpected(String),

    /// A collaborator failed to acquire a required lock. Never generated
    /// by the core.
    #[error("lock acquisition failed")]
    LockFailed,
}

/// Result alias used throughout the placement engine.
pub type TcamResult<T> = Result<T, TcamError>;

impl TcamError {
    /// Shorthand for an `InvalidArgument` with a formatted message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        TcamError::InvalidArgument(msg.into())
    }

    /// Shorthand for an `Unexpected` with a formatted message.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        TcamError::Unexpected(msg.into())
    }

    /// Returns true for errors that leave caller-visible state untouched.
    pub fn is_side_effect_free(&self) -> bool {
        matches!(
            self,
            TcamError::InvalidArgument(_) | TcamError::NoSpace | TcamError::NotReady
        )
    }
}
