//! # Engine Error Types
//!
//! All errors surfaced by the engine to its caller.

use thiserror::Error;

/// Errors that can occur while mutating or ticking an [`Engine`](crate::Engine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Attempted to add an entity that is already registered with this engine.
    ///
    /// Registration is checked by entity identity, not by id.
    #[error("entity {id} is already registered with this engine")]
    AlreadyRegistered {
        /// Id of the offending entity at the time of the attempt.
        id: u64,
    },

    /// `update` was called while an update was already in progress.
    #[error("cannot call update() on an engine that is already updating")]
    ReentrantUpdate,
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
