//! Error types shared across the engine.
//!
//! [`NodeError`] is what node functions return; [`ExecutionError`] is what a run
//! fails with; [`EngineError`] is what the boundary facade surfaces to callers.

use thiserror::Error;

use crate::graph::GraphValidationError;
use crate::state::StateError;
use crate::tracker::TrackerError;

/// Error returned by a node function.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node failed with a message (bad input, external step failed, ...).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The node tried to derive a state with an invalid field or value.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Why a single run terminated in `Failed`.
///
/// Every variant is fatal to that run only; sibling runs and the broadcaster are unaffected.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The current node is not in the registry. Unreachable for validated graphs.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// An edge names a condition missing from the registry. Unreachable for validated graphs.
    #[error("unknown condition '{condition}' on edge {from} -> {to}")]
    UnknownCondition {
        from: String,
        to: String,
        condition: String,
    },

    /// A node produced a state update naming a field that does not exist.
    #[error("node '{node}' produced an invalid state update: {source}")]
    InvalidField {
        node: String,
        #[source]
        source: StateError,
    },

    /// A node hinted a successor that is not among its declared candidates.
    #[error("node '{from}' requested transition to '{hint}', which is not a declared successor")]
    InvalidTransition { from: String, hint: String },

    /// The loop guard tripped.
    #[error("execution exceeded maximum steps ({limit}); possible infinite loop")]
    LimitExceeded { limit: usize },

    /// The node function returned an error.
    #[error("node '{node}' failed: {message}")]
    NodeFailed { node: String, message: String },

    /// The task driving the run panicked.
    #[error("run panicked: {0}")]
    Panicked(String),
}

/// Error surfaced by [`Engine`](crate::Engine) to its callers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("graph not found: {0}")]
    UnknownGraph(String),

    #[error(transparent)]
    Validation(#[from] GraphValidationError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("invalid input: {0}")]
    State(#[from] StateError),
}

impl EngineError {
    /// True when the caller referenced a graph or run id that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownGraph(_) | EngineError::Tracker(TrackerError::RunNotFound(_))
        )
    }
}
