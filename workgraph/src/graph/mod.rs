//! Workflow graph: definition + validation, compile, and execution.
//!
//! Describe the graph with [`GraphDefinition`] (nodes, ordered candidate edges, entry
//! point), `compile` it against a [`NodeRegistry`](crate::NodeRegistry), then `invoke`
//! the resulting [`CompiledGraph`] with an initial state.

mod compiled;
mod definition;
mod execution_log;
pub mod logging;
mod next;
mod node;
mod observer;
mod validation_error;

pub use compiled::{
    CompiledGraph, ExecutionFailure, ExecutionOutcome, TieBreak, DEFAULT_MAX_STEPS,
};
pub use definition::{validate, Edge, GraphDefinition};
pub use execution_log::{node_sequence, ExecutionLogEntry};
pub use next::Next;
pub use node::{Condition, ConditionRef, FnNode, Node, NodeRef};
pub use observer::ExecutionObserver;
pub use validation_error::{GraphValidationError, ValidationIssue};
