//! Per-step hook into the executor.
//!
//! The executor calls the observer synchronously between nodes; implementations must
//! not block (the job runner's observer only touches the tracker map and does
//! non-blocking publishes).

use crate::state::WorkflowState;

use super::ExecutionLogEntry;

pub trait ExecutionObserver: Send + Sync {
    /// Called right before `node` runs.
    fn node_started(&self, _node: &str, _iteration: u32, _step: usize) {}

    /// Called after `node` returned, with its log entry and the state it produced.
    fn node_completed(&self, _entry: &ExecutionLogEntry, _state: &WorkflowState) {}
}

/// No-op observer used by plain `invoke`.
impl ExecutionObserver for () {}
