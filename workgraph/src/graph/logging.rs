//! Logging utilities for graph execution.
//!
//! Structured `tracing` events for graph start/finish, node start/finish and errors.

use crate::error::ExecutionError;

use super::execution_log::node_sequence;
use super::{ExecutionLogEntry, Next};

/// Log graph execution start.
pub fn log_graph_start(entry_point: &str) {
    tracing::info!(entry_point = entry_point, "Starting graph execution");
}

/// Log node execution start.
pub fn log_node_start(node: &str, iteration: u32) {
    tracing::debug!(node = node, iteration, "Starting node execution");
}

/// Log node execution completion with the routing hint it returned.
pub fn log_node_complete(entry: &ExecutionLogEntry, next: &Next) {
    tracing::debug!(
        node = %entry.node,
        iteration = entry.iteration,
        duration_ms = entry.duration_ms,
        ?next,
        "Node execution complete"
    );
}

/// Log graph completion with the visited path.
pub fn log_graph_complete(log: &[ExecutionLogEntry]) {
    tracing::info!(
        steps = log.len(),
        path = %node_sequence(log).join(" -> "),
        "Graph execution complete"
    );
}

/// Log graph execution error.
pub fn log_graph_error(error: &ExecutionError) {
    tracing::error!(%error, "Graph execution error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn test_logging_functions() {
        // These should not panic without a subscriber installed
        let entry = ExecutionLogEntry::new("test_node", Utc::now(), Duration::ZERO, 1, 1);
        log_graph_start("test_node");
        log_node_start("test_node", 1);
        log_node_complete(&entry, &Next::End);
        log_graph_complete(&[entry]);
        log_graph_error(&ExecutionError::LimitExceeded { limit: 1 });
    }
}
