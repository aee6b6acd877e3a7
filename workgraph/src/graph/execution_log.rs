//! Execution log entries: one per node execution, append-only per run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one node execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub node: String,
    /// Wall-clock time the node started.
    #[serde(rename = "timestamp")]
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds, rounded to two decimals.
    pub duration_ms: f64,
    /// How many times this node has fired in this run, starting at 1.
    pub iteration: u32,
    /// Position of this execution in the whole run, starting at 1.
    pub step: usize,
}

impl ExecutionLogEntry {
    pub fn new(
        node: impl Into<String>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        iteration: u32,
        step: usize,
    ) -> Self {
        Self {
            node: node.into(),
            started_at,
            duration_ms: (elapsed.as_secs_f64() * 100_000.0).round() / 100.0,
            iteration,
            step,
        }
    }
}

/// Node names of `log` in execution order.
pub fn node_sequence(log: &[ExecutionLogEntry]) -> Vec<&str> {
    log.iter().map(|e| e.node.as_str()).collect()
}
