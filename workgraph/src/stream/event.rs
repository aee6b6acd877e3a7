//! Execution events published while runs progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::ExecutionLogEntry;
use crate::state::WorkflowState;

/// Event kind, serialized with its wire name (`RUN_STARTED`, `NODE_START`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    RunStarted,
    NodeStart,
    NodeCompleted,
    RunCompleted,
    RunFailed,
}

impl EventKind {
    /// `RUN_COMPLETED` and `RUN_FAILED` close a run's event sequence.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::RunCompleted | EventKind::RunFailed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RunStarted => "RUN_STARTED",
            EventKind::NodeStart => "NODE_START",
            EventKind::NodeCompleted => "NODE_COMPLETED",
            EventKind::RunCompleted => "RUN_COMPLETED",
            EventKind::RunFailed => "RUN_FAILED",
        }
    }
}

/// Loop-progress fields of the state a node produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub current_length: i64,
    pub refinement_iterations: i64,
}

impl From<&WorkflowState> for StateSnapshot {
    fn from(state: &WorkflowState) -> Self {
        Self {
            current_length: state.current_length,
            refinement_iterations: state.refinement_iterations,
        }
    }
}

/// One event of a run. Node fields are set only for node events; `error` only for `RUN_FAILED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    #[serde(rename = "event")]
    pub kind: EventKind,
    pub run_id: String,
    pub graph_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_snapshot: Option<StateSnapshot>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    fn bare(kind: EventKind, run_id: &str, graph_id: &str) -> Self {
        Self {
            kind,
            run_id: run_id.to_string(),
            graph_id: graph_id.to_string(),
            node: None,
            iteration: None,
            step: None,
            duration_ms: None,
            error: None,
            state_snapshot: None,
            timestamp: Utc::now(),
        }
    }

    pub fn run_started(run_id: &str, graph_id: &str) -> Self {
        Self::bare(EventKind::RunStarted, run_id, graph_id)
    }

    pub fn node_start(run_id: &str, graph_id: &str, node: &str, iteration: u32, step: usize) -> Self {
        Self {
            node: Some(node.to_string()),
            iteration: Some(iteration),
            step: Some(step),
            ..Self::bare(EventKind::NodeStart, run_id, graph_id)
        }
    }

    pub fn node_completed(
        run_id: &str,
        graph_id: &str,
        entry: &ExecutionLogEntry,
        state: &WorkflowState,
    ) -> Self {
        Self {
            node: Some(entry.node.clone()),
            iteration: Some(entry.iteration),
            step: Some(entry.step),
            duration_ms: Some(entry.duration_ms),
            state_snapshot: Some(StateSnapshot::from(state)),
            ..Self::bare(EventKind::NodeCompleted, run_id, graph_id)
        }
    }

    pub fn run_completed(run_id: &str, graph_id: &str) -> Self {
        Self::bare(EventKind::RunCompleted, run_id, graph_id)
    }

    pub fn run_failed(run_id: &str, graph_id: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::bare(EventKind::RunFailed, run_id, graph_id)
        }
    }
}
