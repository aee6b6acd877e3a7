//! Run record: status, progress and result of one execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::ExecutionLogEntry;
use crate::state::WorkflowState;

/// Lifecycle of a run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Everything known about one run. Snapshots handed out by the tracker are clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub graph_id: String,
    pub status: RunStatus,
    pub progress_percent: u8,
    pub last_node: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Latest state: the initial state until the first step, the final state once completed.
    pub state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
    /// Step count the progress heuristic measures against.
    pub estimated_steps: usize,
}

impl RunRecord {
    pub(super) fn new(
        run_id: String,
        graph_id: &str,
        state: WorkflowState,
        estimated_steps: usize,
    ) -> Self {
        Self {
            run_id,
            graph_id: graph_id.to_string(),
            status: RunStatus::Pending,
            progress_percent: 0,
            last_node: None,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
            state,
            log: Vec::new(),
            estimated_steps,
        }
    }

    /// Progress after `steps` executions: proportional to the estimate, held at 99
    /// until the run completes, and never lower than what was already reported.
    pub(super) fn advance_progress(&mut self, steps: usize) {
        let estimate = self.estimated_steps.max(1);
        let pct = (steps.saturating_mul(100) / estimate).min(99) as u8;
        self.progress_percent = self.progress_percent.max(pct);
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            graph_id: self.graph_id.clone(),
            status: self.status,
            progress_percent: self.progress_percent,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Compact listing entry for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub graph_id: String,
    pub status: RunStatus,
    pub progress_percent: u8,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Progress is capped at 99 and never decreases.
    #[test]
    fn progress_capped_and_monotonic() {
        let mut r = RunRecord::new("r".into(), "g", WorkflowState::default(), 4);
        r.advance_progress(1);
        assert_eq!(r.progress_percent, 25);
        r.advance_progress(4);
        assert_eq!(r.progress_percent, 99);
        r.advance_progress(9);
        assert_eq!(r.progress_percent, 99);
        r.advance_progress(2);
        assert_eq!(r.progress_percent, 99, "must not go backwards");
    }

    /// **Scenario**: Zero estimate does not divide by zero.
    #[test]
    fn zero_estimate_is_safe() {
        let mut r = RunRecord::new("r".into(), "g", WorkflowState::default(), 0);
        r.advance_progress(1);
        assert_eq!(r.progress_percent, 99);
    }

    /// **Scenario**: Status serializes in lowercase and only completed/failed are terminal.
    #[test]
    fn status_wire_names_and_terminality() {
        assert_eq!(serde_json::to_value(RunStatus::Running).unwrap(), "running");
        assert_eq!(RunStatus::Failed.as_str(), "failed");
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
