//! Run tracker: the source of truth for run status, progress and results.
//!
//! One [`RunRecord`] per run, keyed by a generated UUID. A record is written only by
//! whoever drives that run; every write happens under the map's per-entry lock, so
//! concurrent readers get either the old or the new record, never a torn one. Once a
//! record is `completed` or `failed` it no longer accepts writes.

mod record;

pub use record::{RunRecord, RunStatus, RunSummary};

use chrono::{Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::graph::ExecutionLogEntry;
use crate::state::WorkflowState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Write attempted on a run that already completed or failed.
    #[error("run already finished: {0}")]
    RunFinished(String),

    /// Eviction attempted on a run that is still pending or running.
    #[error("run still active: {0}")]
    RunActive(String),
}

#[derive(Debug, Default)]
pub struct RunTracker {
    runs: DashMap<String, RunRecord>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `pending` record and returns its new, unique run id.
    pub fn start(&self, graph_id: &str, initial_state: WorkflowState, estimated_steps: usize) -> String {
        loop {
            let run_id = Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = self.runs.entry(run_id.clone()) {
                slot.insert(RunRecord::new(
                    run_id.clone(),
                    graph_id,
                    initial_state,
                    estimated_steps,
                ));
                tracing::info!(run_id = %run_id, graph_id, "created run");
                return run_id;
            }
        }
    }

    /// Moves a pending run to `running`.
    pub fn mark_running(&self, run_id: &str) -> Result<(), TrackerError> {
        self.update(run_id, |record| record.status = RunStatus::Running)
    }

    /// Records one finished node execution and the state it produced.
    pub fn record_step(
        &self,
        run_id: &str,
        entry: &ExecutionLogEntry,
        state: &WorkflowState,
    ) -> Result<(), TrackerError> {
        self.update(run_id, |record| {
            record.status = RunStatus::Running;
            record.last_node = Some(entry.node.clone());
            record.log.push(entry.clone());
            record.state = state.clone();
            record.advance_progress(record.log.len());
        })?;
        tracing::debug!(run_id, node = %entry.node, step = entry.step, "recorded step");
        Ok(())
    }

    /// Terminal write: `completed`, 100%, final state and full log.
    pub fn complete(
        &self,
        run_id: &str,
        final_state: WorkflowState,
        log: Vec<ExecutionLogEntry>,
    ) -> Result<(), TrackerError> {
        self.update(run_id, |record| {
            record.status = RunStatus::Completed;
            record.progress_percent = 100;
            record.last_node = log.last().map(|e| e.node.clone()).or(record.last_node.take());
            record.state = final_state;
            record.log = log;
            record.ended_at = Some(Utc::now());
        })?;
        tracing::info!(run_id, "run completed");
        Ok(())
    }

    /// Terminal write: `failed` with `error`; the log recorded so far is kept.
    pub fn fail(&self, run_id: &str, error: impl Into<String>) -> Result<(), TrackerError> {
        let error = error.into();
        self.update(run_id, |record| {
            record.status = RunStatus::Failed;
            record.error = Some(error.clone());
            record.ended_at = Some(Utc::now());
        })?;
        tracing::error!(run_id, %error, "run failed");
        Ok(())
    }

    /// Snapshot of the run's record.
    pub fn get(&self, run_id: &str) -> Result<RunRecord, TrackerError> {
        self.runs
            .get(run_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| TrackerError::RunNotFound(run_id.to_string()))
    }

    /// Summaries of all known runs, oldest first.
    pub fn list(&self) -> Vec<RunSummary> {
        let mut out: Vec<RunSummary> = self.runs.iter().map(|r| r.summary()).collect();
        out.sort_by_key(|s| s.started_at);
        out
    }

    /// Removes a finished run and returns its final record.
    pub fn evict(&self, run_id: &str) -> Result<RunRecord, TrackerError> {
        match self
            .runs
            .remove_if(run_id, |_, record| record.status.is_terminal())
        {
            Some((_, record)) => Ok(record),
            None if self.runs.contains_key(run_id) => {
                Err(TrackerError::RunActive(run_id.to_string()))
            }
            None => Err(TrackerError::RunNotFound(run_id.to_string())),
        }
    }

    /// Drops finished runs that ended more than `max_age` ago. Returns how many were removed.
    pub fn prune_finished(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let before = self.runs.len();
        self.runs
            .retain(|_, record| !matches!(record.ended_at, Some(end) if end < cutoff));
        let removed = before.saturating_sub(self.runs.len());
        if removed > 0 {
            tracing::info!(removed, "pruned finished runs");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn update<F>(&self, run_id: &str, f: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut RunRecord),
    {
        let mut record = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| TrackerError::RunNotFound(run_id.to_string()))?;
        if record.status.is_terminal() {
            return Err(TrackerError::RunFinished(run_id.to_string()));
        }
        f(record.value_mut());
        Ok(())
    }
}
