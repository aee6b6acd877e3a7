//! Compiled graph: immutable, validated, executable.
//!
//! Built by `GraphDefinition::compile`. Runs from the entry point one node at a time;
//! after each node, routing uses the node's returned [`Next`] and the candidate edges
//! of the current node. A global step counter bounds every run regardless of what
//! the nodes or conditions do.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ExecutionError, NodeError};
use crate::registry::NodeRegistry;
use crate::state::WorkflowState;

use super::logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
};
use super::{Edge, ExecutionLogEntry, ExecutionObserver, GraphDefinition, Next};

/// Default ceiling on node executions per run.
pub const DEFAULT_MAX_STEPS: usize = 1000;

/// Which candidate wins when several guarded edges hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest listed candidate wins.
    #[default]
    FirstListed,
    /// Latest listed candidate wins.
    LastListed,
}

/// Final state and full log of a completed run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
}

/// A failed run: the error plus the last good state and the log up to the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    #[source]
    pub error: ExecutionError,
    pub state: WorkflowState,
    pub log: Vec<ExecutionLogEntry>,
}

/// Compiled graph: immutable structure shared by any number of concurrent runs.
///
/// **Interaction**: Holds the definition and the registry view it was validated
/// against; `JobRunner` drives it with an observer that feeds the tracker and the
/// event broadcaster.
#[derive(Clone)]
pub struct CompiledGraph {
    definition: Arc<GraphDefinition>,
    registry: Arc<NodeRegistry>,
    max_steps: usize,
    tie_break: TieBreak,
}

impl CompiledGraph {
    pub(super) fn new(definition: Arc<GraphDefinition>, registry: Arc<NodeRegistry>) -> Self {
        Self {
            definition,
            registry,
            max_steps: DEFAULT_MAX_STEPS,
            tie_break: TieBreak::default(),
        }
    }

    /// Sets the loop-guard ceiling (total node executions per run).
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn definition(&self) -> &GraphDefinition {
        &self.definition
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Runs the graph to completion with no observer.
    pub async fn invoke(&self, state: WorkflowState) -> Result<ExecutionOutcome, ExecutionFailure> {
        self.invoke_observed(state, &()).await
    }

    /// Runs the graph, reporting each step to `observer`.
    ///
    /// On failure the returned [`ExecutionFailure`] keeps every log entry recorded
    /// before the failing step and the state those steps produced.
    pub async fn invoke_observed(
        &self,
        state: WorkflowState,
        observer: &dyn ExecutionObserver,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        let mut state = state;
        let mut log = Vec::new();
        match self.run_loop(&mut state, &mut log, observer).await {
            Ok(()) => Ok(ExecutionOutcome { state, log }),
            Err(error) => {
                log_graph_error(&error);
                Err(ExecutionFailure { error, state, log })
            }
        }
    }

    async fn run_loop(
        &self,
        state: &mut WorkflowState,
        log: &mut Vec<ExecutionLogEntry>,
        observer: &dyn ExecutionObserver,
    ) -> Result<(), ExecutionError> {
        let mut iterations: HashMap<String, u32> = HashMap::new();
        let mut current = Some(self.definition.entry_point.clone());
        log_graph_start(&self.definition.entry_point);

        while let Some(node_id) = current {
            if log.len() >= self.max_steps {
                return Err(ExecutionError::LimitExceeded {
                    limit: self.max_steps,
                });
            }
            let node = self
                .registry
                .lookup(&node_id)
                .map_err(|_| ExecutionError::UnknownNode(node_id.clone()))?;

            let step = log.len() + 1;
            let counter = iterations.entry(node_id.clone()).or_insert(0);
            *counter += 1;
            let iteration = *counter;

            observer.node_started(&node_id, iteration, step);
            log_node_start(&node_id, iteration);
            let started_at = Utc::now();
            let timer = Instant::now();

            let (new_state, next) = node.run(state).await.map_err(|e| match e {
                NodeError::State(source) => ExecutionError::InvalidField {
                    node: node_id.clone(),
                    source,
                },
                NodeError::ExecutionFailed(message) => ExecutionError::NodeFailed {
                    node: node_id.clone(),
                    message,
                },
            })?;

            let entry =
                ExecutionLogEntry::new(node_id.as_str(), started_at, timer.elapsed(), iteration, step);
            *state = new_state;
            log_node_complete(&entry, &next);
            observer.node_completed(&entry, state);
            log.push(entry);

            current = self.next_node(&node_id, state, next)?;
        }

        log_graph_complete(log);
        Ok(())
    }

    /// Picks the successor of `from` given the node's hint and the current state.
    fn next_node(
        &self,
        from: &str,
        state: &WorkflowState,
        next: Next,
    ) -> Result<Option<String>, ExecutionError> {
        let candidates = self.definition.candidates(from);
        match next {
            Next::End => Ok(None),
            Next::Node(hint) => {
                if candidates.iter().any(|e| e.to == hint) {
                    Ok(Some(hint))
                } else {
                    Err(ExecutionError::InvalidTransition {
                        from: from.to_string(),
                        hint,
                    })
                }
            }
            Next::Continue => {
                let mut ordered: Vec<&Edge> = candidates.iter().collect();
                if self.tie_break == TieBreak::LastListed {
                    ordered.reverse();
                }
                for edge in ordered {
                    if self.edge_holds(from, edge, state)? {
                        return Ok(Some(edge.to.clone()));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Unguarded edges always hold; guarded edges ask their registered condition.
    fn edge_holds(
        &self,
        from: &str,
        edge: &Edge,
        state: &WorkflowState,
    ) -> Result<bool, ExecutionError> {
        let Some(name) = &edge.when else {
            return Ok(true);
        };
        let condition =
            self.registry
                .condition(name)
                .ok_or_else(|| ExecutionError::UnknownCondition {
                    from: from.to_string(),
                    to: edge.to.clone(),
                    condition: name.clone(),
                })?;
        Ok(condition.holds(state))
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("definition", &self.definition)
            .field("max_steps", &self.max_steps)
            .field("tie_break", &self.tie_break)
            .finish()
    }
}
