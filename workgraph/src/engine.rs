//! Engine facade: the boundary the HTTP layer (or any caller) talks to.
//!
//! Owns the shared registry, the compiled graphs, the run tracker and the event
//! broadcaster. Graph registration validates and compiles once; every run of that
//! graph shares the compiled structure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::{CompiledGraph, GraphDefinition, GraphValidationError};
use crate::registry::NodeRegistry;
use crate::runner::JobRunner;
use crate::state::WorkflowState;
use crate::stream::{EventBroadcaster, Subscription, Topic};
use crate::tracker::{RunRecord, RunSummary, RunTracker};

/// A registered graph.
#[derive(Debug, Clone)]
pub struct GraphRecord {
    pub graph_id: String,
    pub graph: Arc<CompiledGraph>,
    pub created_at: DateTime<Utc>,
}

impl GraphRecord {
    pub fn new(graph_id: impl Into<String>, graph: CompiledGraph) -> Self {
        Self {
            graph_id: graph_id.into(),
            graph: Arc::new(graph),
            created_at: Utc::now(),
        }
    }

    pub fn definition(&self) -> &GraphDefinition {
        self.graph.definition()
    }

    pub fn summary(&self) -> GraphSummary {
        let def = self.definition();
        GraphSummary {
            graph_id: self.graph_id.clone(),
            nodes: def.nodes.clone(),
            entry_point: def.entry_point.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub graph_id: String,
    pub nodes: Vec<String>,
    pub entry_point: String,
    pub created_at: DateTime<Utc>,
}

pub struct Engine {
    registry: Arc<NodeRegistry>,
    config: EngineConfig,
    graphs: DashMap<String, GraphRecord>,
    tracker: Arc<RunTracker>,
    broadcaster: EventBroadcaster,
    runner: JobRunner,
}

impl Engine {
    /// Creates an engine over a fully populated registry. The registry is frozen from here on.
    pub fn new(registry: NodeRegistry, config: EngineConfig) -> Self {
        let tracker = Arc::new(RunTracker::new());
        let broadcaster = EventBroadcaster::new(config.event_buffer);
        let runner = JobRunner::new(Arc::clone(&tracker), broadcaster.clone());
        Self {
            registry: Arc::new(registry),
            config,
            graphs: DashMap::new(),
            tracker,
            broadcaster,
            runner,
        }
    }

    /// Validates and compiles `definition`; returns the new graph id.
    pub fn register_graph(&self, definition: GraphDefinition) -> Result<String, GraphValidationError> {
        let compiled = definition
            .compile(Arc::clone(&self.registry))?
            .with_max_steps(self.config.max_steps)
            .with_tie_break(self.config.tie_break);
        let graph_id = Uuid::new_v4().to_string();
        tracing::info!(
            graph_id = %graph_id,
            nodes = compiled.definition().nodes.len(),
            "registered graph"
        );
        self.graphs
            .insert(graph_id.clone(), GraphRecord::new(graph_id.clone(), compiled));
        Ok(graph_id)
    }

    pub fn graph(&self, graph_id: &str) -> Result<GraphRecord, EngineError> {
        self.graphs
            .get(graph_id)
            .map(|g| g.value().clone())
            .ok_or_else(|| EngineError::UnknownGraph(graph_id.to_string()))
    }

    /// All registered graphs, oldest first.
    pub fn graphs(&self) -> Vec<GraphSummary> {
        let mut out: Vec<GraphSummary> = self.graphs.iter().map(|g| g.summary()).collect();
        out.sort_by_key(|g| g.created_at);
        out
    }

    /// Runs `graph_id` on `input` to its end and returns the terminal run record.
    ///
    /// A run that fails is still `Ok`: its record has status `failed` and the error.
    pub async fn run(&self, graph_id: &str, input: Map<String, Value>) -> Result<RunRecord, EngineError> {
        let graph = self.graph(graph_id)?;
        let state = WorkflowState::from_input(input)?;
        Ok(self.runner.run_sync(&graph, state).await?)
    }

    /// Starts `graph_id` on `input` in the background and returns the run id.
    pub fn run_async(&self, graph_id: &str, input: Map<String, Value>) -> Result<String, EngineError> {
        let graph = self.graph(graph_id)?;
        let state = WorkflowState::from_input(input)?;
        Ok(self.runner.submit(&graph, state))
    }

    pub fn run_record(&self, run_id: &str) -> Result<RunRecord, EngineError> {
        Ok(self.tracker.get(run_id)?)
    }

    pub fn runs(&self) -> Vec<RunSummary> {
        self.tracker.list()
    }

    /// Forgets a finished run.
    pub fn evict_run(&self, run_id: &str) -> Result<RunRecord, EngineError> {
        Ok(self.tracker.evict(run_id)?)
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.broadcaster.subscribe(topic)
    }

    pub fn tracker(&self) -> &Arc<RunTracker> {
        &self.tracker
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("graphs", &self.graphs.len())
            .field("runs", &self.tracker.len())
            .finish()
    }
}
