//! # workgraph
//!
//! A graph workflow engine. A workflow is a directed graph of named nodes; each node
//! reads the shared [`WorkflowState`] and returns a new one. Edges may be guarded by
//! named conditions, so graphs can loop until a condition stops holding. A global step
//! ceiling bounds every run.
//!
//! ## Main Modules
//!
//! - [`state`]: `WorkflowState`, the copy-on-write state every node transforms.
//! - [`registry`]: `NodeRegistry`, node implementations and edge conditions by name.
//! - [`graph`]: `GraphDefinition`, validation, `CompiledGraph` execution and its log.
//! - [`tracker`]: `RunTracker`, status, progress and results of every run.
//! - [`stream`]: `EventBroadcaster`, live execution events per graph or per run.
//! - [`runner`]: `JobRunner`, synchronous and background execution.
//! - [`engine`]: `Engine`, the facade tying the above together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use workgraph::{Engine, EngineConfig, GraphDefinition, NodeRegistry, WorkflowState};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = NodeRegistry::new();
//! registry.register_fn("shout", |s: &WorkflowState| {
//!     Ok(WorkflowState { text: s.text.to_uppercase(), ..s.clone() })
//! })?;
//!
//! let engine = Engine::new(registry, EngineConfig::from_env());
//! let mut def = GraphDefinition::new("shout");
//! def.add_node("shout");
//! let graph_id = engine.register_graph(def)?;
//!
//! let input = serde_json::json!({ "text": "hello" });
//! let record = engine.run(&graph_id, input.as_object().cloned().unwrap_or_default()).await?;
//! assert_eq!(record.state.text, "HELLO");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod registry;
pub mod runner;
pub mod state;
pub mod stream;
pub mod tracker;

pub use config::EngineConfig;
pub use engine::{Engine, GraphRecord, GraphSummary};
pub use error::{EngineError, ExecutionError, NodeError};
pub use graph::{
    CompiledGraph, Condition, Edge, ExecutionFailure, ExecutionLogEntry, ExecutionObserver,
    ExecutionOutcome, FnNode, GraphDefinition, GraphValidationError, Next, Node, TieBreak,
    ValidationIssue,
};
pub use registry::{NodeRegistry, RegistryError};
pub use runner::JobRunner;
pub use state::{StateError, WorkflowState};
pub use stream::{EventBroadcaster, EventKind, ExecutionEvent, StateSnapshot, Subscription, Topic};
pub use tracker::{RunRecord, RunStatus, RunSummary, RunTracker, TrackerError};
