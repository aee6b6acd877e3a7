//! Node and condition seams: the opaque callables the engine executes.
//!
//! A node reads the current state by reference and returns a fresh state plus a
//! routing [`Next`]. Nodes never see engine-owned data (log, counters, tracker).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinError;

use crate::error::NodeError;
use crate::state::WorkflowState;

use super::Next;

/// One named step of a workflow.
///
/// **Interaction**: Registered in [`NodeRegistry`](crate::NodeRegistry) under a name;
/// executed by [`CompiledGraph`](super::CompiledGraph) one at a time per run.
#[async_trait]
pub trait Node: Send + Sync {
    /// Transforms `state` into a new state and optionally hints the next node.
    async fn run(&self, state: &WorkflowState) -> Result<(WorkflowState, Next), NodeError>;
}

type TransformFn = dyn Fn(&WorkflowState) -> Result<WorkflowState, NodeError> + Send + Sync;
type RoutingFn = dyn Fn(&WorkflowState) -> Result<(WorkflowState, Next), NodeError> + Send + Sync;

#[derive(Clone)]
enum FnBody {
    Transform(Arc<TransformFn>),
    Routing(Arc<RoutingFn>),
}

/// Node backed by a synchronous closure.
///
/// `FnNode::new` wraps a plain `state -> state'` transform (always `Next::Continue`);
/// `FnNode::routing` wraps a `state -> (state', Next)` function for branch/loop nodes.
/// The closure runs on tokio's blocking pool so it never stalls a runtime worker.
pub struct FnNode {
    body: FnBody,
}

impl FnNode {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&WorkflowState) -> Result<WorkflowState, NodeError> + Send + Sync + 'static,
    {
        Self {
            body: FnBody::Transform(Arc::new(f)),
        }
    }

    pub fn routing<F>(f: F) -> Self
    where
        F: Fn(&WorkflowState) -> Result<(WorkflowState, Next), NodeError> + Send + Sync + 'static,
    {
        Self {
            body: FnBody::Routing(Arc::new(f)),
        }
    }
}

impl fmt::Debug for FnNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            FnBody::Transform(_) => "transform",
            FnBody::Routing(_) => "routing",
        };
        f.debug_struct("FnNode").field("kind", &kind).finish()
    }
}

#[async_trait]
impl Node for FnNode {
    async fn run(&self, state: &WorkflowState) -> Result<(WorkflowState, Next), NodeError> {
        let body = self.body.clone();
        let state = state.clone();
        tokio::task::spawn_blocking(move || match body {
            FnBody::Transform(f) => f(&state).map(|s| (s, Next::Continue)),
            FnBody::Routing(f) => f(&state),
        })
        .await
        .map_err(blocking_failure)?
    }
}

fn blocking_failure(err: JoinError) -> NodeError {
    if err.is_cancelled() {
        return NodeError::ExecutionFailed("node task was cancelled".to_string());
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    NodeError::ExecutionFailed(format!("node panicked: {message}"))
}

/// Predicate over state attached to an edge by name.
///
/// Implemented for any `Fn(&WorkflowState) -> bool`.
pub trait Condition: Send + Sync {
    fn holds(&self, state: &WorkflowState) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&WorkflowState) -> bool + Send + Sync,
{
    fn holds(&self, state: &WorkflowState) -> bool {
        self(state)
    }
}

/// Shared handle to a registered node.
pub type NodeRef = Arc<dyn Node>;

/// Shared handle to a registered condition.
pub type ConditionRef = Arc<dyn Condition>;
