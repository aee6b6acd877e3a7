//! Shared fixtures: nodes that append their name to `text`, a counter node, and
//! the condition that keeps the loop graph cycling.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{Map, Value};
use workgraph::{
    Edge, Engine, EngineConfig, ExecutionEvent, GraphDefinition, NodeError, NodeRegistry,
    RunRecord, Subscription, WorkflowState,
};

/// Node that appends `name` to `text`.
fn append(name: &'static str) -> impl Fn(&WorkflowState) -> Result<WorkflowState, NodeError> {
    move |s: &WorkflowState| {
        Ok(WorkflowState {
            text: format!("{}{}", s.text, name),
            ..s.clone()
        })
    }
}

/// Registry with `a`, `b`, `c` (append their name), `count` (append "b" and bump
/// `refinement_iterations`), `fail` (always errors) and the `below_three` condition.
pub fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register_fn("a", append("a")).unwrap();
    registry.register_fn("b", append("b")).unwrap();
    registry.register_fn("c", append("c")).unwrap();
    registry
        .register_fn("count", |s: &WorkflowState| {
            Ok(WorkflowState {
                text: format!("{}b", s.text),
                refinement_iterations: s.refinement_iterations + 1,
                ..s.clone()
            })
        })
        .unwrap();
    registry
        .register_fn("fail", |_: &WorkflowState| {
            Err(NodeError::ExecutionFailed("boom".into()))
        })
        .unwrap();
    registry
        .register_condition("below_three", |s: &WorkflowState| s.refinement_iterations < 3)
        .unwrap();
    registry
}

pub fn engine() -> Engine {
    Engine::new(registry(), EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> Engine {
    Engine::new(registry(), config)
}

/// a -> b -> c
pub fn linear() -> GraphDefinition {
    let mut def = GraphDefinition::new("a");
    def.add_node("a").add_node("b").add_node("c");
    def.add_edge("a", "b").add_edge("b", "c");
    def
}

/// a -> count; count -> a while below three, else c
pub fn counting_loop() -> GraphDefinition {
    let mut def = GraphDefinition::new("a");
    def.add_node("a").add_node("count").add_node("c");
    def.add_edge("a", "count")
        .add_edge("count", Edge::when("a", "below_three"))
        .add_edge("count", "c");
    def
}

/// a -> fail -> c
pub fn failing() -> GraphDefinition {
    let mut def = GraphDefinition::new("a");
    def.add_node("a").add_node("fail").add_node("c");
    def.add_edge("a", "fail").add_edge("fail", "c");
    def
}

/// a -> b -> a, forever
pub fn endless() -> GraphDefinition {
    let mut def = GraphDefinition::new("a");
    def.add_node("a").add_node("b");
    def.add_edge("a", "b").add_edge("b", "a");
    def
}

pub fn input(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

pub fn nodes_of(record: &RunRecord) -> Vec<&str> {
    record.log.iter().map(|e| e.node.as_str()).collect()
}

/// Receives until the run's terminal event (inclusive), failing after a few seconds.
pub async fn until_terminal(sub: &mut Subscription) -> Vec<ExecutionEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("timed out waiting for events")
            .expect("subscription closed");
        let done = event.kind.is_terminal();
        events.push(event);
        if done {
            return events;
        }
    }
}
