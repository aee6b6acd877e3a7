//! End-to-end runs through the engine facade.

use serde_json::json;
use workgraph::{EngineConfig, RunStatus};

use crate::common::{counting_loop, endless, engine, engine_with, failing, input, linear, nodes_of};

/// **Scenario**: Linear graph a -> b -> c completes with three log entries in order.
#[tokio::test]
async fn linear_graph_runs_in_order() {
    let engine = engine();
    let id = engine.register_graph(linear()).unwrap();

    let record = engine.run(&id, input(json!({"text": ">"}))).await.unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.progress_percent, 100);
    assert_eq!(nodes_of(&record), vec!["a", "b", "c"]);
    assert_eq!(record.state.text, ">abc");
    assert!(record.log.iter().all(|e| e.iteration == 1));
    assert!(record.error.is_none());
}

/// **Scenario**: Guarded back edge loops until the counter reaches three.
#[tokio::test]
async fn loop_runs_until_condition_fails() {
    let engine = engine();
    let id = engine.register_graph(counting_loop()).unwrap();

    let record = engine.run(&id, input(json!({}))).await.unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(
        nodes_of(&record),
        vec!["a", "count", "a", "count", "a", "count", "c"]
    );
    assert_eq!(record.state.refinement_iterations, 3);
    let count_iterations: Vec<u32> = record
        .log
        .iter()
        .filter(|e| e.node == "count")
        .map(|e| e.iteration)
        .collect();
    assert_eq!(count_iterations, vec![1, 2, 3]);
    let steps: Vec<usize> = record.log.iter().map(|e| e.step).collect();
    assert_eq!(steps, (1..=7).collect::<Vec<_>>());
}

/// **Scenario**: A failing node fails the run, keeps the prior log and names the node.
#[tokio::test]
async fn failing_node_fails_run() {
    let engine = engine();
    let id = engine.register_graph(failing()).unwrap();

    let record = engine.run(&id, input(json!({}))).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    let error = record.error.as_deref().unwrap();
    assert!(error.contains("fail"), "{error}");
    assert!(error.contains("boom"), "{error}");
    assert_eq!(nodes_of(&record), vec!["a"]);
    assert_eq!(record.state.text, "a");
    assert!(record.ended_at.is_some());
}

/// **Scenario**: Querying a run id that never existed is not-found, not an empty record.
#[tokio::test]
async fn unknown_run_is_not_found() {
    let engine = engine();
    let err = engine.run_record("no-such-run").unwrap_err();
    assert!(err.is_not_found());
}

/// **Scenario**: A cycle with no exit fails at the configured ceiling.
#[tokio::test]
async fn endless_cycle_hits_loop_guard() {
    let engine = engine_with(EngineConfig::default().with_max_steps(10));
    let id = engine.register_graph(endless()).unwrap();

    let record = engine.run(&id, input(json!({}))).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    assert!(record.error.as_deref().unwrap().contains("maximum steps"));
    assert_eq!(record.log.len(), 10);
}

/// **Scenario**: Same graph, same input, same final state and node sequence.
#[tokio::test]
async fn runs_are_deterministic() {
    let engine = engine();
    let id = engine.register_graph(counting_loop()).unwrap();
    let data = json!({"text": "seed", "max_length": 7});

    let first = engine.run(&id, input(data.clone())).await.unwrap();
    let second = engine.run(&id, input(data)).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.state, second.state);
    assert_eq!(nodes_of(&first), nodes_of(&second));
}

/// **Scenario**: Input naming a field the state does not have is rejected before any run starts.
#[tokio::test]
async fn unknown_input_field_rejected() {
    let engine = engine();
    let id = engine.register_graph(linear()).unwrap();
    assert!(engine.run(&id, input(json!({"txet": "typo"}))).await.is_err());
    assert!(engine.runs().is_empty());
}
