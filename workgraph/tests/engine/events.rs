//! Event ordering as seen by graph subscribers.

use serde_json::json;
use workgraph::{EventKind, ExecutionEvent, Topic};

use crate::common::{counting_loop, engine, failing, input, linear, until_terminal};

fn kinds(events: &[ExecutionEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

/// **Scenario**: RUN_STARTED, one NODE_START/NODE_COMPLETED pair per node, then RUN_COMPLETED.
#[tokio::test]
async fn completed_run_event_order() {
    let engine = engine();
    let id = engine.register_graph(linear()).unwrap();
    let mut sub = engine.subscribe(Topic::Graph(id.clone()));

    let record = engine.run(&id, input(json!({}))).await.unwrap();
    let events = until_terminal(&mut sub).await;

    let mut expected = vec![EventKind::RunStarted];
    for _ in 0..3 {
        expected.push(EventKind::NodeStart);
        expected.push(EventKind::NodeCompleted);
    }
    expected.push(EventKind::RunCompleted);
    assert_eq!(kinds(&events), expected);
    assert!(events.iter().all(|e| e.run_id == record.run_id && e.graph_id == id));

    let completed: Vec<&str> = events
        .iter()
        .filter(|e| e.kind == EventKind::NodeCompleted)
        .filter_map(|e| e.node.as_deref())
        .collect();
    assert_eq!(completed, vec!["a", "b", "c"]);
}

/// **Scenario**: A failing run ends with RUN_FAILED carrying the error, after the failing node's start.
#[tokio::test]
async fn failed_run_ends_with_run_failed() {
    let engine = engine();
    let id = engine.register_graph(failing()).unwrap();
    let mut sub = engine.subscribe(Topic::Graph(id.clone()));

    engine.run(&id, input(json!({}))).await.unwrap();
    let events = until_terminal(&mut sub).await;

    assert_eq!(
        kinds(&events),
        vec![
            EventKind::RunStarted,
            EventKind::NodeStart,
            EventKind::NodeCompleted,
            EventKind::NodeStart,
            EventKind::RunFailed,
        ]
    );
    let last = events.last().unwrap();
    assert!(last.error.as_deref().unwrap().contains("boom"));
}

/// **Scenario**: Loop iterations show up on node events.
#[tokio::test]
async fn loop_events_carry_iteration() {
    let engine = engine();
    let id = engine.register_graph(counting_loop()).unwrap();
    let mut sub = engine.subscribe(Topic::Graph(id.clone()));

    engine.run(&id, input(json!({}))).await.unwrap();
    let events = until_terminal(&mut sub).await;

    let count_iterations: Vec<u32> = events
        .iter()
        .filter(|e| e.kind == EventKind::NodeStart && e.node.as_deref() == Some("count"))
        .filter_map(|e| e.iteration)
        .collect();
    assert_eq!(count_iterations, vec![1, 2, 3]);
    assert_eq!(events.len(), 1 + 7 * 2 + 1);

    let refinements: Vec<i64> = events
        .iter()
        .filter(|e| e.kind == EventKind::NodeCompleted && e.node.as_deref() == Some("count"))
        .filter_map(|e| e.state_snapshot.map(|s| s.refinement_iterations))
        .collect();
    assert_eq!(refinements, vec![1, 2, 3]);
}

/// **Scenario**: Subscribers of another graph see nothing.
#[tokio::test]
async fn other_graph_subscribers_see_nothing() {
    let engine = engine();
    let id = engine.register_graph(linear()).unwrap();
    let other = engine.register_graph(linear()).unwrap();
    let mut sub = engine.subscribe(Topic::Graph(other));

    engine.run(&id, input(json!({}))).await.unwrap();
    assert!(sub.try_recv().is_none());
}
