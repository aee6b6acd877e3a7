//! Background runs: submit, poll, and many runs at once.

use std::time::Duration;

use serde_json::json;
use workgraph::{RunStatus, Topic};

use crate::common::{counting_loop, engine, input, linear, nodes_of, until_terminal};

/// **Scenario**: run_async returns a run id at once; polling ends at completed with 100%.
#[tokio::test]
async fn run_async_then_poll() {
    let engine = engine();
    let id = engine.register_graph(counting_loop()).unwrap();

    let run_id = engine.run_async(&id, input(json!({}))).unwrap();
    let initial = engine.run_record(&run_id).unwrap();
    assert_eq!(initial.graph_id, id);

    let mut last_progress = 0;
    let record = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let record = engine.run_record(&run_id).unwrap();
            assert!(record.progress_percent >= last_progress, "progress went backwards");
            last_progress = record.progress_percent;
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("run did not finish");

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.progress_percent, 100);
    assert_eq!(record.log.len(), 7);
}

/// **Scenario**: Concurrent runs of one graph finish independently with identical results.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_are_independent() {
    let engine = engine();
    let id = engine.register_graph(linear()).unwrap();
    let mut sub = engine.subscribe(Topic::Graph(id.clone()));

    let run_ids: Vec<String> = (0..10)
        .map(|i| {
            engine
                .run_async(&id, input(json!({"text": format!("{i}:")})))
                .unwrap()
        })
        .collect();

    let mut finished = 0;
    while finished < run_ids.len() {
        let events = until_terminal(&mut sub).await;
        finished += events.iter().filter(|e| e.kind.is_terminal()).count();
    }

    for (i, run_id) in run_ids.iter().enumerate() {
        let record = engine.run_record(run_id).unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.state.text, format!("{i}:abc"));
        assert_eq!(nodes_of(&record), vec!["a", "b", "c"]);
    }
    assert_eq!(engine.runs().len(), 10);
}

/// **Scenario**: A finished background run can be evicted; an active one cannot.
#[tokio::test]
async fn evict_after_finish() {
    let engine = engine();
    let id = engine.register_graph(linear()).unwrap();
    let mut sub = engine.subscribe(Topic::Graph(id.clone()));

    let run_id = engine.run_async(&id, input(json!({}))).unwrap();
    until_terminal(&mut sub).await;

    let evicted = engine.evict_run(&run_id).unwrap();
    assert_eq!(evicted.status, RunStatus::Completed);
    assert!(engine.run_record(&run_id).unwrap_err().is_not_found());
}
