//! Job runner: drives runs of compiled graphs and keeps tracker and subscribers in step.
//!
//! Event order per run: `RUN_STARTED`, then `NODE_START`/`NODE_COMPLETED` for every
//! step, then exactly one of `RUN_COMPLETED` or `RUN_FAILED`. The terminal event is
//! published after the tracker holds the terminal record, so a subscriber reacting to
//! it always reads the final status.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;

use crate::engine::GraphRecord;
use crate::error::ExecutionError;
use crate::graph::{ExecutionLogEntry, ExecutionObserver};
use crate::state::WorkflowState;
use crate::stream::{EventBroadcaster, ExecutionEvent};
use crate::tracker::{RunRecord, RunTracker, TrackerError};

/// Feeds one run's progress into the tracker and the broadcaster.
struct RunObserver {
    run_id: String,
    graph_id: String,
    tracker: Arc<RunTracker>,
    broadcaster: EventBroadcaster,
}

impl ExecutionObserver for RunObserver {
    fn node_started(&self, node: &str, iteration: u32, step: usize) {
        self.broadcaster.publish(&ExecutionEvent::node_start(
            &self.run_id,
            &self.graph_id,
            node,
            iteration,
            step,
        ));
    }

    fn node_completed(&self, entry: &ExecutionLogEntry, state: &WorkflowState) {
        if let Err(e) = self.tracker.record_step(&self.run_id, entry, state) {
            tracing::warn!(run_id = %self.run_id, error = %e, "could not record step");
        }
        self.broadcaster.publish(&ExecutionEvent::node_completed(
            &self.run_id,
            &self.graph_id,
            entry,
            state,
        ));
    }
}

#[derive(Debug, Clone)]
pub struct JobRunner {
    tracker: Arc<RunTracker>,
    broadcaster: EventBroadcaster,
}

impl JobRunner {
    pub fn new(tracker: Arc<RunTracker>, broadcaster: EventBroadcaster) -> Self {
        Self {
            tracker,
            broadcaster,
        }
    }

    /// Registers a pending run and executes it on a background task.
    ///
    /// Returns the run id immediately; poll the tracker or subscribe for progress.
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, graph: &GraphRecord, initial_state: WorkflowState) -> String {
        let run_id = self.start(graph, &initial_state);
        self.spawn_run(graph, &run_id, initial_state);
        run_id
    }

    /// Executes a run to its end and returns its terminal record.
    ///
    /// The run owns its own task: dropping this future stops the wait, not the run,
    /// which still reaches `completed` or `failed`.
    pub async fn run_sync(
        &self,
        graph: &GraphRecord,
        initial_state: WorkflowState,
    ) -> Result<RunRecord, TrackerError> {
        let run_id = self.start(graph, &initial_state);
        if let Err(join) = self.spawn_run(graph, &run_id, initial_state).await {
            let error = ExecutionError::Panicked(panic_message(join));
            tracing::error!(run_id = %run_id, error = %error, "run task ended abnormally");
            if let Ok(event) = self.fail(&run_id, &graph.graph_id, &error) {
                self.broadcaster.publish(&event);
            }
        }
        self.tracker.get(&run_id)
    }

    fn start(&self, graph: &GraphRecord, initial_state: &WorkflowState) -> String {
        self.tracker.start(
            &graph.graph_id,
            initial_state.clone(),
            graph.definition().nodes.len(),
        )
    }

    fn spawn_run(
        &self,
        graph: &GraphRecord,
        run_id: &str,
        initial_state: WorkflowState,
    ) -> JoinHandle<()> {
        let span = tracing::info_span!("run", run_id, graph_id = %graph.graph_id);
        let runner = self.clone();
        let graph = graph.clone();
        let run_id = run_id.to_string();
        tokio::spawn(
            async move { runner.execute(&graph, &run_id, initial_state).await }.instrument(span),
        )
    }

    async fn execute(&self, graph: &GraphRecord, run_id: &str, initial_state: WorkflowState) {
        let graph_id = graph.graph_id.as_str();
        if let Err(e) = self.tracker.mark_running(run_id) {
            tracing::warn!(error = %e, "run cannot start");
            return;
        }
        self.broadcaster
            .publish(&ExecutionEvent::run_started(run_id, graph_id));

        let compiled = Arc::clone(&graph.graph);
        let observer = RunObserver {
            run_id: run_id.to_string(),
            graph_id: graph_id.to_string(),
            tracker: Arc::clone(&self.tracker),
            broadcaster: self.broadcaster.clone(),
        };
        let joined = tokio::spawn(
            async move { compiled.invoke_observed(initial_state, &observer).await }
                .in_current_span(),
        )
        .await;

        let result = match joined {
            Ok(Ok(outcome)) => self
                .tracker
                .complete(run_id, outcome.state, outcome.log)
                .map(|()| ExecutionEvent::run_completed(run_id, graph_id)),
            Ok(Err(failure)) => self.fail(run_id, graph_id, &failure.error),
            Err(join) => self.fail(run_id, graph_id, &ExecutionError::Panicked(panic_message(join))),
        };
        match result {
            Ok(event) => self.broadcaster.publish(&event),
            Err(e) => tracing::warn!(error = %e, "could not store run result"),
        }
    }

    fn fail(
        &self,
        run_id: &str,
        graph_id: &str,
        error: &ExecutionError,
    ) -> Result<ExecutionEvent, TrackerError> {
        let message = error.to_string();
        self.tracker.fail(run_id, message.clone())?;
        Ok(ExecutionEvent::run_failed(run_id, graph_id, message))
    }
}

fn panic_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "run task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::graph::{FnNode, GraphDefinition, Next, Node};
    use crate::registry::NodeRegistry;
    use crate::stream::{EventKind, Topic};
    use crate::tracker::RunStatus;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Panics;

    struct Slow;

    #[async_trait]
    impl Node for Slow {
        async fn run(&self, state: &WorkflowState) -> Result<(WorkflowState, Next), NodeError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok((state.clone(), Next::Continue))
        }
    }

    #[async_trait]
    impl Node for Panics {
        async fn run(&self, _state: &WorkflowState) -> Result<(WorkflowState, Next), NodeError> {
            panic!("node blew up");
        }
    }

    fn graph_of(registry: NodeRegistry, def: GraphDefinition) -> GraphRecord {
        GraphRecord::new("g", def.compile(Arc::new(registry)).unwrap())
    }

    fn runner() -> JobRunner {
        JobRunner::new(Arc::new(RunTracker::new()), EventBroadcaster::default())
    }

    /// **Scenario**: run_sync returns a completed record at 100% with one log entry per node.
    #[tokio::test]
    async fn run_sync_completes() {
        let mut registry = NodeRegistry::new();
        registry
            .register_fn("a", |s: &WorkflowState| Ok(s.clone()))
            .unwrap();
        let mut def = GraphDefinition::new("a");
        def.add_node("a");
        let graph = graph_of(registry, def);

        let record = runner()
            .run_sync(&graph, WorkflowState::default())
            .await
            .unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.progress_percent, 100);
        assert_eq!(record.log.len(), 1);
        assert_eq!(record.last_node.as_deref(), Some("a"));
    }

    /// **Scenario**: A panicking node fails the run instead of leaving it running.
    #[tokio::test]
    async fn panic_marks_run_failed() {
        let mut registry = NodeRegistry::new();
        registry.register("boom", Arc::new(Panics)).unwrap();
        let mut def = GraphDefinition::new("boom");
        def.add_node("boom");
        let graph = graph_of(registry, def);
        let runner = runner();
        let mut events = runner.broadcaster.subscribe(Topic::Graph("g".into()));

        let record = runner
            .run_sync(&graph, WorkflowState::default())
            .await
            .unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.error.unwrap().contains("node blew up"));

        let mut kinds = Vec::new();
        while let Some(e) = events.try_recv() {
            kinds.push(e.kind);
        }
        assert_eq!(
            kinds,
            vec![EventKind::RunStarted, EventKind::NodeStart, EventKind::RunFailed]
        );
    }

    /// **Scenario**: Dropping the run_sync caller mid-run still leaves a terminal record.
    #[tokio::test]
    async fn abandoned_run_sync_still_finishes() {
        let mut registry = NodeRegistry::new();
        registry.register("slow", Arc::new(Slow)).unwrap();
        let mut def = GraphDefinition::new("slow");
        def.add_node("slow");
        let graph = graph_of(registry, def);
        let runner = runner();

        let caller = tokio::spawn({
            let runner = runner.clone();
            let graph = graph.clone();
            async move { runner.run_sync(&graph, WorkflowState::default()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();

        let record = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let runs = runner.tracker.list();
                if let Some(run) = runs.first().filter(|r| r.status.is_terminal()) {
                    return runner.tracker.get(&run.run_id).unwrap();
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("run never reached a terminal status");
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.progress_percent, 100);
        assert!(record.ended_at.is_some());
        assert_eq!(record.log.len(), 1);
    }

    /// **Scenario**: submit returns at once and the run finishes in the background.
    #[tokio::test]
    async fn submit_runs_in_background() {
        let mut registry = NodeRegistry::new();
        registry
            .register("a", Arc::new(FnNode::new(|s: &WorkflowState| Ok(s.clone()))))
            .unwrap();
        let mut def = GraphDefinition::new("a");
        def.add_node("a");
        let graph = graph_of(registry, def);
        let runner = runner();
        let mut events = runner.broadcaster.subscribe(Topic::Graph("g".into()));

        let run_id = runner.submit(&graph, WorkflowState::default());
        loop {
            let event = events.recv().await.unwrap();
            if event.kind.is_terminal() {
                assert_eq!(event.kind, EventKind::RunCompleted);
                break;
            }
        }
        assert_eq!(
            runner.tracker.get(&run_id).unwrap().status,
            RunStatus::Completed
        );
    }
}
