//! HTTP routes over the engine.
//!
//! Every handler delegates to [`Engine`]; this module only shapes requests and responses.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;
use workgraph::{
    Engine, EngineError, ExecutionEvent, ExecutionLogEntry, GraphDefinition,
    GraphValidationError, RunRecord, RunStatus, Topic,
};

/// Shared state for all routes.
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Graph id of the built-in summarization workflow.
    pub summarization_graph_id: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/graph/create", post(create_graph))
        .route("/graph/run", post(run_graph))
        .route("/graph/state/:run_id", get(run_state))
        .route("/graphs", get(list_graphs))
        .route("/runs", get(list_runs))
        .route("/run_async", post(run_async))
        .route("/run_status/:run_id", get(run_status))
        .route("/events/graph/:graph_id", get(graph_events))
        .route("/events/run/:run_id", get(run_events))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<axum::body::Body>| {
                    info_span!("request", method = %req.method(), uri = %req.uri())
                }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct CreateGraphResponse {
    graph_id: String,
    message: String,
    nodes_count: usize,
}

#[derive(Debug, Deserialize)]
struct RunGraphRequest {
    graph_id: String,
    #[serde(default)]
    input_data: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct RunGraphResponse {
    run_id: String,
    graph_id: String,
    final_state: Value,
    execution_log: Vec<ExecutionLogEntry>,
    status: RunStatus,
}

#[derive(Debug, Serialize)]
struct StateResponse {
    run_id: String,
    graph_id: String,
    state: Value,
    execution_log: Vec<ExecutionLogEntry>,
    status: RunStatus,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct RunAsyncResponse {
    run_id: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct RunStatusResponse {
    run_id: String,
    graph_id: String,
    status: RunStatus,
    progress_percent: u8,
    last_node: String,
    error_message: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl From<RunRecord> for RunStatusResponse {
    fn from(r: RunRecord) -> Self {
        Self {
            run_id: r.run_id,
            graph_id: r.graph_id,
            status: r.status,
            progress_percent: r.progress_percent,
            last_node: r.last_node.unwrap_or_default(),
            error_message: r.error.unwrap_or_default(),
            start_time: r.started_at,
            end_time: r.ended_at,
        }
    }
}

async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "service": "workgraph",
        "version": env!("CARGO_PKG_VERSION"),
        "registered_graphs": state.engine.graphs().len(),
        "runs": state.engine.runs().len(),
        "summarization_graph_id": state.summarization_graph_id,
    }))
}

async fn create_graph(
    State(state): State<Arc<AppState>>,
    Json(definition): Json<GraphDefinition>,
) -> Result<Json<CreateGraphResponse>, ServerError> {
    let nodes_count = definition.nodes.len();
    let graph_id = state.engine.register_graph(definition)?;
    Ok(Json(CreateGraphResponse {
        graph_id,
        message: "Graph created successfully".to_string(),
        nodes_count,
    }))
}

async fn run_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunGraphRequest>,
) -> Result<Json<RunGraphResponse>, ServerError> {
    let record = state.engine.run(&req.graph_id, req.input_data).await?;
    if record.status == RunStatus::Failed {
        let message = record.error.unwrap_or_default();
        return Err(ServerError::Execution(message));
    }
    Ok(Json(RunGraphResponse {
        final_state: record.state.to_json(),
        run_id: record.run_id,
        graph_id: record.graph_id,
        execution_log: record.log,
        status: record.status,
    }))
}

async fn run_state(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<StateResponse>, ServerError> {
    let record = state.engine.run_record(&run_id)?;
    Ok(Json(StateResponse {
        timestamp: record.ended_at.unwrap_or(record.started_at),
        state: record.state.to_json(),
        run_id: record.run_id,
        graph_id: record.graph_id,
        execution_log: record.log,
        status: record.status,
    }))
}

async fn list_graphs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "graphs": state.engine.graphs() }))
}

async fn list_runs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "runs": state.engine.runs() }))
}

async fn run_async(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunGraphRequest>,
) -> Result<Json<RunAsyncResponse>, ServerError> {
    let run_id = state.engine.run_async(&req.graph_id, req.input_data)?;
    tracing::info!(run_id = %run_id, graph_id = %req.graph_id, "started async run");
    Ok(Json(RunAsyncResponse {
        run_id,
        status: "started",
    }))
}

async fn run_status(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatusResponse>, ServerError> {
    Ok(Json(state.engine.run_record(&run_id)?.into()))
}

type EventStream = Pin<Box<dyn Stream<Item = ExecutionEvent> + Send>>;

async fn graph_events(
    State(state): State<Arc<AppState>>,
    Path(graph_id): Path<String>,
) -> Result<Response, ServerError> {
    state.engine.graph(&graph_id)?;
    let events: EventStream = Box::pin(state.engine.subscribe(Topic::Graph(graph_id)));
    Ok(sse(events))
}

/// Streams one run's events; the stream closes after its terminal event.
async fn run_events(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Response, ServerError> {
    let subscription = state.engine.subscribe(Topic::Run(run_id.clone()));
    let record = state.engine.run_record(&run_id)?;
    let events: EventStream = match record.status {
        RunStatus::Completed => {
            drop(subscription);
            Box::pin(tokio_stream::once(ExecutionEvent::run_completed(
                &record.run_id,
                &record.graph_id,
            )))
        }
        RunStatus::Failed => {
            drop(subscription);
            Box::pin(tokio_stream::once(ExecutionEvent::run_failed(
                &record.run_id,
                &record.graph_id,
                record.error.unwrap_or_default(),
            )))
        }
        RunStatus::Pending | RunStatus::Running => Box::pin(subscription),
    };
    Ok(sse(events))
}

fn sse(events: EventStream) -> Response {
    let stream = events.map(|event| {
        let sse_event = Event::default()
            .event(event.kind.as_str())
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Ok::<_, Infallible>(sse_event)
    });
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("Execution failed: {0}")]
    Execution(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ServerError {
    fn from(e: EngineError) -> Self {
        if e.is_not_found() {
            return ServerError::NotFound(e.to_string());
        }
        match e {
            EngineError::Validation(_) | EngineError::State(_) => {
                ServerError::BadRequest(e.to_string())
            }
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<GraphValidationError> for ServerError {
    fn from(e: GraphValidationError) -> Self {
        ServerError::BadRequest(format!("Graph creation failed: {e}"))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Execution(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": { "message": self.to_string() } }))).into_response()
    }
}
