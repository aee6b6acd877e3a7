//! HTTP server for the workgraph engine: graph registration, sync and async runs,
//! run status, and server-sent execution events.
//!
//! Configure via env (or `.env`): `LISTEN` (default `0.0.0.0:8123`), `LOG_FILE`,
//! `RUST_LOG`, `RUN_RETENTION_HOURS` (default 24), plus the engine's
//! `WORKGRAPH_*` variables (see `EngineConfig::from_env`).

mod app;
mod summarization;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use workgraph::{Engine, EngineConfig, NodeRegistry};

use crate::app::{router, AppState};

/// How often finished runs older than the retention window are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Load .env from current directory; if not found, try parent (workspace root when run from crate dir).
fn load_dotenv() {
    if dotenv::dotenv().is_ok() {
        return;
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(parent) = cwd.parent() {
            let env_path = parent.join(".env");
            if env_path.is_file() {
                let _ = dotenv::from_path(env_path);
            }
        }
    }
}

/// Initializes tracing: always to stdout; if env `LOG_FILE` is set, also to that file (append, no ANSI).
fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,workgraph=debug,workgraph_server=debug")
    });

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(filter.clone());

    let registry = tracing_subscriber::registry().with(stdout_layer);

    if let Ok(path) = std::env::var("LOG_FILE") {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_filter(filter);
        registry.with(file_layer).init();
        tracing::info!(path = %path, "logging to file");
    } else {
        registry.init();
    }
    Ok(())
}

/// Periodically forgets finished runs older than `retention`.
fn spawn_pruner(engine: Arc<Engine>, retention: chrono::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            engine.tracker().prune_finished(retention);
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    load_dotenv();
    init_tracing()?;

    let config = EngineConfig::from_env();
    info!(
        max_steps = config.max_steps,
        tie_break = ?config.tie_break,
        event_buffer = config.event_buffer,
        "engine config loaded"
    );

    let mut registry = NodeRegistry::new();
    summarization::register(&mut registry)?;
    info!(nodes = ?registry.names(), "available nodes");

    let engine = Arc::new(Engine::new(registry, config));
    let summarization_graph_id = engine.register_graph(summarization::definition())?;
    info!(graph_id = %summarization_graph_id, "pre-registered summarization workflow");

    let retention_hours: i64 = std::env::var("RUN_RETENTION_HOURS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(24);
    spawn_pruner(Arc::clone(&engine), chrono::Duration::hours(retention_hours));

    let state = Arc::new(AppState {
        engine,
        summarization_graph_id,
    });
    let app = router(state);

    let listen = std::env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:8123".to_string());
    info!("listening on http://{}", listen);
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
