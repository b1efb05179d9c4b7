//! Read-only HTTP status surface, mirroring the daemon-embedded status
//! endpoint pattern: a small `axum` router serving a JSON snapshot of the
//! task registry for operator tooling to poll.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use forge_services::TaskRegistry;
use serde::Serialize;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct StatusState {
    pub registry: Arc<TaskRegistry>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub total_tasks: u64,
    pub finished: u64,
    pub pending: u64,
    pub in_flight: u64,
    pub connected_workers: usize,
    pub elapsed_secs: f64,
    pub hashes_per_sec: f64,
    pub found: Option<FoundResponse>,
}

#[derive(Debug, Serialize)]
pub struct FoundResponse {
    pub task_id: u64,
    pub preimage: String,
}

#[derive(Debug, Serialize)]
pub struct WorkerResponse {
    pub worker_id: u64,
    pub cores: usize,
}

async fn handle_workers(State(state): State<StatusState>) -> Json<Vec<WorkerResponse>> {
    let workers = state
        .registry
        .workers()
        .into_iter()
        .map(|(worker_id, cores)| WorkerResponse { worker_id, cores })
        .collect();
    Json(workers)
}

async fn handle_status(State(state): State<StatusState>) -> Json<StatusResponse> {
    let stats = state.registry.stats();
    let found = stats.found.and_then(|outcome| match outcome {
        forge_core::task::TaskOutcome::Found { task_id, preimage } => {
            Some(FoundResponse { task_id, preimage })
        }
        forge_core::task::TaskOutcome::Done { .. } => None,
    });
    Json(StatusResponse {
        total_tasks: stats.total_tasks,
        finished: stats.finished,
        pending: stats.pending,
        in_flight: stats.in_flight,
        connected_workers: stats.connected_workers,
        elapsed_secs: stats.elapsed_secs,
        hashes_per_sec: stats.hashes_per_sec,
        found,
    })
}

fn router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/workers", get(handle_workers))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the status server to completion (until the process exits). Spawn
/// this on its own tokio runtime thread; the rest of the coordinator is
/// synchronous std threads.
pub async fn serve(registry: Arc<TaskRegistry>, port: u16) -> anyhow::Result<()> {
    let state = StatusState { registry };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "status endpoint listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
