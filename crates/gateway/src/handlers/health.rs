//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use pestwise_context::ProbeState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub generation: ProbeState,
    pub knowledge_frames: usize,
    pub knowledge_version: u64,
    pub corpus_size: usize,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: pestwise_common::VERSION.to_string(),
    })
}

/// Readiness probe. An unavailable backend is re-probed; answers still
/// flow through fallbacks, so it only degrades the status.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let orchestrator = &state.orchestrator;

    let generation = match orchestrator.generator().probe_state() {
        ProbeState::Unavailable { .. } => orchestrator.generator().refresh_availability().await,
        current => current,
    };
    let knowledge_frames = orchestrator.knowledge().len();

    let status = if knowledge_frames == 0 {
        "not_ready"
    } else if generation.is_ready() {
        "ready"
    } else {
        "degraded"
    };

    Json(ReadyResponse {
        status: status.to_string(),
        checks: ReadyChecks {
            generation,
            knowledge_frames,
            knowledge_version: orchestrator.knowledge().version(),
            corpus_size: orchestrator.retriever().corpus_size(),
        },
    })
}
