//! Knowledge base reload

use axum::{extract::State, Json};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

use crate::AppState;
use pestwise_common::errors::{AppError, Result};
use pestwise_knowledge::LoadReport;

#[derive(Serialize)]
pub struct ReloadResponse {
    pub version: u64,
    pub report: LoadReport,
}

/// Rebuild the frame store from the source directory and swap it in.
/// A failed reload leaves the current store serving.
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>> {
    let start = Instant::now();
    let dir = PathBuf::from(&state.config.knowledge.source_dir);
    let knowledge = state.orchestrator.knowledge().clone();

    let result = tokio::task::spawn_blocking(move || knowledge.reload_dir(&dir))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("reload task failed: {}", e),
        })?;

    let monitor = state.orchestrator.monitor();
    monitor.record("knowledge", "reload", start.elapsed(), result.is_ok());
    let (version, report) = result?;

    Ok(Json(ReloadResponse { version, report }))
}
