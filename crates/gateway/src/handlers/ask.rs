//! Ask handler

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use pestwise_common::errors::{AppError, Result};
use pestwise_context::Answer;

/// Ask request
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,

    /// Free-text situation, e.g. location or season
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub context: Option<String>,
}

/// Answer a question through the pipeline
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Answer>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let answer = state
        .orchestrator
        .ask(&request.query, request.context.as_deref())
        .await;

    tracing::info!(
        intent = %answer.intent,
        source = %answer.source,
        cache_hit = answer.metadata.cache_hit,
        latency_ms = answer.metadata.elapsed_ms,
        "Ask completed"
    );

    Ok(Json(answer))
}
