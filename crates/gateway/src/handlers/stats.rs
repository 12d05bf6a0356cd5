//! Performance statistics

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use pestwise_common::cache::CacheStats;
use pestwise_common::monitor::MonitorSnapshot;
use pestwise_knowledge::KnowledgeStats;

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Restrict to one component, e.g. `generation`
    pub component: Option<String>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub monitor: MonitorSnapshot,
    pub cache: CacheStats,
    pub knowledge: KnowledgeStats,
}

pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Json<StatsResponse> {
    let orchestrator = &state.orchestrator;
    Json(StatsResponse {
        monitor: orchestrator.monitor().stats(query.component.as_deref()),
        cache: orchestrator.cache().stats(),
        knowledge: orchestrator.knowledge().snapshot().stats(),
    })
}
