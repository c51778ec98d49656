//! Operational endpoints: health probe and dashboard feeds.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::observability::metrics::MetricsSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub environment: String,
    pub version: &'static str,
    pub timestamp: String,
    pub uptime: u64,
}

/// `GET /api/health`. Always 200 regardless of rate-limit or tracing state;
/// the rate limiter guards only the chat endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.ai.model().to_string(),
        environment: state.config.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.metrics.uptime_secs(),
    })
}

/// `GET /api/metrics`.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub level: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// `GET /api/logs?level=&search=&limit=` — recent entries from the in-memory
/// ring, newest first.
pub async fn recent_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<Value> {
    let level = query.level.as_deref().and_then(|s| s.parse().ok());
    let limit = query.limit.unwrap_or(50);
    let (logs, total, filtered) = state.logger.recent(level, query.search.as_deref(), limit);
    Json(json!({ "logs": logs, "total": total, "filtered": filtered }))
}
