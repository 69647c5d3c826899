//! Health check handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let store_healthy = state.engine.store_healthy().await;

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: if store_healthy { "ok" } else { "degraded" }.to_string(),
        store_mode: state.engine.store_mode(),
        store: if store_healthy { "reachable" } else { "unreachable" }.to_string(),
        ws_connections: state.engine.connections.connection_count(),
        active_rooms: state.engine.presence.active_rooms(),
        metrics: state.engine.metrics.snapshot(),
    }))
}
