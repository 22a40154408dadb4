//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::models::PositionPhase;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: HealthStatus,
    /// Uptime in seconds
    pub uptime_seconds: i64,
    /// Position slot phase
    pub phase: PositionPhase,
    /// Whether the bot is still accepting candidates
    pub trading: bool,
}

/// Health status enum
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Operational
    Healthy,
    /// Last position was abandoned and needs reconciliation
    Degraded,
    /// Bot closed
    Unhealthy,
}

/// Health check handler
///
/// GET /api/v1/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let phase = state.bot.state().phase();
    let closed = state.bot.is_closed();

    let status = if closed {
        HealthStatus::Unhealthy
    } else if phase == PositionPhase::Abandoned {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let status_code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        // Still 200 for degraded
        _ => StatusCode::OK,
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            uptime_seconds: uptime,
            phase,
            trading: !closed,
        }),
    )
}

/// Simple liveness check
///
/// GET /health
pub async fn health_simple() -> StatusCode {
    StatusCode::OK
}
