//! HTTP handlers for Raydium Scalper
//!
//! Read-only surface: liveness, health, bot status and Prometheus metrics.

mod health;
mod status;

pub use health::*;
pub use status::*;

use crate::engine::Bot;
use crate::metrics::{metrics_router, MetricsState};
use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for the status handlers
pub struct AppState {
    pub bot: Arc<Bot>,
    /// Application start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(bot: Arc<Bot>) -> Self {
        Self {
            bot,
            started_at: Utc::now(),
        }
    }
}

/// Build the status router
pub fn router(state: Arc<AppState>, metrics: Option<Arc<MetricsState>>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(bot_status))
        .with_state(state);

    let mut app = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_simple));

    if let Some(metrics) = metrics {
        app = app.merge(metrics_router().with_state(metrics));
    }

    app.layer(TraceLayer::new_for_http())
}
