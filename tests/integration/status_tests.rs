//! Status surface tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

use crate::support::*;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use raydium_scalper::handlers::{router, AppState};
use raydium_scalper::metrics::MetricsState;
use std::sync::Arc;
use tower::ServiceExt;

fn app(h: &Harness, metrics: Option<Arc<MetricsState>>) -> Router {
    router(Arc::new(AppState::new(h.bot.clone())), metrics)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

// =============================================================================
// HEALTH
// =============================================================================

#[tokio::test]
async fn test_liveness() {
    let h = Harness::new();
    let (status, _) = get(app(&h, None), "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_idle_bot() {
    let h = Harness::new();
    let (status, body) = get_json(app(&h, None), "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["phase"], "NONE");
    assert_eq!(body["trading"], true);
}

#[tokio::test]
async fn test_health_unavailable_after_close() {
    let h = Harness::new();
    h.bot.close().await;

    let (status, body) = get_json(app(&h, None), "/api/v1/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["trading"], false);
}

// =============================================================================
// STATUS
// =============================================================================

#[tokio::test]
async fn test_status_without_position() {
    let h = Harness::new();
    let (status, body) = get_json(app(&h, None), "/api/v1/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wallet"], h.bot.wallet_address());
    assert_eq!(body["phase"], "NONE");
    assert!(body["position"].is_null());
    assert!(body["cooldown_remaining_secs"].is_null());
    assert_eq!(body["stats"]["trades_executed"], 0);
    assert_eq!(body["closed"], false);
}

#[tokio::test(start_paused = true)]
async fn test_status_with_open_position() {
    let h = Harness::new();
    let token = new_token();
    assert!(h.bot.attempt_buy(&token).await);

    let (_, body) = get_json(app(&h, None), "/api/v1/status").await;
    assert_eq!(body["phase"], "OPEN");
    assert_eq!(body["position"]["token"], token);
    assert_eq!(body["position"]["buy_signature"], "sig-1");
    assert_eq!(body["blacklist_size"], 1);

    h.bot.close().await;
}

// =============================================================================
// METRICS
// =============================================================================

#[tokio::test]
async fn test_metrics_route() {
    let h = Harness::new();
    let metrics = Arc::new(MetricsState::new().unwrap());
    metrics.in_position.set(1);

    let (status, body) = get(app(&h, Some(metrics)), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("scalper_in_position 1"));
    assert!(body.contains("scalper_sell_attempts_total 0"));
}

#[tokio::test]
async fn test_metrics_route_absent_without_registry() {
    let h = Harness::new();
    let (status, _) = get(app(&h, None), "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
