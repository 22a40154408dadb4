//! Prometheus metrics for Raydium Scalper
//!
//! Exposes metrics endpoint for monitoring:
//! - Trade outcomes by action
//! - Sell attempts and executor retries
//! - Abandoned positions and unpriced buys
//! - Realized profit and in-position gauge
//! - Trade latency histogram

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics state
pub struct MetricsState {
    /// Prometheus registry
    registry: Registry,
    /// Executor outcomes, labelled by action (buy/sell) and outcome (success/failure)
    pub trades: IntCounterVec,
    /// Sell attempts started by the position monitor
    pub sell_attempts: IntCounter,
    /// Whole-attempt retries after transient errors
    pub executor_retries: IntCounter,
    /// Positions cleared without a confirmed sell
    pub abandoned_positions: IntCounter,
    /// Buys that landed without an entry price
    pub unpriced_buys: IntCounter,
    /// Cumulative realized profit in USD
    pub realized_profit_usd: Gauge,
    /// 1 while the position slot is occupied
    pub in_position: IntGauge,
    /// Executor latency (in milliseconds)
    pub trade_latency: Histogram,
}

fn register<T: Collector + Clone + 'static>(registry: &Registry, metric: T) -> prometheus::Result<T> {
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl MetricsState {
    /// Create a new metrics state with all metrics registered
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let trades = register(
            &registry,
            IntCounterVec::new(
                Opts::new("scalper_trades_total", "Trade executor outcomes"),
                &["action", "outcome"],
            )?,
        )?;

        let sell_attempts = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "scalper_sell_attempts_total",
                "Sell attempts started by the position monitor",
            ))?,
        )?;

        let executor_retries = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "scalper_executor_retries_total",
                "Trade attempts retried after transient errors",
            ))?,
        )?;

        let abandoned_positions = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "scalper_abandoned_positions_total",
                "Positions cleared without a confirmed sell",
            ))?,
        )?;

        let unpriced_buys = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "scalper_unpriced_buys_total",
                "Buys that landed without an entry price",
            ))?,
        )?;

        let realized_profit_usd = register(
            &registry,
            Gauge::with_opts(Opts::new(
                "scalper_realized_profit_usd",
                "Cumulative realized profit in USD",
            ))?,
        )?;

        let in_position = register(
            &registry,
            IntGauge::with_opts(Opts::new(
                "scalper_in_position",
                "Whether a position is currently held (1) or not (0)",
            ))?,
        )?;

        let trade_latency = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "scalper_trade_latency_ms",
                    "Trade executor latency in milliseconds",
                )
                .buckets(vec![
                    100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0,
                ]),
            )?,
        )?;

        Ok(Self {
            registry,
            trades,
            sell_attempts,
            executor_retries,
            abandoned_positions,
            unpriced_buys,
            realized_profit_usd,
            in_position,
            trade_latency,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one executor outcome
    pub fn record_trade(&self, action: crate::models::TradeAction, success: bool) {
        let action = match action {
            crate::models::TradeAction::Buy => "buy",
            crate::models::TradeAction::Sell => "sell",
        };
        let outcome = if success { "success" } else { "failure" };
        self.trades.with_label_values(&[action, outcome]).inc();
    }
}

/// Metrics handler - returns Prometheus metrics in text format
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.registry().gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}

/// Create metrics router
pub fn metrics_router() -> Router<Arc<MetricsState>> {
    Router::new().route("/metrics", get(metrics_handler))
}
