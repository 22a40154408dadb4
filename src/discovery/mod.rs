//! Token discovery
//!
//! Trending candidates come from a [`CandidateSource`], per-token pair data
//! from a [`MarketDataSource`]. The discovery loop feeds candidates to the
//! bot while no position is held.

pub mod pairs;
pub mod scanner;

pub use pairs::{predict_upward_movement, DexScreenerClient, PairData, PairFilter, Prediction};
pub use scanner::GeckoTerminalScanner;

use crate::config::DiscoveryConfig;
use crate::engine::{Bot, Evaluation};
use crate::models::Candidate;
use crate::session::SessionClosed;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Discovery errors
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Closed(#[from] SessionClosed),

    #[error("Market data request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Market data API returned status {0}")]
    Status(u16),

    #[error("Malformed market data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field in market data: {0}")]
    MissingField(&'static str),
}

/// Ranked trending tokens, best first
#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    async fn candidates(&self) -> Result<Vec<Candidate>, DiscoveryError>;
}

/// Per-token pair data
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    /// First listed pair for `mint`, if any
    async fn pair_data(&self, mint: &str) -> Result<Option<PairData>, DiscoveryError>;
}

/// Feed candidates to the bot until cancelled or the bot is closed
pub async fn run_discovery_loop(
    bot: Arc<Bot>,
    source: Arc<dyn CandidateSource>,
    config: DiscoveryConfig,
    cancel: CancellationToken,
) {
    tracing::info!("Discovery loop started");

    loop {
        if cancel.is_cancelled() || bot.is_closed() {
            break;
        }

        let delay = if bot.currently_in_position() {
            Duration::from_secs(config.in_position_interval_secs)
        } else {
            run_cycle(&bot, source.as_ref(), &config).await
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracing::info!("Discovery loop stopped");
}

/// One scan-and-evaluate pass. Returns the delay before the next pass.
async fn run_cycle(bot: &Bot, source: &dyn CandidateSource, config: &DiscoveryConfig) -> Duration {
    let candidates = match source.candidates().await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::error!(error = %e, "Candidate scan failed");
            return Duration::from_secs(config.error_backoff_secs);
        }
    };

    if candidates.is_empty() {
        tracing::info!(
            retry_secs = config.empty_backoff_secs,
            "No trending tokens found"
        );
        return Duration::from_secs(config.empty_backoff_secs);
    }

    for candidate in candidates.iter().take(config.candidates_per_cycle) {
        tracing::info!(
            token = %candidate.address,
            name = %candidate.name,
            score = %candidate.score.round_dp(2),
            "Evaluating candidate"
        );

        if bot.evaluate_candidate(candidate).await == Evaluation::Bought {
            break;
        }
    }

    Duration::from_secs(config.cycle_interval_secs)
}
