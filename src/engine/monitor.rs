//! Position monitor
//!
//! One task per open position. Polls the price, decides when to exit and
//! drives the escalating sell sequence. The task ends as soon as its
//! position is no longer the current one, or on shutdown.

use super::balance::BalanceVerifier;
use super::executor::TradeExecutor;
use super::state::TradingState;
use crate::config::MonitorConfig;
use crate::metrics::MetricsState;
use crate::models::{AbandonReason, ExitReason, Position, TradeParams, SELL_SCHEDULE};
use crate::notifications::{CompositeNotifier, TradeEvent};
use crate::price_oracle::PriceOracle;
use crate::token::parse_pubkey;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Base of the backoff between sell attempts (seconds, raised to the attempt number)
const SELL_BACKOFF_BASE: f64 = 1.5;

/// Result of evaluating exit conditions for one price observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCheck {
    /// Profit relative to the entry price, in percent
    pub profit_percent: Decimal,
    /// Trigger, if any. Profit target wins over timeout.
    pub trigger: Option<ExitReason>,
}

/// Evaluate exit triggers. There is deliberately no stop-loss.
pub fn evaluate_exit(
    buy_price: Decimal,
    current_price: Decimal,
    held: Duration,
    profit_target_percent: Decimal,
    max_hold: Duration,
) -> ExitCheck {
    let profit_percent = if buy_price > Decimal::ZERO {
        (current_price - buy_price) / buy_price * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    let trigger = if profit_percent >= profit_target_percent {
        Some(ExitReason::ProfitTarget)
    } else if held >= max_hold {
        Some(ExitReason::Timeout)
    } else {
        None
    };

    ExitCheck {
        profit_percent,
        trigger,
    }
}

/// Delay before the sell attempt following `failed_attempts` failures
pub fn sell_backoff(failed_attempts: u32) -> Duration {
    Duration::from_secs_f64(SELL_BACKOFF_BASE.powi(failed_attempts as i32))
}

/// How a monitor task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Position sold
    Sold,
    /// Position cleared without a sell
    Abandoned(AbandonReason),
    /// Position was no longer current
    Superseded,
    /// Shutdown requested
    Cancelled,
}

/// Watches the open position and drives its exit
pub struct PositionMonitor {
    executor: Arc<TradeExecutor>,
    verifier: Arc<BalanceVerifier>,
    oracle: Arc<dyn PriceOracle>,
    state: Arc<TradingState>,
    notifier: Arc<CompositeNotifier>,
    metrics: Option<Arc<MetricsState>>,
    config: MonitorConfig,
    cancel: CancellationToken,
}

impl PositionMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executor: Arc<TradeExecutor>,
        verifier: Arc<BalanceVerifier>,
        oracle: Arc<dyn PriceOracle>,
        state: Arc<TradingState>,
        notifier: Arc<CompositeNotifier>,
        metrics: Option<Arc<MetricsState>>,
        config: MonitorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            executor,
            verifier,
            oracle,
            state,
            notifier,
            metrics,
            config,
            cancel,
        }
    }

    /// Watch `position` until it is sold, abandoned, superseded or shutdown is requested
    pub async fn watch(self: Arc<Self>, position: Position) -> MonitorOutcome {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_hold = Duration::from_secs(self.config.max_hold_secs);

        tracing::info!(
            token = %position.token,
            position_id = position.id,
            buy_price = %position.buy_price,
            "Monitoring position"
        );

        loop {
            if self.cancel.is_cancelled() {
                return MonitorOutcome::Cancelled;
            }
            if !self.state.is_current(position.id) {
                tracing::debug!(position_id = position.id, "Position no longer current, monitor exiting");
                return MonitorOutcome::Superseded;
            }

            let price = tokio::select! {
                _ = self.cancel.cancelled() => return MonitorOutcome::Cancelled,
                price = self.oracle.price_usd(&position.token) => price,
            };

            let current_price = match price {
                Ok(price) => price,
                Err(e) => {
                    tracing::debug!(token = %position.token, error = %e, "Price unavailable");
                    if !self.pause(poll_interval).await {
                        return MonitorOutcome::Cancelled;
                    }
                    continue;
                }
            };

            let check = evaluate_exit(
                position.buy_price,
                current_price,
                position.held_for(Instant::now()),
                self.config.profit_target_percent,
                max_hold,
            );

            if let Some(reason) = check.trigger {
                tracing::info!(
                    token = %position.token,
                    reason = %reason,
                    profit_percent = %check.profit_percent.round_dp(2),
                    "Exit triggered"
                );
                self.notifier
                    .notify(TradeEvent::ExitTriggered {
                        token: position.token.clone(),
                        reason,
                        profit_percent: check.profit_percent,
                    })
                    .await;

                match self.exit(&position).await {
                    Some(outcome) => return outcome,
                    None => {
                        if !self.pause(Duration::from_millis(self.config.error_backoff_ms)).await {
                            return MonitorOutcome::Cancelled;
                        }
                        continue;
                    }
                }
            }

            tracing::debug!(
                token = %position.token,
                price = %current_price,
                profit_percent = %check.profit_percent.round_dp(2),
                "Holding"
            );

            if !self.pause(poll_interval).await {
                return MonitorOutcome::Cancelled;
            }
        }
    }

    /// Run the exit sequence. `None` means the sequence could not start.
    async fn exit(&self, position: &Position) -> Option<MonitorOutcome> {
        if let Err(e) = self.state.begin_exit(position.id) {
            tracing::error!(position_id = position.id, error = %e, "Could not start exit");
            return None;
        }

        let Some(mint) = parse_pubkey(&position.token) else {
            return Some(self.abandon(position, AbandonReason::BalanceUnverified).await);
        };

        // Confirm there is something to sell, once more after a pause
        if !self.verifier.verify(&mint).await.is_valid() {
            tracing::warn!(token = %position.token, "Balance not confirmed before sell, re-verifying");
            if !self.pause(Duration::from_millis(self.config.reverify_delay_ms)).await {
                return Some(MonitorOutcome::Cancelled);
            }
            if !self.verifier.verify(&mint).await.is_valid() {
                return Some(self.abandon(position, AbandonReason::BalanceUnverified).await);
            }
        }

        let mut attempt = 0;
        while let Some(params) = TradeParams::for_sell_attempt(attempt) {
            if self.cancel.is_cancelled() {
                return Some(MonitorOutcome::Cancelled);
            }
            if let Some(metrics) = &self.metrics {
                metrics.sell_attempts.inc();
            }

            tracing::info!(
                token = %position.token,
                attempt = attempt + 1,
                max_attempts = SELL_SCHEDULE.len(),
                priority_multiplier = %params.priority_multiplier,
                slippage_bps = params.slippage_bps,
                "Selling"
            );

            match self.executor.sell(&position.token, params).await {
                Ok(receipt) => {
                    self.notifier
                        .notify(TradeEvent::SellExecuted {
                            token: position.token.clone(),
                            attempt,
                            profit_usd: receipt.profit_usd,
                            signature: receipt.signature,
                        })
                        .await;
                    return Some(MonitorOutcome::Sold);
                }
                Err(e) => {
                    tracing::warn!(
                        token = %position.token,
                        attempt = attempt + 1,
                        error = %e,
                        "Sell attempt failed"
                    );
                }
            }

            if !self.state.is_current(position.id) {
                return Some(MonitorOutcome::Superseded);
            }

            if !self.verifier.verify(&mint).await.is_valid() {
                return Some(self.abandon(position, AbandonReason::BalanceDisappeared).await);
            }

            attempt += 1;
            if attempt < SELL_SCHEDULE.len() && !self.pause(sell_backoff(attempt as u32)).await {
                return Some(MonitorOutcome::Cancelled);
            }
        }

        Some(self.abandon(position, AbandonReason::SellRetriesExhausted).await)
    }

    async fn abandon(&self, position: &Position, reason: AbandonReason) -> MonitorOutcome {
        if let Err(e) = self.state.abandon(position.id, reason) {
            tracing::error!(position_id = position.id, error = %e, "Could not mark position abandoned");
            return MonitorOutcome::Superseded;
        }

        if let Some(metrics) = &self.metrics {
            metrics.abandoned_positions.inc();
            metrics.in_position.set(0);
        }

        self.notifier
            .notify(TradeEvent::PositionAbandoned {
                token: position.token.clone(),
                reason,
            })
            .await;

        MonitorOutcome::Abandoned(reason)
    }

    /// Sleep unless shutdown is requested. Returns false when cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
