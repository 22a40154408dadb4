//! Trade lifecycle notifications
//!
//! Every event is logged; sinks such as Telegram receive a copy:
//! - Buy executed / sell executed
//! - Exit triggered
//! - Position abandoned (needs reconciliation)
//! - Unpriced buy (swap landed, no position tracked)

pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::models::{AbandonReason, ExitReason};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Alert level for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Unreconciled on-chain state, operator attention required
    Critical,
    /// Completed trades
    Important,
    /// Informational
    Info,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Critical => write!(f, "CRITICAL"),
            AlertLevel::Important => write!(f, "IMPORTANT"),
            AlertLevel::Info => write!(f, "INFO"),
        }
    }
}

/// Trade lifecycle events
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    /// Buy landed and the position opened
    BuyExecuted {
        token: String,
        price_usd: Decimal,
        amount_lamports: u64,
        signature: String,
    },
    /// Buy landed but its entry price could not be fetched
    UnpricedBuy { token: String, signature: String },
    /// Exit condition met
    ExitTriggered {
        token: String,
        reason: ExitReason,
        profit_percent: Decimal,
    },
    /// Sell landed and the position closed
    SellExecuted {
        token: String,
        attempt: usize,
        profit_usd: Option<Decimal>,
        signature: String,
    },
    /// Position cleared without a confirmed sell
    PositionAbandoned { token: String, reason: AbandonReason },
}

impl TradeEvent {
    /// Get the alert level for this event
    pub fn level(&self) -> AlertLevel {
        match self {
            TradeEvent::UnpricedBuy { .. } => AlertLevel::Critical,
            TradeEvent::PositionAbandoned { .. } => AlertLevel::Critical,
            TradeEvent::BuyExecuted { .. } => AlertLevel::Important,
            TradeEvent::SellExecuted { .. } => AlertLevel::Important,
            TradeEvent::ExitTriggered { .. } => AlertLevel::Info,
        }
    }

    /// Short event kind, used for rate limiting and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            TradeEvent::BuyExecuted { .. } => "buy_executed",
            TradeEvent::UnpricedBuy { .. } => "unpriced_buy",
            TradeEvent::ExitTriggered { .. } => "exit_triggered",
            TradeEvent::SellExecuted { .. } => "sell_executed",
            TradeEvent::PositionAbandoned { .. } => "position_abandoned",
        }
    }

    pub fn token(&self) -> &str {
        match self {
            TradeEvent::BuyExecuted { token, .. }
            | TradeEvent::UnpricedBuy { token, .. }
            | TradeEvent::ExitTriggered { token, .. }
            | TradeEvent::SellExecuted { token, .. }
            | TradeEvent::PositionAbandoned { token, .. } => token,
        }
    }

    /// Format the event as a notification message
    pub fn format_message(&self) -> String {
        match self {
            TradeEvent::BuyExecuted {
                token,
                price_usd,
                amount_lamports,
                ..
            } => format!(
                "🟢 Bought {} at ${} ({} SOL)",
                token,
                price_usd,
                crate::utils::lamports_to_sol(*amount_lamports)
            ),
            TradeEvent::UnpricedBuy { token, signature } => format!(
                "🚨 Buy of {} landed without an entry price, tokens are untracked (tx {})",
                token, signature
            ),
            TradeEvent::ExitTriggered {
                token,
                reason,
                profit_percent,
            } => format!(
                "⏳ Exiting {} on {} ({:+.2}%)",
                token, reason, profit_percent
            ),
            TradeEvent::SellExecuted {
                token,
                attempt,
                profit_usd,
                ..
            } => match profit_usd {
                Some(profit) => {
                    let emoji = if profit.is_sign_negative() { "📉" } else { "💰" };
                    format!(
                        "{} Sold {} on attempt {} | Profit: ${:.4}",
                        emoji,
                        token,
                        attempt + 1,
                        profit
                    )
                }
                None => format!(
                    "💱 Sold {} on attempt {} | Profit unknown (no exit price)",
                    token,
                    attempt + 1
                ),
            },
            TradeEvent::PositionAbandoned { token, reason } => format!(
                "🚨 Position in {} abandoned: {}. On-chain balance may remain",
                token, reason
            ),
        }
    }
}

/// Notification sink errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("Notification request failed: {0}")]
    Http(String),

    /// Remote API rejected the message
    #[error("Notification API error: {status} - {body}")]
    Api { status: u16, body: String },
}

/// Notification sink trait
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver an event
    async fn notify(&self, event: &TradeEvent) -> Result<(), NotifyError>;

    /// Check if the sink is enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Sink that writes every event to the log
pub struct LogNotifier;

#[async_trait::async_trait]
impl EventSink for LogNotifier {
    async fn notify(&self, event: &TradeEvent) -> Result<(), NotifyError> {
        let message = event.format_message();
        match event.level() {
            AlertLevel::Critical => tracing::error!(
                alert = true,
                event = event.kind(),
                token = %event.token(),
                "{}",
                message
            ),
            AlertLevel::Important => tracing::info!(
                event = event.kind(),
                token = %event.token(),
                "{}",
                message
            ),
            AlertLevel::Info => tracing::debug!(
                event = event.kind(),
                token = %event.token(),
                "{}",
                message
            ),
        }
        Ok(())
    }
}

/// Composite notifier that fans out to multiple sinks
pub struct CompositeNotifier {
    services: Vec<Arc<dyn EventSink>>,
}

impl CompositeNotifier {
    /// Create an empty notifier
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
        }
    }

    /// Notifier with the log sink installed
    pub fn with_logging() -> Self {
        let mut notifier = Self::new();
        notifier.add_service(Arc::new(LogNotifier));
        notifier
    }

    /// Add a notification sink
    pub fn add_service(&mut self, service: Arc<dyn EventSink>) {
        self.services.push(service);
    }

    /// Send the event to all enabled sinks. Sink failures are logged, never returned.
    pub async fn notify(&self, event: TradeEvent) {
        for service in &self.services {
            if service.is_enabled() {
                if let Err(e) = service.notify(&event).await {
                    tracing::error!(
                        error = %e,
                        event = event.kind(),
                        "Failed to send notification"
                    );
                }
            }
        }
    }
}

impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::with_logging()
    }
}
