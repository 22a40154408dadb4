//! Telegram notification sink
//!
//! Sends alerts via Telegram Bot API with rate limiting to prevent spam.

use super::{AlertLevel, EventSink, NotifyError, TradeEvent};
use crate::config::TelegramNotificationConfig;
use crate::session::Session;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum interval between non-critical messages of the same kind and token
const RATE_LIMIT_SECONDS: u64 = 60;

/// Rate limiter for notifications
struct RateLimiter {
    /// Last sent time for each message key
    last_sent: RwLock<HashMap<String, Instant>>,
    /// Minimum interval between messages
    interval: Duration,
}

impl RateLimiter {
    fn new(interval_seconds: u64) -> Self {
        Self {
            last_sent: RwLock::new(HashMap::new()),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    /// Check if we can send a message with this key
    fn can_send(&self, key: &str) -> bool {
        let last_sent = self.last_sent.read();
        match last_sent.get(key) {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    fn mark_sent(&self, key: &str) {
        self.last_sent.write().insert(key.to_string(), Instant::now());
    }

    fn get_key(event: &TradeEvent) -> String {
        format!("{}:{}", event.kind(), event.token())
    }
}

/// Telegram notification sink
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    session: Arc<Session>,
    enabled: bool,
    rate_limiter: RateLimiter,
}

impl TelegramNotifier {
    /// Create a Telegram sink sharing the bot's HTTP session
    pub fn new(config: &TelegramNotificationConfig, session: Arc<Session>) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            session,
            enabled: config.enabled,
            rate_limiter: RateLimiter::new(RATE_LIMIT_SECONDS),
        }
    }

    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let client = self
            .session
            .client()
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        let response = client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api { status, body });
        }

        Ok(())
    }

    /// Format message with level prefix
    fn format_with_level(level: AlertLevel, message: &str) -> String {
        let level_prefix = match level {
            AlertLevel::Critical => "🔴 <b>CRITICAL</b>",
            AlertLevel::Important => "🟡 <b>IMPORTANT</b>",
            AlertLevel::Info => "🔵 <b>INFO</b>",
        };

        format!("{}\n\n{}", level_prefix, message)
    }
}

#[async_trait::async_trait]
impl EventSink for TelegramNotifier {
    async fn notify(&self, event: &TradeEvent) -> Result<(), NotifyError> {
        // Critical alerts bypass the rate limit
        let rate_key = RateLimiter::get_key(event);
        if event.level() != AlertLevel::Critical && !self.rate_limiter.can_send(&rate_key) {
            tracing::debug!(key = %rate_key, "Rate limited, skipping notification");
            return Ok(());
        }

        let level = event.level();
        let formatted = Self::format_with_level(level, &event.format_message());

        self.send_message(&formatted).await?;
        self.rate_limiter.mark_sent(&rate_key);

        tracing::debug!(level = %level, "Sent Telegram notification");

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}
