//! Shared HTTP session
//!
//! One pooled client serves the RPC node, swap gateway, price oracle and
//! market data sources. Once released, every request made through the
//! session fails with [`SessionClosed`].

use crate::config::HttpConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Returned when a request is attempted on a released session
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("HTTP session is closed")]
pub struct SessionClosed;

/// Pooled HTTP client with an explicit release
#[derive(Debug)]
pub struct Session {
    client: reqwest::Client,
    closed: AtomicBool,
}

impl Session {
    /// Build the pooled client
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(Duration::from_millis(config.total_timeout_ms))
            .build()?;

        Ok(Self::from_client(client))
    }

    /// Wrap an existing client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    /// Client for issuing a request, unless the session was released
    pub fn client(&self) -> Result<&reqwest::Client, SessionClosed> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionClosed);
        }
        Ok(&self.client)
    }

    /// Release the session. Returns true only for the first call.
    pub fn release(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
