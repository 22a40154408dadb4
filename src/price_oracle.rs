//! Price oracle client
//!
//! Single-token USD quotes from the Jupiter Price API
//! (`GET <price_url>?ids=<mint>` -> `{data: {<mint>: {price}}}`).

use crate::session::{Session, SessionClosed};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Price oracle errors
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Session released
    #[error(transparent)]
    Closed(#[from] SessionClosed),

    /// HTTP request failed
    #[error("Price request failed: {0}")]
    Http(String),

    /// Rate limited by the API
    #[error("Price API rate limited")]
    RateLimited,

    /// Response could not be parsed
    #[error("Failed to parse price response: {0}")]
    Parse(String),

    /// Token missing from the response, or priced at zero
    #[error("No price available for {0}")]
    NoPrice(String),
}

/// USD price source
#[async_trait::async_trait]
pub trait PriceOracle: Send + Sync {
    /// Current USD price of `mint`. Never returns zero.
    async fn price_usd(&self, mint: &str) -> Result<Decimal, OracleError>;
}

/// Jupiter Price API response structure
#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: HashMap<String, Option<PriceData>>,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    price: Option<Decimal>,
}

/// HTTP implementation over the shared session
pub struct HttpPriceOracle {
    session: Arc<Session>,
    url: String,
}

impl HttpPriceOracle {
    pub fn new(session: Arc<Session>, url: impl Into<String>) -> Self {
        Self {
            session,
            url: url.into(),
        }
    }
}

fn extract_price(body: PriceResponse, mint: &str) -> Result<Decimal, OracleError> {
    body.data
        .get(mint)
        .and_then(|entry| entry.as_ref())
        .and_then(|entry| entry.price)
        .filter(|price| *price > Decimal::ZERO)
        .ok_or_else(|| OracleError::NoPrice(mint.to_string()))
}

#[async_trait::async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn price_usd(&self, mint: &str) -> Result<Decimal, OracleError> {
        let response = self
            .session
            .client()?
            .get(&self.url)
            .query(&[("ids", mint)])
            .send()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimited);
        }

        if !response.status().is_success() {
            return Err(OracleError::Http(format!(
                "Price API returned error: {}",
                response.status()
            )));
        }

        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        extract_price(body, mint)
    }
}
