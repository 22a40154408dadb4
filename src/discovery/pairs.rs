//! Pair data (DexScreener) and the short-term pre-trade filter

use super::{DiscoveryError, MarketDataSource};
use crate::config::DiscoveryConfig;
use crate::session::Session;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

/// Pair snapshot for one token
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairData {
    #[serde(default)]
    pub pair_address: Option<String>,
    #[serde(default)]
    pub market_cap: Option<Decimal>,
    #[serde(default)]
    pub txns: Option<PairTxns>,
    #[serde(default)]
    pub volume: Option<PairVolume>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PairTxns {
    pub m5: Option<TxnWindow>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct TxnWindow {
    pub buys: u64,
    pub sells: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PairVolume {
    #[serde(default)]
    pub m5: f64,
}

/// Thresholds for [`predict_upward_movement`]
#[derive(Debug, Clone, Copy)]
pub struct PairFilter {
    pub m5_ratio_threshold: f64,
    pub m5_volume_threshold: f64,
    pub score_threshold: u32,
}

impl From<&DiscoveryConfig> for PairFilter {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            m5_ratio_threshold: config.m5_ratio_threshold,
            m5_volume_threshold: config.m5_volume_threshold,
            score_threshold: config.prediction_score_threshold,
        }
    }
}

/// Outcome of the pair filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub upward: bool,
    pub score: u32,
    /// 5-minute buys over sells, when trade counts were present
    pub m5_ratio: Option<f64>,
}

/// Score short-term buy pressure and volume
///
/// +1 when the 5-minute buy/sell ratio reaches the ratio threshold, +2 when
/// the 5-minute volume reaches the volume threshold. Missing trade counts
/// never predict.
pub fn predict_upward_movement(pair: &PairData, filter: PairFilter) -> Prediction {
    let Some(m5) = pair.txns.as_ref().and_then(|txns| txns.m5) else {
        return Prediction {
            upward: false,
            score: 0,
            m5_ratio: None,
        };
    };

    let m5_ratio = m5.buys as f64 / m5.sells.max(1) as f64;
    let m5_volume = pair.volume.as_ref().map(|v| v.m5).unwrap_or(0.0);

    let mut score = 0;
    if m5_ratio >= filter.m5_ratio_threshold {
        score += 1;
    }
    if m5_volume >= filter.m5_volume_threshold {
        score += 2;
    }

    Prediction {
        upward: score >= filter.score_threshold,
        score,
        m5_ratio: Some(m5_ratio),
    }
}

/// DexScreener token-pairs client
pub struct DexScreenerClient {
    session: Arc<Session>,
    url: String,
}

impl DexScreenerClient {
    pub fn new(session: Arc<Session>, url: impl Into<String>) -> Self {
        Self {
            session,
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl MarketDataSource for DexScreenerClient {
    async fn pair_data(&self, mint: &str) -> Result<Option<PairData>, DiscoveryError> {
        let url = format!("{}/{}", self.url.trim_end_matches('/'), mint);
        let response = self.session.client()?.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }

        let pairs: Vec<PairData> = response.json().await?;
        Ok(pairs.into_iter().next())
    }
}
