//! Trending pool scanner (GeckoTerminal)
//!
//! Ranks trending Solana pools by a weighted score of 1h price change,
//! volume, transaction count and buy/sell ratio.

use super::{CandidateSource, DiscoveryError};
use crate::config::DiscoveryConfig;
use crate::models::Candidate;
use crate::session::Session;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Pool {
    attributes: PoolAttributes,
    relationships: PoolRelationships,
}

#[derive(Debug, Deserialize)]
struct PoolAttributes {
    name: String,
    volume_usd: Timeframes<Decimal>,
    reserve_in_usd: Decimal,
    price_change_percentage: Timeframes<Decimal>,
    transactions: Timeframes<TxnCounts>,
}

#[derive(Debug, Deserialize)]
struct Timeframes<T> {
    h1: T,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct TxnCounts {
    buys: u64,
    sells: u64,
}

#[derive(Debug, Deserialize)]
struct PoolRelationships {
    base_token: Relationship,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: RelationshipData,
}

#[derive(Debug, Deserialize)]
struct RelationshipData {
    id: String,
}

/// Score weights: price change, volume per 1M USD, transactions per 1K, buy/sell ratio
const WEIGHT_PRICE_CHANGE: Decimal = Decimal::from_parts(3, 0, 0, false, 1);
const WEIGHT_VOLUME: Decimal = Decimal::from_parts(4, 0, 0, false, 1);
const WEIGHT_TXNS: Decimal = Decimal::from_parts(2, 0, 0, false, 1);
const WEIGHT_RATIO: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Ranking score of one pool
pub fn score(
    price_change_h1: Decimal,
    volume_h1_usd: Decimal,
    txns_h1: u64,
    buy_sell_ratio: Decimal,
) -> Decimal {
    price_change_h1 * WEIGHT_PRICE_CHANGE
        + volume_h1_usd / Decimal::from(1_000_000) * WEIGHT_VOLUME
        + Decimal::from(txns_h1) / Decimal::from(1_000) * WEIGHT_TXNS
        + buy_sell_ratio * WEIGHT_RATIO
}

/// Buys over sells, 1 when there were no sells
fn buy_sell_ratio(txns: TxnCounts) -> Decimal {
    if txns.sells == 0 {
        Decimal::ONE
    } else {
        Decimal::from(txns.buys) / Decimal::from(txns.sells)
    }
}

fn analyze_pool(pool: Pool, config: &DiscoveryConfig) -> Result<Option<Candidate>, DiscoveryError> {
    let attributes = pool.attributes;
    let address = pool
        .relationships
        .base_token
        .data
        .id
        .split_once('_')
        .map(|(_, address)| address.to_string())
        .filter(|address| !address.is_empty())
        .ok_or(DiscoveryError::MissingField("relationships.base_token.data.id"))?;

    let price_change = attributes.price_change_percentage.h1;
    let volume = attributes.volume_usd.h1;
    let liquidity = attributes.reserve_in_usd;

    if price_change <= Decimal::ZERO
        || volume < config.min_volume_usd
        || liquidity < config.min_liquidity_usd
    {
        return Ok(None);
    }

    let txns = attributes.transactions.h1;
    let ratio = buy_sell_ratio(txns);
    let total_txns = txns.buys + txns.sells;

    Ok(Some(Candidate {
        address,
        name: attributes.name,
        score: score(price_change, volume, total_txns, ratio),
        volume_h1_usd: volume,
        liquidity_usd: liquidity,
        price_change_h1: price_change,
        txns_h1: total_txns,
        buy_sell_ratio: ratio,
    }))
}

/// Filter and rank raw pool entries, best first. Malformed entries are skipped.
pub fn rank_pools(pools: Vec<serde_json::Value>, config: &DiscoveryConfig) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = pools
        .into_iter()
        .filter_map(|raw| {
            let analyzed = serde_json::from_value::<Pool>(raw)
                .map_err(DiscoveryError::from)
                .and_then(|pool| analyze_pool(pool, config));
            match analyzed {
                Ok(candidate) => candidate,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed pool");
                    None
                }
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(config.max_candidates);
    candidates
}

/// GeckoTerminal trending pools client
pub struct GeckoTerminalScanner {
    session: Arc<Session>,
    config: DiscoveryConfig,
}

impl GeckoTerminalScanner {
    pub fn new(session: Arc<Session>, config: DiscoveryConfig) -> Self {
        Self { session, config }
    }
}

#[async_trait::async_trait]
impl CandidateSource for GeckoTerminalScanner {
    async fn candidates(&self) -> Result<Vec<Candidate>, DiscoveryError> {
        let response = self
            .session
            .client()?
            .get(&self.config.trending_url)
            .query(&[("include", "address"), ("page", "1"), ("duration", "1h")])
            .header("accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }

        let body: TrendingResponse = response.json().await?;
        let candidates = rank_pools(body.data, &self.config);

        tracing::debug!(count = candidates.len(), "Trending scan complete");
        Ok(candidates)
    }
}
