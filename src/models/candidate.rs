//! Candidate token produced by discovery

use rust_decimal::Decimal;
use serde::Serialize;

/// A ranked trending token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Token mint address
    pub address: String,
    /// Pool name as reported by the scanner
    pub name: String,
    /// Ranking score, higher is better
    pub score: Decimal,
    /// 1h volume in USD
    pub volume_h1_usd: Decimal,
    /// Pool reserve in USD
    pub liquidity_usd: Decimal,
    /// 1h price change in percent
    pub price_change_h1: Decimal,
    /// 1h transaction count (buys + sells)
    pub txns_h1: u64,
    /// 1h buys over sells
    pub buy_sell_ratio: Decimal,
}
