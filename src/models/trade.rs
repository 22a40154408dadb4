//! Trade models - swap direction, per-attempt parameters and statistics

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Swap direction relative to the base currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    /// Base currency -> token
    Buy,
    /// Token -> base currency
    Sell,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            _ => Err(format!("Unknown trade action: {}", s)),
        }
    }
}

/// Per-attempt tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TradeParams {
    /// Multiplier applied to the base priority fee
    pub priority_multiplier: Decimal,
    /// Slippage tolerance in basis points
    pub slippage_bps: u16,
}

impl TradeParams {
    pub const fn new(priority_multiplier: Decimal, slippage_bps: u16) -> Self {
        Self {
            priority_multiplier,
            slippage_bps,
        }
    }

    /// Parameters for the zero-based sell attempt, `None` once the schedule is exhausted
    pub fn for_sell_attempt(attempt: usize) -> Option<Self> {
        SELL_SCHEDULE.get(attempt).copied()
    }
}

/// Escalating (priority multiplier, slippage) schedule for the exit sequence
pub const SELL_SCHEDULE: [TradeParams; 4] = [
    TradeParams::new(Decimal::from_parts(10, 0, 0, false, 1), 2000),
    TradeParams::new(Decimal::from_parts(15, 0, 0, false, 1), 3000),
    TradeParams::new(Decimal::from_parts(20, 0, 0, false, 1), 4000),
    TradeParams::new(Decimal::from_parts(30, 0, 0, false, 1), 5000),
];

/// Cumulative session statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    /// Buys that opened a position
    pub trades_executed: u64,
    /// Sells that closed a position
    pub sells_completed: u64,
    /// Realized profit in USD
    pub realized_profit_usd: Decimal,
    /// Positions cleared without a confirmed sell
    pub abandoned_positions: u64,
    /// Submitted buys whose entry price could not be fetched
    pub unpriced_buys: u64,
}
