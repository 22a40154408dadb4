//! Position models - on-chain balance readings and the position lifecycle

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;

/// One fresh read of a token account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    /// Amount in the token's smallest unit
    pub raw_amount: u64,
    /// Decimal exponent of the mint
    pub decimals: u8,
    /// Human-readable quantity
    pub ui_amount: Decimal,
}

impl TokenBalance {
    /// Build a reading from the raw amount, deriving the human-readable quantity
    pub fn from_raw(raw_amount: u64, decimals: u8) -> Self {
        Self {
            raw_amount,
            decimals,
            ui_amount: Decimal::try_from_i128_with_scale(raw_amount as i128, u32::from(decimals))
                .unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw_amount == 0
    }
}

/// The single held position
#[derive(Debug, Clone)]
pub struct Position {
    /// Monotonic id, distinguishes a position from any that preceded it
    pub id: u64,
    /// Token mint address
    pub token: String,
    /// Entry price in USD
    pub buy_price: Decimal,
    /// Wall-clock open time (for display)
    pub opened_at: DateTime<Utc>,
    /// Monotonic open time (for holding-time checks)
    pub opened: Instant,
    /// Verified quantity at purchase, if it settled in time
    pub quantity: Option<TokenBalance>,
    /// Buy transaction signature
    pub buy_signature: String,
}

impl Position {
    /// Time held so far
    pub fn held_for(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.opened)
    }
}

/// Why an exit sequence started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Profit percentage reached the target
    ProfitTarget,
    /// Maximum holding time elapsed
    Timeout,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::ProfitTarget => write!(f, "profit target"),
            ExitReason::Timeout => write!(f, "timeout exit"),
        }
    }
}

/// Why a position was cleared without a confirmed sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// Balance could not be confirmed before selling
    BalanceUnverified,
    /// Balance vanished between sell attempts
    BalanceDisappeared,
    /// Every scheduled sell attempt failed
    SellRetriesExhausted,
}

impl std::fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbandonReason::BalanceUnverified => write!(f, "balance unverified"),
            AbandonReason::BalanceDisappeared => write!(f, "balance disappeared"),
            AbandonReason::SellRetriesExhausted => write!(f, "sell retries exhausted"),
        }
    }
}

/// Lifecycle phase of the position slot
///
/// State transitions:
/// ```text
/// NONE -> BUYING -> OPEN -> EXITING -> NONE (sold)
///           |                  |
///           v                  v
///          NONE            ABANDONED -> BUYING
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionPhase {
    /// No position, buys allowed
    None,
    /// A buy holds the slot
    Buying,
    /// Position held and monitored
    Open,
    /// Exit sequence running
    Exiting,
    /// Cleared without a confirmed sell, needs reconciliation
    Abandoned,
}

impl PositionPhase {
    /// Check if transition to new phase is valid
    pub fn can_transition_to(&self, next: PositionPhase) -> bool {
        use PositionPhase::*;

        matches!(
            (self, next),
            (None, Buying)
                | (Abandoned, Buying)
                | (Buying, Open)
                | (Buying, None)
                | (Open, Exiting)
                | (Exiting, None)
                | (Exiting, Abandoned)
        )
    }

    /// Whether the slot is occupied (no new buy may start)
    pub fn is_occupied(&self) -> bool {
        matches!(
            self,
            PositionPhase::Buying | PositionPhase::Open | PositionPhase::Exiting
        )
    }
}

impl std::fmt::Display for PositionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionPhase::None => write!(f, "NONE"),
            PositionPhase::Buying => write!(f, "BUYING"),
            PositionPhase::Open => write!(f, "OPEN"),
            PositionPhase::Exiting => write!(f, "EXITING"),
            PositionPhase::Abandoned => write!(f, "ABANDONED"),
        }
    }
}

/// Position slot with its data
#[derive(Debug, Clone, Default)]
pub enum PositionState {
    #[default]
    None,
    Buying {
        token: String,
    },
    Open(Position),
    Exiting(Position),
    Abandoned(Position),
}

impl PositionState {
    pub fn phase(&self) -> PositionPhase {
        match self {
            PositionState::None => PositionPhase::None,
            PositionState::Buying { .. } => PositionPhase::Buying,
            PositionState::Open(_) => PositionPhase::Open,
            PositionState::Exiting(_) => PositionPhase::Exiting,
            PositionState::Abandoned(_) => PositionPhase::Abandoned,
        }
    }

    /// Token mint the slot refers to, if any
    pub fn token(&self) -> Option<&str> {
        match self {
            PositionState::None => None,
            PositionState::Buying { token } => Some(token),
            PositionState::Open(p) | PositionState::Exiting(p) | PositionState::Abandoned(p) => {
                Some(&p.token)
            }
        }
    }

    /// Position data, if one is held or was abandoned
    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Open(p) | PositionState::Exiting(p) | PositionState::Abandoned(p) => {
                Some(p)
            }
            _ => None,
        }
    }
}
