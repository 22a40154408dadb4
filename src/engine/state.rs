//! Trading state shared by the executor, the position monitor and the controller
//!
//! All mutation goes through one mutex so position transitions never
//! interleave. The lock is never held across an await point.

use crate::models::{
    AbandonReason, Position, PositionPhase, PositionState, Statistics, TokenBalance,
};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Position state errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Transition not allowed from the current phase
    #[error("Illegal position transition {from} -> {to}")]
    IllegalTransition {
        from: PositionPhase,
        to: PositionPhase,
    },

    /// The referenced position is no longer the current one
    #[error("Position {0} is not current")]
    NotCurrent(u64),

    /// No position is held for the token
    #[error("No position held in {0}")]
    NoPosition(String),

    /// New buys are blocked until the cooldown elapses
    #[error("Cooldown active for another {0:?}")]
    CooldownActive(Duration),
}

#[derive(Debug, Default)]
struct Inner {
    position: PositionState,
    blacklist: HashSet<String>,
    cooldown_until: Option<Instant>,
    stats: Statistics,
    next_position_id: u64,
}

/// Process-wide trading state
#[derive(Debug, Default)]
pub struct TradingState {
    inner: Mutex<Inner>,
}

impl TradingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> PositionPhase {
        self.inner.lock().position.phase()
    }

    /// Copy of the position slot
    pub fn position_state(&self) -> PositionState {
        self.inner.lock().position.clone()
    }

    /// Whether the slot is occupied (buying, open or exiting)
    pub fn is_in_position(&self) -> bool {
        self.phase().is_occupied()
    }

    /// Held position (open or exiting) with this id
    pub fn current_position(&self, id: u64) -> Option<Position> {
        match &self.inner.lock().position {
            PositionState::Open(p) | PositionState::Exiting(p) if p.id == id => Some(p.clone()),
            _ => None,
        }
    }

    /// Whether `id` still names the held position
    pub fn is_current(&self, id: u64) -> bool {
        self.current_position(id).is_some()
    }

    pub fn is_blacklisted(&self, token: &str) -> bool {
        self.inner.lock().blacklist.contains(token)
    }

    /// Add a token to the blacklist. Returns false if it was already present.
    pub fn blacklist(&self, token: &str) -> bool {
        self.inner.lock().blacklist.insert(token.to_string())
    }

    pub fn blacklist_len(&self) -> usize {
        self.inner.lock().blacklist.len()
    }

    /// Time left before a buy is allowed, `None` once elapsed
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.inner
            .lock()
            .cooldown_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn stats(&self) -> Statistics {
        self.inner.lock().stats.clone()
    }

    /// Claim the slot for a buy of `token`
    ///
    /// The returned guard puts the slot back to NONE unless the buy commits.
    pub fn reserve_buy(self: &Arc<Self>, token: &str) -> Result<BuyReservation, StateError> {
        let mut inner = self.inner.lock();

        if let Some(remaining) = inner
            .cooldown_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
        {
            return Err(StateError::CooldownActive(remaining));
        }

        let from = inner.position.phase();
        if !from.can_transition_to(PositionPhase::Buying) {
            return Err(StateError::IllegalTransition {
                from,
                to: PositionPhase::Buying,
            });
        }

        inner.position = PositionState::Buying {
            token: token.to_string(),
        };

        Ok(BuyReservation {
            state: Arc::clone(self),
            token: token.to_string(),
            committed: false,
        })
    }

    /// Move a held position into the exit sequence, returning it
    pub fn begin_exit(&self, id: u64) -> Result<Position, StateError> {
        let mut inner = self.inner.lock();
        match std::mem::take(&mut inner.position) {
            PositionState::Open(p) if p.id == id => {
                inner.position = PositionState::Exiting(p.clone());
                Ok(p)
            }
            PositionState::Exiting(p) if p.id == id => {
                inner.position = PositionState::Exiting(p.clone());
                Ok(p)
            }
            other => {
                let from = other.phase();
                inner.position = other;
                if from == PositionPhase::Open || from == PositionPhase::Exiting {
                    Err(StateError::NotCurrent(id))
                } else {
                    Err(StateError::IllegalTransition {
                        from,
                        to: PositionPhase::Exiting,
                    })
                }
            }
        }
    }

    /// Held position in `token`, moved into the exit sequence if it was still open
    pub fn position_for_sell(&self, token: &str) -> Result<Position, StateError> {
        let id = {
            let inner = self.inner.lock();
            match &inner.position {
                PositionState::Open(p) | PositionState::Exiting(p) if p.token == token => p.id,
                _ => return Err(StateError::NoPosition(token.to_string())),
            }
        };
        self.begin_exit(id)
    }

    /// Record the verified quantity of the held position
    pub fn set_quantity(&self, id: u64, quantity: TokenBalance) -> bool {
        let mut inner = self.inner.lock();
        match &mut inner.position {
            PositionState::Open(p) | PositionState::Exiting(p) if p.id == id => {
                p.quantity = Some(quantity);
                true
            }
            _ => false,
        }
    }

    /// Close the exiting position after a confirmed sell
    ///
    /// Clears the slot, accumulates profit if known and starts the cooldown.
    pub fn complete_sell(
        &self,
        id: u64,
        profit_usd: Option<Decimal>,
        cooldown: Duration,
    ) -> Result<Position, StateError> {
        let mut inner = self.inner.lock();
        match std::mem::take(&mut inner.position) {
            PositionState::Exiting(p) if p.id == id => {
                inner.stats.sells_completed += 1;
                if let Some(profit) = profit_usd {
                    inner.stats.realized_profit_usd += profit;
                }
                inner.cooldown_until = Some(Instant::now() + cooldown);
                Ok(p)
            }
            other => {
                let from = other.phase();
                inner.position = other;
                Err(StateError::IllegalTransition {
                    from,
                    to: PositionPhase::None,
                })
            }
        }
    }

    /// Clear the exiting position without a sell
    ///
    /// No cooldown starts and no profit is recorded.
    pub fn abandon(&self, id: u64, reason: AbandonReason) -> Result<Position, StateError> {
        let mut inner = self.inner.lock();
        match std::mem::take(&mut inner.position) {
            PositionState::Exiting(p) if p.id == id => {
                inner.stats.abandoned_positions += 1;
                inner.position = PositionState::Abandoned(p.clone());
                tracing::debug!(position_id = id, reason = %reason, "Position slot abandoned");
                Ok(p)
            }
            other => {
                let from = other.phase();
                inner.position = other;
                Err(StateError::IllegalTransition {
                    from,
                    to: PositionPhase::Abandoned,
                })
            }
        }
    }

    pub fn record_unpriced_buy(&self) {
        self.inner.lock().stats.unpriced_buys += 1;
    }

    fn commit_buy(
        &self,
        token: &str,
        buy_price: Decimal,
        buy_signature: String,
    ) -> Result<Position, StateError> {
        let mut inner = self.inner.lock();
        match &inner.position {
            PositionState::Buying { token: reserved } if reserved == token => {}
            other => {
                return Err(StateError::IllegalTransition {
                    from: other.phase(),
                    to: PositionPhase::Open,
                })
            }
        }

        inner.next_position_id += 1;
        let position = Position {
            id: inner.next_position_id,
            token: token.to_string(),
            buy_price,
            opened_at: Utc::now(),
            opened: Instant::now(),
            quantity: None,
            buy_signature,
        };

        inner.stats.trades_executed += 1;
        inner.position = PositionState::Open(position.clone());
        Ok(position)
    }

    fn release_buy(&self, token: &str) {
        let mut inner = self.inner.lock();
        if matches!(&inner.position, PositionState::Buying { token: reserved } if reserved == token)
        {
            inner.position = PositionState::None;
        }
    }
}

/// Exclusive claim on the position slot while a buy is in flight
#[derive(Debug)]
pub struct BuyReservation {
    state: Arc<TradingState>,
    token: String,
    committed: bool,
}

impl BuyReservation {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Open the position
    pub fn open(mut self, buy_price: Decimal, buy_signature: String) -> Result<Position, StateError> {
        let position = self.state.commit_buy(&self.token, buy_price, buy_signature)?;
        self.committed = true;
        Ok(position)
    }
}

impl Drop for BuyReservation {
    fn drop(&mut self) {
        if !self.committed {
            self.state.release_buy(&self.token);
        }
    }
}
