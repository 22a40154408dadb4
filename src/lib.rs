//! Raydium Scalper Library
//!
//! Trending-token scalper for Solana: discovery, a single-position trade
//! executor, balance verification and an exit monitor.
//! This library exposes core modules for the binaries and tests.

pub mod config;
pub mod constants;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod price_oracle;
pub mod rpc;
pub mod session;
pub mod swap;
pub mod token;
pub mod utils;
pub mod vault;

// Re-export commonly used types
pub use config::AppConfig;
pub use discovery::{run_discovery_loop, CandidateSource, GeckoTerminalScanner, MarketDataSource};
pub use engine::{Bot, BotStatus, Clients, Evaluation, MonitorOutcome, TradeExecutor, TradingState};
pub use error::{AppError, AppResult};
pub use models::{Candidate, Position, PositionPhase, TokenBalance, TradeAction, TradeParams};
pub use notifications::{CompositeNotifier, TradeEvent};
pub use session::Session;
