//! Trading engine for Raydium Scalper
//!
//! The [`Bot`] owns the process-wide trading state and wires the trade
//! executor, balance verifier and position monitor together.

pub mod balance;
pub mod executor;
pub mod monitor;
pub mod state;

pub use balance::{BalanceVerifier, Verification};
pub use executor::{SellReceipt, TradeError, TradeExecutor};
pub use monitor::{evaluate_exit, ExitCheck, MonitorOutcome, PositionMonitor};
pub use state::{BuyReservation, StateError, TradingState};

use crate::config::{AppConfig, DiscoveryConfig};
use crate::discovery::{predict_upward_movement, DexScreenerClient, MarketDataSource, PairFilter};
use crate::error::AppResult;
use crate::metrics::MetricsState;
use crate::models::{Candidate, PositionPhase, Statistics, TradeParams};
use crate::notifications::{CompositeNotifier, TelegramNotifier};
use crate::price_oracle::{HttpPriceOracle, PriceOracle};
use crate::rpc::{ChainClient, HttpChainClient};
use crate::session::Session;
use crate::swap::{HttpSwapGateway, SwapGateway};
use crate::token::parse_keypair;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Serialize;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// External collaborators used by the engine
#[derive(Clone)]
pub struct Clients {
    pub chain: Arc<dyn ChainClient>,
    pub gateway: Arc<dyn SwapGateway>,
    pub oracle: Arc<dyn PriceOracle>,
    pub market: Arc<dyn MarketDataSource>,
}

impl Clients {
    /// HTTP clients sharing one session
    pub fn http(session: Arc<Session>, config: &AppConfig) -> Self {
        Self {
            chain: Arc::new(HttpChainClient::new(
                session.clone(),
                config.rpc.url.clone(),
                config.executor.node_max_retries,
            )),
            gateway: Arc::new(HttpSwapGateway::new(
                session.clone(),
                config.swap.url.clone(),
                config.swap.api_key.clone(),
            )),
            oracle: Arc::new(HttpPriceOracle::new(
                session.clone(),
                config.oracle.price_url.clone(),
            )),
            market: Arc::new(DexScreenerClient::new(
                session,
                config.discovery.pair_data_url.clone(),
            )),
        }
    }
}

/// Why a candidate was or was not bought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    Closed,
    InPosition,
    Blacklisted,
    PairDataUnavailable,
    MarketCapUnavailable,
    MarketCapOutOfRange,
    Unfavorable,
    BuyFailed,
    Bought,
}

/// Held or abandoned position, for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct PositionSummary {
    pub id: u64,
    pub token: String,
    pub buy_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub held_secs: u64,
    pub quantity: Option<Decimal>,
    pub buy_signature: String,
}

/// Snapshot of the bot for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub wallet: String,
    pub phase: PositionPhase,
    pub position: Option<PositionSummary>,
    pub stats: Statistics,
    pub cooldown_remaining_secs: Option<f64>,
    pub blacklist_size: usize,
    pub available_permits: usize,
    pub closed: bool,
}

/// Bot controller
///
/// Owns the wallet, the shared session and the trading state. The monitor
/// task for the open position is retained so shutdown can await it.
pub struct Bot {
    wallet: Arc<Keypair>,
    session: Arc<Session>,
    state: Arc<TradingState>,
    executor: Arc<TradeExecutor>,
    monitor: Arc<PositionMonitor>,
    market: Arc<dyn MarketDataSource>,
    metrics: Option<Arc<MetricsState>>,
    discovery: DiscoveryConfig,
    buy_params: TradeParams,
    cancel: CancellationToken,
    monitor_handle: Mutex<Option<JoinHandle<MonitorOutcome>>>,
    closed: AtomicBool,
}

impl Bot {
    /// Build the bot with HTTP clients from validated configuration
    pub fn new(config: &AppConfig, metrics: Option<Arc<MetricsState>>) -> AppResult<Self> {
        let wallet = parse_keypair(config.wallet.private_key.expose_secret())?;
        let session = Arc::new(Session::new(&config.http)?);
        let clients = Clients::http(session.clone(), config);

        let mut notifier = CompositeNotifier::with_logging();
        if config.notifications.telegram.enabled {
            notifier.add_service(Arc::new(TelegramNotifier::new(
                &config.notifications.telegram,
                session.clone(),
            )));
            tracing::info!("Telegram notifications enabled");
        }

        Ok(Self::with_clients(
            config,
            wallet,
            session,
            clients,
            Arc::new(notifier),
            metrics,
        ))
    }

    /// Build the bot around existing clients
    pub fn with_clients(
        config: &AppConfig,
        wallet: Keypair,
        session: Arc<Session>,
        clients: Clients,
        notifier: Arc<CompositeNotifier>,
        metrics: Option<Arc<MetricsState>>,
    ) -> Self {
        let wallet = Arc::new(wallet);
        let state = Arc::new(TradingState::new());
        let cancel = CancellationToken::new();

        let verifier = Arc::new(BalanceVerifier::new(
            clients.chain.clone(),
            wallet.pubkey(),
            &config.verifier,
        ));

        let executor = Arc::new(TradeExecutor::new(
            clients.clone(),
            verifier.clone(),
            state.clone(),
            notifier.clone(),
            metrics.clone(),
            wallet.clone(),
            config.swap.provider.clone(),
            config.trading.clone(),
            config.executor.clone(),
        ));

        let monitor = Arc::new(PositionMonitor::new(
            executor.clone(),
            verifier,
            clients.oracle.clone(),
            state.clone(),
            notifier,
            metrics.clone(),
            config.monitor.clone(),
            cancel.child_token(),
        ));

        tracing::info!(wallet = %wallet.pubkey(), "Bot initialized");

        Self {
            wallet,
            session,
            state,
            executor,
            monitor,
            market: clients.market,
            metrics,
            discovery: config.discovery.clone(),
            buy_params: TradeParams::new(Decimal::ONE, config.trading.buy_slippage_bps),
            cancel,
            monitor_handle: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Run the pre-trade filters on `candidate` and buy it if they pass
    pub async fn evaluate_candidate(&self, candidate: &Candidate) -> Evaluation {
        let token = candidate.address.as_str();

        if self.is_closed() {
            return Evaluation::Closed;
        }
        if self.currently_in_position() {
            return Evaluation::InPosition;
        }
        if self.state.is_blacklisted(token) {
            tracing::info!(token = %token, "Already traded, skipping");
            return Evaluation::Blacklisted;
        }

        let pair = match self.market.pair_data(token).await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                tracing::info!(token = %token, "No pair data found");
                return Evaluation::PairDataUnavailable;
            }
            Err(e) => {
                tracing::warn!(token = %token, error = %e, "Pair data fetch failed");
                return Evaluation::PairDataUnavailable;
            }
        };

        let Some(market_cap) = pair.market_cap else {
            tracing::info!(token = %token, "Market cap unavailable");
            return Evaluation::MarketCapUnavailable;
        };
        if market_cap < self.discovery.min_market_cap_usd
            || market_cap > self.discovery.max_market_cap_usd
        {
            tracing::info!(token = %token, market_cap = %market_cap, "Market cap out of range");
            return Evaluation::MarketCapOutOfRange;
        }

        let prediction = predict_upward_movement(&pair, PairFilter::from(&self.discovery));
        if !prediction.upward {
            tracing::info!(
                token = %token,
                score = prediction.score,
                m5_ratio = ?prediction.m5_ratio,
                "Unfavorable pair data prediction"
            );
            return Evaluation::Unfavorable;
        }

        if self.attempt_buy(token).await {
            Evaluation::Bought
        } else {
            Evaluation::BuyFailed
        }
    }

    /// Buy `token` and start monitoring the position. Returns true on success.
    pub async fn attempt_buy(&self, token: &str) -> bool {
        if self.is_closed() {
            return false;
        }

        match self.executor.buy(token, self.buy_params).await {
            Ok(position) => {
                self.state.blacklist(token);
                let handle = tokio::spawn(Arc::clone(&self.monitor).watch(position));
                // A previous monitor has already ended or will stop on its own
                drop(self.monitor_handle.lock().replace(handle));
                true
            }
            // Skipped before any trade was attempted
            Err(TradeError::Cooldown(_)) | Err(TradeError::State(_)) | Err(TradeError::Closed) => {
                false
            }
            Err(_) => {
                self.state.blacklist(token);
                false
            }
        }
    }

    /// Whether a buy, open position or exit occupies the slot
    pub fn currently_in_position(&self) -> bool {
        self.state.is_in_position()
    }

    /// Shut down: stop the monitor, wait for it, then release the session
    ///
    /// Returns false when the bot was already closed.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Bot already closed");
            return false;
        }

        tracing::info!("Closing bot");
        self.cancel.cancel();
        self.executor.shutdown();

        if let Some(outcome) = self.wait_for_monitor().await {
            tracing::info!(outcome = ?outcome, "Position monitor stopped");
        }

        if self.session.release() {
            tracing::info!("HTTP session released");
        }
        true
    }

    /// Await the running monitor task, if any
    pub async fn wait_for_monitor(&self) -> Option<MonitorOutcome> {
        let handle = self.monitor_handle.lock().take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(error = %e, "Position monitor task failed");
                None
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Token that stops the monitor and the discovery loop
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn wallet_address(&self) -> String {
        self.wallet.pubkey().to_string()
    }

    pub fn state(&self) -> &Arc<TradingState> {
        &self.state
    }

    pub fn executor(&self) -> &Arc<TradeExecutor> {
        &self.executor
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsState>> {
        self.metrics.as_ref()
    }

    pub fn stats(&self) -> Statistics {
        self.state.stats()
    }

    /// Snapshot for the status surface
    pub fn status(&self) -> BotStatus {
        let now = Instant::now();
        let slot = self.state.position_state();

        BotStatus {
            wallet: self.wallet_address(),
            phase: slot.phase(),
            position: slot.position().map(|p| PositionSummary {
                id: p.id,
                token: p.token.clone(),
                buy_price: p.buy_price,
                opened_at: p.opened_at,
                held_secs: p.held_for(now).as_secs(),
                quantity: p.quantity.map(|q| q.ui_amount),
                buy_signature: p.buy_signature.clone(),
            }),
            stats: self.state.stats(),
            cooldown_remaining_secs: self
                .state
                .cooldown_remaining(now)
                .map(|remaining| remaining.as_secs_f64()),
            blacklist_size: self.state.blacklist_len(),
            available_permits: self.executor.available_permits(),
            closed: self.is_closed(),
        }
    }
}
