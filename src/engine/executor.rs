//! Trade executor
//!
//! Runs one buy or sell: preconditions, swap transaction from the gateway,
//! local signing, broadcast. Whole attempts are retried with linear backoff,
//! but only after transient transport or node errors.

use super::balance::{BalanceVerifier, Verification};
use super::state::{StateError, TradingState};
use super::Clients;
use crate::config::{ExecutorConfig, TradingConfig};
use crate::metrics::MetricsState;
use crate::models::{Position, TokenBalance, TradeAction, TradeParams};
use crate::notifications::{CompositeNotifier, TradeEvent};
use crate::price_oracle::OracleError;
use crate::rpc::RpcError;
use crate::swap::{sign_transaction, SwapError, SwapRequest};
use crate::token::parse_pubkey;
use crate::utils::{lamports_to_sol, scale_amount, sol_to_lamports};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;

/// Pause between entry price fetches after a landed buy
const BUY_PRICE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Trade executor errors
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    /// Token address is not a valid mint
    #[error("Invalid mint address: {0}")]
    InvalidMint(String),

    /// Buy blocked by the cooldown window
    #[error("Cooldown active, next buy allowed in {0:?}")]
    Cooldown(Duration),

    /// Position state forbids the trade
    #[error(transparent)]
    State(#[from] StateError),

    /// Chain client failure
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Swap gateway failure
    #[error(transparent)]
    Swap(#[from] SwapError),

    /// Base balance below the dust threshold
    #[error("Insufficient base balance: {available} lamports, minimum {minimum}")]
    InsufficientBalance { available: u64, minimum: u64 },

    /// Trade size rounds to zero
    #[error("Trade amount rounds to zero")]
    ZeroAmount,

    /// Token balance could not be confirmed before selling
    #[error("Token balance not confirmed: {0:?}")]
    BalanceUnverified(Verification),

    /// Price oracle failure
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Buy landed but no entry price could be fetched
    #[error("Buy {signature} landed without an entry price: {reason}")]
    Unpriced { signature: String, reason: String },

    /// Concurrency limiter shut down
    #[error("Executor is shut down")]
    Closed,
}

impl TradeError {
    /// Whether retrying the whole attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TradeError::Rpc(e) => e.is_transient(),
            TradeError::Swap(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result of a confirmed sell
#[derive(Debug, Clone)]
pub struct SellReceipt {
    pub position: Position,
    pub signature: String,
    /// Balance that was sold
    pub sold: TokenBalance,
    /// Exit price, if the oracle answered
    pub sell_price: Option<Decimal>,
    /// Realized profit in USD, if the exit price is known
    pub profit_usd: Option<Decimal>,
}

/// Orchestrates buy and sell attempts
pub struct TradeExecutor {
    clients: Clients,
    verifier: Arc<BalanceVerifier>,
    state: Arc<TradingState>,
    notifier: Arc<CompositeNotifier>,
    metrics: Option<Arc<MetricsState>>,
    wallet: Arc<Keypair>,
    base_mint: String,
    provider: String,
    trading: TradingConfig,
    retry: ExecutorConfig,
    permits: Semaphore,
}

impl TradeExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clients: Clients,
        verifier: Arc<BalanceVerifier>,
        state: Arc<TradingState>,
        notifier: Arc<CompositeNotifier>,
        metrics: Option<Arc<MetricsState>>,
        wallet: Arc<Keypair>,
        provider: String,
        trading: TradingConfig,
        retry: ExecutorConfig,
    ) -> Self {
        Self {
            clients,
            verifier,
            state,
            notifier,
            metrics,
            wallet,
            base_mint: trading.base_mint.clone(),
            provider,
            permits: Semaphore::new(retry.max_concurrent_requests.max(1)),
            trading,
            retry,
        }
    }

    /// Run one logical trade. Returns true only when it fully succeeded.
    pub async fn execute(&self, token: &str, action: TradeAction, params: TradeParams) -> bool {
        match action {
            TradeAction::Buy => self.buy(token, params).await.is_ok(),
            TradeAction::Sell => self.sell(token, params).await.is_ok(),
        }
    }

    /// Buy `token` with a fraction of the base balance and open the position
    pub async fn buy(&self, token: &str, params: TradeParams) -> Result<Position, TradeError> {
        let started = Instant::now();
        let result = self.run_buy(token, params).await;
        self.record(TradeAction::Buy, started, &result);

        match &result {
            Ok(position) => tracing::info!(
                token = %token,
                position_id = position.id,
                buy_price = %position.buy_price,
                "Buy executed"
            ),
            Err(TradeError::Cooldown(remaining)) => tracing::info!(
                token = %token,
                remaining_secs = remaining.as_secs_f64(),
                "Cooldown active, buy skipped"
            ),
            Err(e) => tracing::error!(token = %token, error = %e, "Buy failed"),
        }
        result
    }

    /// Sell the whole verified balance of the held position in `token`
    pub async fn sell(&self, token: &str, params: TradeParams) -> Result<SellReceipt, TradeError> {
        let started = Instant::now();
        let result = self.run_sell(token, params).await;
        self.record(TradeAction::Sell, started, &result);

        match &result {
            Ok(receipt) => match receipt.profit_usd {
                Some(profit) => tracing::info!(
                    token = %token,
                    signature = %receipt.signature,
                    profit_usd = %profit,
                    "Sell executed"
                ),
                None => tracing::warn!(
                    token = %token,
                    signature = %receipt.signature,
                    "Sell executed, exit price unavailable so profit is not recorded"
                ),
            },
            Err(e) => tracing::error!(
                token = %token,
                slippage_bps = params.slippage_bps,
                priority_multiplier = %params.priority_multiplier,
                error = %e,
                "Sell failed"
            ),
        }
        result
    }

    async fn run_buy(&self, token: &str, params: TradeParams) -> Result<Position, TradeError> {
        let mint = parse_pubkey(token).ok_or_else(|| TradeError::InvalidMint(token.to_string()))?;

        // Checked before any permit or network call
        if let Some(remaining) = self.state.cooldown_remaining(Instant::now()) {
            return Err(TradeError::Cooldown(remaining));
        }

        let reservation = self.state.reserve_buy(token)?;

        let (signature, amount_lamports) = self
            .with_retries(TradeAction::Buy, token, || self.buy_attempt(&mint, params))
            .await?;

        let buy_price = match self.fetch_buy_price(token).await {
            Ok(price) => price,
            Err(e) => {
                self.state.record_unpriced_buy();
                self.state.blacklist(token);
                if let Some(metrics) = &self.metrics {
                    metrics.unpriced_buys.inc();
                }
                self.notifier
                    .notify(TradeEvent::UnpricedBuy {
                        token: token.to_string(),
                        signature: signature.clone(),
                    })
                    .await;
                return Err(TradeError::Unpriced {
                    signature,
                    reason: e.to_string(),
                });
            }
        };

        let position = reservation.open(buy_price, signature.clone())?;
        if let Some(metrics) = &self.metrics {
            metrics.in_position.set(1);
        }

        match self.verifier.verify(&mint).await {
            Verification::Confirmed(balance) => {
                self.state.set_quantity(position.id, balance);
            }
            other => tracing::warn!(
                token = %token,
                verification = ?other,
                "Bought quantity not settled yet, sell path will verify"
            ),
        }

        self.notifier
            .notify(TradeEvent::BuyExecuted {
                token: token.to_string(),
                price_usd: buy_price,
                amount_lamports,
                signature,
            })
            .await;

        Ok(self
            .state
            .current_position(position.id)
            .unwrap_or(position))
    }

    /// One buy attempt: balance check, swap request, sign, broadcast
    async fn buy_attempt(
        &self,
        mint: &Pubkey,
        params: TradeParams,
    ) -> Result<(String, u64), TradeError> {
        let _permit = self.permit().await?;

        let available = self.clients.chain.get_balance(&self.wallet.pubkey()).await?;
        let minimum = sol_to_lamports(self.trading.min_base_balance_sol);
        if available < minimum {
            return Err(TradeError::InsufficientBalance { available, minimum });
        }

        let amount = scale_amount(available, self.trading.trade_fraction);
        if amount == 0 {
            return Err(TradeError::ZeroAmount);
        }

        tracing::debug!(
            token = %mint,
            balance_sol = %lamports_to_sol(available),
            amount_sol = %lamports_to_sol(amount),
            "Sizing buy"
        );

        let signature = self
            .submit(self.base_mint.clone(), mint.to_string(), amount, params)
            .await?;
        Ok((signature, amount))
    }

    async fn run_sell(&self, token: &str, params: TradeParams) -> Result<SellReceipt, TradeError> {
        let mint = parse_pubkey(token).ok_or_else(|| TradeError::InvalidMint(token.to_string()))?;
        let position = self.state.position_for_sell(token)?;

        let (signature, sold) = self
            .with_retries(TradeAction::Sell, token, || self.sell_attempt(&mint, params))
            .await?;

        let sell_price = {
            let _permit = self.permit().await?;
            match self.clients.oracle.price_usd(token).await {
                Ok(price) => Some(price),
                Err(e) => {
                    tracing::warn!(token = %token, error = %e, "Exit price unavailable");
                    None
                }
            }
        };

        let profit_usd = sell_price.map(|price| (price - position.buy_price) * sold.ui_amount);

        let position = self
            .state
            .complete_sell(position.id, profit_usd, self.trading.cooldown())?;

        if let Some(metrics) = &self.metrics {
            metrics.in_position.set(0);
            if let Some(profit) = profit_usd {
                metrics.realized_profit_usd.add(profit.to_f64().unwrap_or(0.0));
            }
        }

        Ok(SellReceipt {
            position,
            signature,
            sold,
            sell_price,
            profit_usd,
        })
    }

    /// One sell attempt: verify balance, swap the exact raw amount, sign, broadcast
    async fn sell_attempt(
        &self,
        mint: &Pubkey,
        params: TradeParams,
    ) -> Result<(String, TokenBalance), TradeError> {
        let _permit = self.permit().await?;

        let balance = match self.verifier.verify(mint).await {
            Verification::Confirmed(balance) => balance,
            other => return Err(TradeError::BalanceUnverified(other)),
        };

        let signature = self
            .submit(mint.to_string(), self.base_mint.clone(), balance.raw_amount, params)
            .await?;
        Ok((signature, balance))
    }

    /// Swap request -> local signature -> broadcast
    async fn submit(
        &self,
        from_mint: String,
        to_mint: String,
        amount: u64,
        params: TradeParams,
    ) -> Result<String, TradeError> {
        let priority = scale_amount(
            self.trading.base_priority_micro_lamports,
            params.priority_multiplier,
        );

        let request = SwapRequest {
            from_mint,
            to_mint,
            amount: amount.to_string(),
            slippage: params.slippage_bps,
            priority_micro_lamports: priority.to_string(),
            owner: self.wallet.pubkey().to_string(),
            provider: self.provider.clone(),
        };

        let unsigned = self.clients.gateway.unsigned_transaction(&request).await?;
        let signed = sign_transaction(unsigned, &self.wallet)?;
        let signature = self.clients.chain.send_transaction(&signed).await?;

        tracing::debug!(signature = %signature, "Transaction submitted");
        Ok(signature)
    }

    /// Retry a whole attempt after transient failures, with linear backoff
    async fn with_retries<T, F, Fut>(
        &self,
        action: TradeAction,
        token: &str,
        mut attempt_fn: F,
    ) -> Result<T, TradeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TradeError>>,
    {
        let mut attempt = 0u32;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        token = %token,
                        action = %action,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %e,
                        "Transient error, retrying"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.executor_retries.inc();
                    }
                    let delay = Duration::from_millis(self.retry.retry_base_delay_ms)
                        * attempt;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Entry price, retried on its own so the swap is never repeated
    async fn fetch_buy_price(&self, token: &str) -> Result<Decimal, TradeError> {
        let attempts = self.trading.buy_price_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = {
                let _permit = self.permit().await?;
                self.clients.oracle.price_usd(token).await
            };

            match result {
                Ok(price) => return Ok(price),
                Err(e) if attempt < attempts => {
                    tracing::warn!(token = %token, attempt, error = %e, "Entry price fetch failed");
                    attempt += 1;
                    tokio::time::sleep(BUY_PRICE_RETRY_DELAY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, TradeError> {
        self.permits.acquire().await.map_err(|_| TradeError::Closed)
    }

    /// Stop handing out permits; in-flight attempts finish, new ones fail
    pub fn shutdown(&self) {
        self.permits.close();
    }

    /// Permits currently available (for status and tests)
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    fn record<T>(&self, action: TradeAction, started: Instant, result: &Result<T, TradeError>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        // A cooldown skip is not an executed trade
        if matches!(result, Err(TradeError::Cooldown(_))) {
            return;
        }
        metrics.record_trade(action, result.is_ok());
        metrics
            .trade_latency
            .observe(started.elapsed().as_secs_f64() * 1000.0);
    }
}
