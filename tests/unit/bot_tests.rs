//! Bot controller and trade executor tests
//!
//! Tests the buy path end to end against in-memory collaborators:
//! - Cooldown gating without network access
//! - Single position under concurrent evaluation
//! - Transient vs terminal retry classification, linear backoff
//! - Permit pool bounding concurrent network work
//! - Entry price failure after a landed swap
//! - Idempotent shutdown

use crate::support::*;
use raydium_scalper::engine::Evaluation;
use raydium_scalper::models::{PositionPhase, TradeAction, TradeParams, SELL_SCHEDULE};
use raydium_scalper::notifications::TradeEvent;
use raydium_scalper::rpc::RpcError;
use raydium_scalper::swap::SwapError;
use rust_decimal::Decimal;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Run a position through a completed sell so the cooldown starts
fn start_cooldown(h: &Harness) {
    let state = h.bot.state();
    let reservation = state.reserve_buy(&new_token()).unwrap();
    let position = reservation.open(Decimal::ONE, "prior-sig".to_string()).unwrap();
    state.begin_exit(position.id).unwrap();
    state
        .complete_sell(position.id, None, Duration::from_secs(15))
        .unwrap();
}

// =============================================================================
// COOLDOWN
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cooldown_blocks_buy_without_network_calls() {
    let h = Harness::new();
    start_cooldown(&h);
    let token = new_token();

    assert!(!h.bot.attempt_buy(&token).await);

    assert_eq!(h.chain.network_calls(), 0);
    assert!(h.gateway.requests().is_empty());
    assert_eq!(h.oracle.calls.load(Ordering::SeqCst), 0);
    assert!(!h.bot.state().is_blacklisted(&token), "cooldown skip must not burn the token");
    assert_eq!(h.bot.state().phase(), PositionPhase::None);

    h.bot.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_buy_allowed_after_cooldown_elapses() {
    let h = Harness::new();
    start_cooldown(&h);

    tokio::time::advance(Duration::from_secs(16)).await;

    assert!(h.bot.attempt_buy(&new_token()).await);
    assert_eq!(h.bot.state().phase(), PositionPhase::Open);

    h.bot.close().await;
}

// =============================================================================
// BUY PATH
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_buy_sizes_trade_from_base_balance() {
    let h = Harness::new();
    let token = new_token();

    assert!(h.bot.attempt_buy(&token).await);

    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    let buy = &requests[0];
    assert_eq!(buy.from_mint, raydium_scalper::constants::mints::SOL);
    assert_eq!(buy.to_mint, token);
    // 10% of 10 SOL
    assert_eq!(buy.amount, "1000000000");
    assert_eq!(buy.slippage, 3000);
    assert_eq!(buy.priority_micro_lamports, "100000");
    assert_eq!(buy.owner, h.bot.wallet_address());
    assert_eq!(buy.provider, "raydium");

    let stats = h.bot.stats();
    assert_eq!(stats.trades_executed, 1);
    assert!(h.bot.state().is_blacklisted(&token));

    let status = h.bot.status();
    let position = status.position.expect("position should be open");
    assert_eq!(position.token, token);
    assert_eq!(position.buy_price, Decimal::ONE);
    assert_eq!(position.quantity, Some(Decimal::ONE));
    assert_eq!(position.buy_signature, "sig-1");

    assert!(matches!(
        h.events.events().first(),
        Some(TradeEvent::BuyExecuted { amount_lamports: 1_000_000_000, .. })
    ));

    h.bot.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_dust_balance_fails_without_swap() {
    let h = Harness::new();
    *h.chain.base_lamports.lock() = 50_000;
    let token = new_token();

    assert!(!h.bot.attempt_buy(&token).await);

    assert!(h.gateway.requests().is_empty());
    assert_eq!(h.bot.state().phase(), PositionPhase::None);
    assert!(h.bot.state().is_blacklisted(&token));
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_retry_whole_attempt() {
    let h = Harness::new();
    h.chain.script_sends([
        Err(node_error("Transaction simulation failed: Blockhash not found")),
        Err(node_error("Transaction was not confirmed in 30.00 seconds")),
    ]);

    assert!(h.bot.attempt_buy(&new_token()).await);

    assert_eq!(h.chain.send_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.chain.balance_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.gateway.requests().len(), 3);
    assert_eq!(h.bot.state().phase(), PositionPhase::Open);

    h.bot.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_backoff_grows_linearly() {
    let h = Harness::new();
    h.chain
        .script_sends((0..3).map(|_| Err(RpcError::Transport("connection reset".to_string()))));

    assert!(h.bot.attempt_buy(&new_token()).await);

    // base_delay x attempt: 500ms, 1000ms, 1500ms
    let times = h.chain.send_times.lock().clone();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_millis(500),
            Duration::from_millis(1000),
            Duration::from_millis(1500),
        ]
    );

    h.bot.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_permit_pool_bounds_concurrent_network_work() {
    let h = Harness::new();
    let token = new_token();
    let executor = h.bot.executor().clone();
    // Straight through the executor so no monitor competes for the exit
    assert!(
        executor
            .execute(&token, TradeAction::Buy, TradeParams::new(Decimal::ONE, 500))
            .await
    );
    assert_eq!(executor.available_permits(), 5);

    let gate = h.chain.gate_token_reads();
    let sells: Vec<_> = (0..6)
        .map(|_| {
            let executor = executor.clone();
            let token = token.clone();
            tokio::spawn(async move {
                executor
                    .execute(&token, TradeAction::Sell, SELL_SCHEDULE[0])
                    .await
            })
        })
        .collect();

    // Five attempts hold a permit inside the chain; the sixth waits for one
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.chain.token_in_flight.load(Ordering::SeqCst), 5);
    assert_eq!(executor.available_permits(), 0);

    gate.add_permits(1_000);
    let mut sold = 0;
    for sell in sells {
        if sell.await.unwrap() {
            sold += 1;
        }
    }

    assert_eq!(h.chain.max_token_in_flight.load(Ordering::SeqCst), 5);
    assert_eq!(executor.available_permits(), 5);
    // Only one sell can close the position
    assert_eq!(sold, 1);
    assert_eq!(h.bot.state().phase(), PositionPhase::None);

    h.bot.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_retries_are_bounded() {
    let h = Harness::new();
    h.chain
        .script_sends((0..10).map(|_| Err(RpcError::Transport("connection reset".to_string()))));

    assert!(!h.bot.attempt_buy(&new_token()).await);

    // One attempt plus three retries
    assert_eq!(h.chain.send_calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.bot.state().phase(), PositionPhase::None);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_gateway_error_is_not_retried() {
    let h = Harness::new();
    h.gateway
        .script([Err(SwapError::Rejected("No route found".to_string()))]);
    let token = new_token();

    assert!(!h.bot.attempt_buy(&token).await);

    assert_eq!(h.gateway.requests().len(), 1);
    assert_eq!(h.chain.send_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.bot.state().phase(), PositionPhase::None);
    assert!(h.bot.state().is_blacklisted(&token));
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_node_error_is_not_retried() {
    let h = Harness::new();
    h.chain
        .script_sends([Err(node_error("Attempt to debit an account but found no record of a prior credit"))]);

    assert!(!h.bot.attempt_buy(&new_token()).await);
    assert_eq!(h.chain.send_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_entry_price_failure_fails_buy_and_alerts() {
    let h = Harness::new();
    *h.oracle.default_price.lock() = None;
    let token = new_token();

    assert!(!h.bot.attempt_buy(&token).await);

    // The swap landed, only the price fetch was retried
    assert_eq!(h.chain.send_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.oracle.calls.load(Ordering::SeqCst), 3);

    assert_eq!(h.bot.state().phase(), PositionPhase::None);
    assert!(h.bot.state().is_blacklisted(&token));

    let stats = h.bot.stats();
    assert_eq!(stats.trades_executed, 0);
    assert_eq!(stats.unpriced_buys, 1);

    assert_eq!(
        h.events.events(),
        vec![TradeEvent::UnpricedBuy {
            token: token.clone(),
            signature: "sig-1".to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_entry_price_recovers_on_retry() {
    let h = Harness::new();
    h.oracle.script([None, Some(Decimal::new(5, 1))]);

    assert!(h.bot.attempt_buy(&new_token()).await);

    let position = h.bot.status().position.unwrap();
    assert_eq!(position.buy_price, Decimal::new(5, 1));
    assert_eq!(h.bot.stats().unpriced_buys, 0);

    h.bot.close().await;
}

// =============================================================================
// CANDIDATE EVALUATION
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_position_under_concurrent_evaluation() {
    let h = Harness::new();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let bot = h.bot.clone();
            let candidate = candidate(&new_token());
            tokio::spawn(async move { bot.evaluate_candidate(&candidate).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let bought = outcomes.iter().filter(|o| **o == Evaluation::Bought).count();
    assert_eq!(bought, 1, "outcomes: {outcomes:?}");
    assert_eq!(h.bot.stats().trades_executed, 1);
    assert_eq!(h.gateway.requests().len(), 1);
    assert!(h.bot.currently_in_position());

    h.bot.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_blacklisted_candidate_skipped_before_market_data() {
    let h = Harness::new();
    let token = new_token();
    h.bot.state().blacklist(&token);

    assert_eq!(
        h.bot.evaluate_candidate(&candidate(&token)).await,
        Evaluation::Blacklisted
    );
    assert_eq!(h.market.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_market_cap_out_of_range_skipped() {
    let h = Harness::new();
    let mut pair = favorable_pair();
    pair.market_cap = Some(Decimal::from(90_000_000));
    *h.market.pair.lock() = Some(pair);

    assert_eq!(
        h.bot.evaluate_candidate(&candidate(&new_token())).await,
        Evaluation::MarketCapOutOfRange
    );
    assert_eq!(h.chain.network_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_market_data_skipped() {
    let h = Harness::new();
    *h.market.pair.lock() = None;
    assert_eq!(
        h.bot.evaluate_candidate(&candidate(&new_token())).await,
        Evaluation::PairDataUnavailable
    );

    let mut pair = favorable_pair();
    pair.market_cap = None;
    *h.market.pair.lock() = Some(pair);
    assert_eq!(
        h.bot.evaluate_candidate(&candidate(&new_token())).await,
        Evaluation::MarketCapUnavailable
    );
}

#[tokio::test(start_paused = true)]
async fn test_unfavorable_pair_skipped() {
    let h = Harness::new();
    let pair = serde_json::from_value(serde_json::json!({
        "marketCap": 2_000_000,
        "txns": {"m5": {"buys": 10, "sells": 100}},
        "volume": {"m5": 250_000.0}
    }))
    .unwrap();
    *h.market.pair.lock() = Some(pair);
    let token = new_token();

    assert_eq!(
        h.bot.evaluate_candidate(&candidate(&token)).await,
        Evaluation::Unfavorable
    );
    assert!(h.gateway.requests().is_empty());
    assert!(!h.bot.state().is_blacklisted(&token));
}

// =============================================================================
// SHUTDOWN
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent() {
    let h = Harness::new();

    assert!(h.bot.close().await);
    assert!(h.session.is_closed());
    assert!(!h.bot.close().await);
    assert!(h.bot.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_closed_bot_rejects_candidates() {
    let h = Harness::new();
    h.bot.close().await;
    let token = new_token();

    assert!(!h.bot.attempt_buy(&token).await);
    assert_eq!(
        h.bot.evaluate_candidate(&candidate(&token)).await,
        Evaluation::Closed
    );
    assert_eq!(h.chain.network_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_running_monitor() {
    let h = Harness::new();
    assert!(h.bot.attempt_buy(&new_token()).await);

    assert!(h.bot.close().await);

    // Handle was awaited and taken by close
    assert!(h.bot.wait_for_monitor().await.is_none());
    // Position stays recorded, nothing was sold
    assert_eq!(h.bot.state().phase(), PositionPhase::Open);
    assert!(h.gateway.sell_requests(&h.bot.status().position.unwrap().token).is_empty());
}
