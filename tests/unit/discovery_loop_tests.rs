//! Discovery loop tests
//!
//! Scripted candidate scans feed the loop; timing runs on paused tokio time.

use crate::support::*;
use parking_lot::Mutex;
use raydium_scalper::config::DiscoveryConfig;
use raydium_scalper::discovery::{run_discovery_loop, CandidateSource, DiscoveryError};
use raydium_scalper::models::{Candidate, PositionPhase};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FakeSource {
    scans: Mutex<VecDeque<Result<Vec<Candidate>, DiscoveryError>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn new(scans: Vec<Result<Vec<Candidate>, DiscoveryError>>) -> Arc<Self> {
        Arc::new(Self {
            scans: Mutex::new(scans.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CandidateSource for FakeSource {
    async fn candidates(&self) -> Result<Vec<Candidate>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scans.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn loop_config() -> DiscoveryConfig {
    DiscoveryConfig {
        candidates_per_cycle: 2,
        cycle_interval_secs: 10,
        in_position_interval_secs: 3,
        empty_backoff_secs: 10,
        error_backoff_secs: 5,
        ..DiscoveryConfig::default()
    }
}

fn spawn_loop(h: &Harness, source: Arc<FakeSource>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_discovery_loop(
        h.bot.clone(),
        source,
        loop_config(),
        h.bot.cancellation_token(),
    ))
}

// =============================================================================
// CYCLES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_loop_buys_first_passing_candidate_then_waits() {
    let h = Harness::new();
    let traded = new_token();
    let fresh = new_token();
    let ignored = new_token();
    h.bot.state().blacklist(&traded);

    let source = FakeSource::new(vec![Ok(vec![
        candidate(&traded),
        candidate(&fresh),
        candidate(&ignored),
    ])]);
    let handle = spawn_loop(&h, source.clone());

    tokio::time::sleep(Duration::from_secs(60)).await;

    // Only one scan: the loop idles while the position is held
    assert_eq!(source.calls(), 1);
    assert_eq!(h.bot.state().phase(), PositionPhase::Open);

    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].to_mint, fresh);

    h.bot.close().await;
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_empty_scan_backs_off() {
    let h = Harness::new();
    let source = FakeSource::new(vec![]);
    let handle = spawn_loop(&h, source.clone());

    // Scans at t=0, 10, 20
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(source.calls(), 3);
    assert!(h.gateway.requests().is_empty());

    h.bot.cancellation_token().cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_scan_error_uses_error_backoff() {
    let h = Harness::new();
    let source = FakeSource::new(vec![
        Err(DiscoveryError::Status(500)),
        Err(DiscoveryError::Status(502)),
    ]);
    let handle = spawn_loop(&h, source.clone());

    // Errors at t=0 and t=5, then an empty scan at t=10
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(source.calls(), 3);

    h.bot.cancellation_token().cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unfavorable_candidates_do_not_trade() {
    let h = Harness::new();
    *h.market.pair.lock() = None;

    let source = FakeSource::new(vec![Ok(vec![candidate(&new_token()), candidate(&new_token())])]);
    let handle = spawn_loop(&h, source.clone());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.market.calls.load(Ordering::SeqCst), 2);
    assert!(h.gateway.requests().is_empty());
    assert!(!h.bot.currently_in_position());

    h.bot.cancellation_token().cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_loop_stops_when_bot_closes() {
    let h = Harness::new();
    let source = FakeSource::new(vec![]);
    let handle = spawn_loop(&h, source);

    assert!(h.bot.close().await);
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop stopped")
        .unwrap();
}
