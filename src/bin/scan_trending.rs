//! Print the current ranked trending candidates
//! Usage: cargo run --bin scan_trending

use raydium_scalper::config::AppConfig;
use raydium_scalper::discovery::{CandidateSource, GeckoTerminalScanner};
use raydium_scalper::session::Session;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let session = Arc::new(Session::new(&config.http)?);
    let scanner = GeckoTerminalScanner::new(session.clone(), config.discovery.clone());

    let candidates = scanner.candidates().await?;
    session.release();

    println!("=== TOP TRENDING TOKENS ===");
    if candidates.is_empty() {
        println!("No tokens passed the volume and liquidity filters");
    }

    for (rank, candidate) in candidates.iter().enumerate() {
        println!();
        println!("#{} {}", rank + 1, candidate.name);
        println!("Address:           {}", candidate.address);
        println!("Volume (1h):       ${}", candidate.volume_h1_usd.round_dp(2));
        println!("Price Change (1h): {}%", candidate.price_change_h1.round_dp(2));
        println!("Liquidity:         ${}", candidate.liquidity_usd.round_dp(2));
        println!("Transactions (1h): {}", candidate.txns_h1);
        println!("Buy/Sell Ratio:    {}", candidate.buy_sell_ratio.round_dp(2));
        println!("Score:             {}", candidate.score.round_dp(2));
        println!("{}", "-".repeat(50));
    }

    Ok(())
}
