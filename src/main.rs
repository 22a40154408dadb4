//! Raydium Scalper - trending-token scalper for Solana
//!
//! Loads configuration and secrets, starts the bot, the discovery loop and
//! the optional status server, and shuts everything down on Ctrl-C.

use raydium_scalper::config::AppConfig;
use raydium_scalper::discovery::{run_discovery_loop, CandidateSource, GeckoTerminalScanner};
use raydium_scalper::engine::Bot;
use raydium_scalper::handlers::{self, AppState};
use raydium_scalper::metrics::MetricsState;
use raydium_scalper::session::Session;
use raydium_scalper::vault;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    tracing::info!("Starting Raydium Scalper v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    tracing::info!(
        rpc = %config.rpc.url,
        provider = %config.swap.provider,
        base_mint = %config.trading.base_mint,
        "Configuration loaded"
    );

    let metrics = Arc::new(MetricsState::new()?);
    let bot = Arc::new(Bot::new(&config, Some(metrics.clone()))?);
    let cancel = bot.cancellation_token();

    // Discovery has its own session so scans never compete with trades for the pool
    let scan_session = Arc::new(Session::new(&config.http)?);
    let scanner: Arc<dyn CandidateSource> = Arc::new(GeckoTerminalScanner::new(
        scan_session.clone(),
        config.discovery.clone(),
    ));
    let discovery = tokio::spawn(run_discovery_loop(
        bot.clone(),
        scanner,
        config.discovery.clone(),
        cancel.clone(),
    ));

    if config.server.enabled {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let app = handlers::router(Arc::new(AppState::new(bot.clone())), Some(metrics));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Status server listening");

        let server_cancel = cancel.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_cancel.cancelled().await })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Status server failed");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    bot.close().await;
    if let Err(e) = discovery.await {
        tracing::error!(error = %e, "Discovery task failed");
    }
    scan_session.release();

    let stats = bot.stats();
    tracing::info!(
        trades_executed = stats.trades_executed,
        sells_completed = stats.sells_completed,
        realized_profit_usd = %stats.realized_profit_usd,
        abandoned_positions = stats.abandoned_positions,
        "Raydium Scalper stopped"
    );

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "raydium_scalper=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load configuration, apply secrets and validate
fn load_config() -> anyhow::Result<AppConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    match vault::load_secrets_with_fallback() {
        Ok(secrets) => secrets.apply_to(&mut config),
        Err(e) => tracing::warn!(error = %e, "Failed to load secrets, using configuration only"),
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    Ok(config)
}
