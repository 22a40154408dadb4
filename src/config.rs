//! Configuration management for Raydium Scalper
//!
//! Loads configuration from YAML files and environment variables.
//! Environment variables override YAML values.

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Wallet identity
    #[serde(default)]
    pub wallet: WalletConfig,
    /// RPC endpoint configuration
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Swap gateway configuration
    #[serde(default)]
    pub swap: SwapConfig,
    /// Price oracle configuration
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Shared HTTP session settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Trade sizing, fees and cooldown
    #[serde(default)]
    pub trading: TradingConfig,
    /// Executor retry policy
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Balance verification policy
    #[serde(default)]
    pub verifier: VerifierConfig,
    /// Position monitor exit rules
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Candidate discovery and filters
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Status server
    #[serde(default)]
    pub server: ServerConfig,
    /// Notification configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Wallet configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Base58 encoded 64-byte keypair (from environment: SCALPER_WALLET__PRIVATE_KEY)
    #[serde(default = "empty_secret")]
    pub private_key: SecretString,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key: empty_secret(),
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

/// RPC endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    #[serde(default)]
    pub url: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { url: String::new() }
    }
}

/// Swap gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    /// Swap endpoint URL
    #[serde(default)]
    pub url: String,
    /// API key sent in the X-API-KEY header
    #[serde(default = "empty_secret")]
    pub api_key: SecretString,
    /// Liquidity provider requested from the aggregator
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "raydium".to_string()
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: empty_secret(),
            provider: default_provider(),
        }
    }
}

/// Price oracle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Price API URL, queried with `?ids=<mint>`
    #[serde(default = "default_price_url")]
    pub price_url: String,
}

fn default_price_url() -> String {
    "https://api.jup.ag/price/v2".to_string()
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            price_url: default_price_url(),
        }
    }
}

/// Shared HTTP session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Maximum idle pooled connections per host
    #[serde(default = "default_pool_size")]
    pub pool_max_idle_per_host: usize,
    /// Total request timeout in milliseconds
    #[serde(default = "default_total_timeout")]
    pub total_timeout_ms: u64,
}

fn default_pool_size() -> usize {
    25
}

fn default_total_timeout() -> u64 {
    30_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: default_pool_size(),
            total_timeout_ms: default_total_timeout(),
        }
    }
}

/// Trading configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Base currency mint (wrapped SOL)
    #[serde(default = "default_base_mint")]
    pub base_mint: String,
    /// Fraction of the base balance spent per buy
    #[serde(default = "default_trade_fraction")]
    pub trade_fraction: Decimal,
    /// Minimum base balance (SOL) required to buy
    #[serde(default = "default_min_base_balance")]
    pub min_base_balance_sol: Decimal,
    /// Priority fee at multiplier 1.0
    #[serde(default = "default_priority_fee")]
    pub base_priority_micro_lamports: u64,
    /// Slippage tolerance for buys (basis points)
    #[serde(default = "default_buy_slippage")]
    pub buy_slippage_bps: u16,
    /// Idle period after a completed sell
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Attempts at fetching the entry price after a submitted buy
    #[serde(default = "default_buy_price_attempts")]
    pub buy_price_attempts: u32,
}

fn default_base_mint() -> String {
    crate::constants::mints::SOL.to_string()
}

fn default_trade_fraction() -> Decimal {
    Decimal::new(1, 1)
}

fn default_min_base_balance() -> Decimal {
    Decimal::new(1, 4)
}

fn default_priority_fee() -> u64 {
    100_000
}

fn default_buy_slippage() -> u16 {
    3000
}

fn default_cooldown_secs() -> u64 {
    15
}

fn default_buy_price_attempts() -> u32 {
    3
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            base_mint: default_base_mint(),
            trade_fraction: default_trade_fraction(),
            min_base_balance_sol: default_min_base_balance(),
            base_priority_micro_lamports: default_priority_fee(),
            buy_slippage_bps: default_buy_slippage(),
            cooldown_secs: default_cooldown_secs(),
            buy_price_attempts: default_buy_price_attempts(),
        }
    }
}

impl TradingConfig {
    /// Cooldown window as a duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Executor retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Retries of a whole attempt on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear backoff base in milliseconds
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Concurrency permits bounding in-flight network work
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Node-level resend retries passed to sendTransaction
    #[serde(default = "default_node_retries")]
    pub node_max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_max_concurrent() -> usize {
    5
}

fn default_node_retries() -> u32 {
    3
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            max_concurrent_requests: default_max_concurrent(),
            node_max_retries: default_node_retries(),
        }
    }
}

/// Balance verification policy
#[derive(Debug, Clone, Deserialize)]
pub struct VerifierConfig {
    /// Reads per verification pass
    #[serde(default = "default_min_reads")]
    pub min_reads: u32,
    /// Pause between reads in milliseconds
    #[serde(default = "default_read_interval")]
    pub read_interval_ms: u64,
    /// Consecutive identical reads (beyond the first) needed to trust a balance
    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: u32,
}

fn default_min_reads() -> u32 {
    3
}

fn default_read_interval() -> u64 {
    1500
}

fn default_required_confirmations() -> u32 {
    2
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            min_reads: default_min_reads(),
            read_interval_ms: default_read_interval(),
            required_confirmations: default_required_confirmations(),
        }
    }
}

/// Position monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Price poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Take-profit threshold (percent)
    #[serde(default = "default_profit_target")]
    pub profit_target_percent: Decimal,
    /// Maximum holding time in seconds
    #[serde(default = "default_max_hold")]
    pub max_hold_secs: u64,
    /// Pause before the second balance verification on exit
    #[serde(default = "default_reverify_delay")]
    pub reverify_delay_ms: u64,
    /// Backoff after an unexpected monitoring error
    #[serde(default = "default_error_backoff")]
    pub error_backoff_ms: u64,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_profit_target() -> Decimal {
    Decimal::from(15)
}

fn default_max_hold() -> u64 {
    20 * 60
}

fn default_reverify_delay() -> u64 {
    2000
}

fn default_error_backoff() -> u64 {
    5000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            profit_target_percent: default_profit_target(),
            max_hold_secs: default_max_hold(),
            reverify_delay_ms: default_reverify_delay(),
            error_backoff_ms: default_error_backoff(),
        }
    }
}

/// Discovery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Trending pools endpoint
    #[serde(default = "default_trending_url")]
    pub trending_url: String,
    /// Pair data endpoint prefix, the mint is appended
    #[serde(default = "default_pair_data_url")]
    pub pair_data_url: String,
    /// Minimum pool liquidity in USD
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity_usd: Decimal,
    /// Minimum 1h volume in USD
    #[serde(default = "default_min_volume")]
    pub min_volume_usd: Decimal,
    /// Ranked candidates kept per scan
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Candidates evaluated per discovery cycle
    #[serde(default = "default_candidates_per_cycle")]
    pub candidates_per_cycle: usize,
    /// Lower market cap bound in USD
    #[serde(default = "default_min_market_cap")]
    pub min_market_cap_usd: Decimal,
    /// Upper market cap bound in USD
    #[serde(default = "default_max_market_cap")]
    pub max_market_cap_usd: Decimal,
    /// 5-minute buy/sell ratio scoring threshold
    #[serde(default = "default_m5_ratio")]
    pub m5_ratio_threshold: f64,
    /// 5-minute volume scoring threshold in USD
    #[serde(default = "default_m5_volume")]
    pub m5_volume_threshold: f64,
    /// Score required to predict upward movement
    #[serde(default = "default_score_threshold")]
    pub prediction_score_threshold: u32,
    /// Delay between discovery cycles
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// Delay while a position is open
    #[serde(default = "default_in_position_interval")]
    pub in_position_interval_secs: u64,
    /// Delay when no candidates were found
    #[serde(default = "default_empty_backoff")]
    pub empty_backoff_secs: u64,
    /// Delay after a failed cycle
    #[serde(default = "default_discovery_error_backoff")]
    pub error_backoff_secs: u64,
}

fn default_trending_url() -> String {
    "https://api.geckoterminal.com/api/v2/networks/solana/trending_pools".to_string()
}

fn default_pair_data_url() -> String {
    "https://api.dexscreener.com/token-pairs/v1/solana".to_string()
}

fn default_min_liquidity() -> Decimal {
    Decimal::from(100_000)
}

fn default_min_volume() -> Decimal {
    Decimal::from(500_000)
}

fn default_max_candidates() -> usize {
    5
}

fn default_candidates_per_cycle() -> usize {
    1
}

fn default_min_market_cap() -> Decimal {
    Decimal::from(500_000)
}

fn default_max_market_cap() -> Decimal {
    Decimal::from(40_000_000)
}

fn default_m5_ratio() -> f64 {
    1.3
}

fn default_m5_volume() -> f64 {
    100_000.0
}

fn default_score_threshold() -> u32 {
    3
}

fn default_cycle_interval() -> u64 {
    10
}

fn default_in_position_interval() -> u64 {
    3
}

fn default_empty_backoff() -> u64 {
    10
}

fn default_discovery_error_backoff() -> u64 {
    5
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            trending_url: default_trending_url(),
            pair_data_url: default_pair_data_url(),
            min_liquidity_usd: default_min_liquidity(),
            min_volume_usd: default_min_volume(),
            max_candidates: default_max_candidates(),
            candidates_per_cycle: default_candidates_per_cycle(),
            min_market_cap_usd: default_min_market_cap(),
            max_market_cap_usd: default_max_market_cap(),
            m5_ratio_threshold: default_m5_ratio(),
            m5_volume_threshold: default_m5_volume(),
            prediction_score_threshold: default_score_threshold(),
            cycle_interval_secs: default_cycle_interval(),
            in_position_interval_secs: default_in_position_interval(),
            empty_backoff_secs: default_empty_backoff(),
            error_backoff_secs: default_discovery_error_backoff(),
        }
    }
}

/// Status server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Whether the status server is started
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    /// Telegram notification settings
    #[serde(default)]
    pub telegram: TelegramNotificationConfig,
}

/// Telegram-specific notification configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramNotificationConfig {
    /// Whether Telegram notifications are enabled
    #[serde(default)]
    pub enabled: bool,
    /// Bot token (from environment: SCALPER_NOTIFICATIONS__TELEGRAM__BOT_TOKEN)
    #[serde(default)]
    pub bot_token: String,
    /// Chat ID to send notifications to
    #[serde(default)]
    pub chat_id: String,
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SCALPER_*)
    /// 2. config/config.yaml (if exists)
    /// 3. config.yaml (if exists)
    /// 4. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            // SCALPER_RPC__URL=https://... -> rpc.url
            // SCALPER_MONITOR__PROFIT_TARGET_PERCENT=20 -> monitor.profit_target_percent
            .add_source(
                Environment::with_prefix("SCALPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration values
    ///
    /// Every credential and endpoint the trading path needs must be present
    /// before any trading operation may proceed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wallet.private_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Message(
                "Wallet private key must be set via SCALPER_WALLET__PRIVATE_KEY or the vault"
                    .to_string(),
            ));
        }

        if self.rpc.url.trim().is_empty() {
            return Err(ConfigError::Message("RPC URL must be set".to_string()));
        }

        if self.swap.url.trim().is_empty() {
            return Err(ConfigError::Message("Swap gateway URL must be set".to_string()));
        }

        if self.swap.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Message(
                "Swap gateway API key must be set via SCALPER_SWAP__API_KEY or the vault"
                    .to_string(),
            ));
        }

        if self.trading.base_mint.trim().is_empty() {
            return Err(ConfigError::Message("Base currency mint must be set".to_string()));
        }

        if Pubkey::from_str(self.trading.base_mint.trim()).is_err() {
            return Err(ConfigError::Message(format!(
                "Base currency mint is not a valid address: {}",
                self.trading.base_mint
            )));
        }

        if self.trading.trade_fraction <= Decimal::ZERO || self.trading.trade_fraction > Decimal::ONE {
            return Err(ConfigError::Message(
                "Trade fraction must be within (0, 1]".to_string(),
            ));
        }

        if self.executor.max_concurrent_requests == 0 {
            return Err(ConfigError::Message(
                "Executor needs at least one concurrency permit".to_string(),
            ));
        }

        if self.verifier.min_reads == 0 {
            return Err(ConfigError::Message(
                "Verifier needs at least one read per pass".to_string(),
            ));
        }

        // A balance is trusted only after two identical consecutive reads
        if self.verifier.required_confirmations == 0 {
            return Err(ConfigError::Message(
                "Verifier needs at least one matching confirmation".to_string(),
            ));
        }

        if self.verifier.required_confirmations >= self.verifier.min_reads {
            return Err(ConfigError::Message(format!(
                "Verifier cannot collect {} confirmations in {} reads",
                self.verifier.required_confirmations, self.verifier.min_reads
            )));
        }

        if self.discovery.min_market_cap_usd > self.discovery.max_market_cap_usd {
            return Err(ConfigError::Message(
                "Market cap lower bound must not exceed upper bound".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wallet: WalletConfig::default(),
            rpc: RpcConfig::default(),
            swap: SwapConfig::default(),
            oracle: OracleConfig::default(),
            http: HttpConfig::default(),
            trading: TradingConfig::default(),
            executor: ExecutorConfig::default(),
            verifier: VerifierConfig::default(),
            monitor: MonitorConfig::default(),
            discovery: DiscoveryConfig::default(),
            server: ServerConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}
