//! Error types for Raydium Scalper
//!
//! Each client module owns its error enum (`RpcError`, `SwapError`,
//! `OracleError`, `DiscoveryError`, `TradeError`). [`AppError`] covers
//! startup: configuration, secrets, wallet and session construction.

use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Secrets vault error
    #[error("Vault error: {0}")]
    Vault(#[from] crate::vault::VaultError),

    /// Wallet key could not be decoded
    #[error("Invalid wallet key: {0}")]
    Wallet(#[from] crate::token::KeypairError),

    /// HTTP session could not be created
    #[error("HTTP session error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
