//! Swap gateway client
//!
//! The aggregator returns an unsigned transaction for a requested swap.
//! Signing happens locally with the wallet keypair before broadcast.

use crate::session::{Session, SessionClosed};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Keypair;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;

/// Swap gateway errors
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    /// Session released
    #[error(transparent)]
    Closed(#[from] SessionClosed),

    /// Connection failure or timeout
    #[error("Swap gateway transport error: {0}")]
    Transport(String),

    /// Gateway answered `success: false`
    #[error("Swap gateway rejected request: {0}")]
    Rejected(String),

    /// Required response field absent
    #[error("Swap gateway response missing field: {0}")]
    MissingField(&'static str),

    /// Transaction payload could not be decoded
    #[error("Failed to decode swap transaction: {0}")]
    Decode(String),

    /// Signing with the wallet keypair failed
    #[error("Failed to sign swap transaction: {0}")]
    Signing(String),
}

impl SwapError {
    /// Whether retrying the whole attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SwapError::Transport(_))
    }
}

/// Swap request, serialized as query parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub from_mint: String,
    pub to_mint: String,
    /// Amount in the input token's smallest unit, string-encoded
    pub amount: String,
    /// Slippage tolerance in basis points
    pub slippage: u16,
    /// Priority fee, string-encoded
    pub priority_micro_lamports: String,
    /// Wallet address
    pub owner: String,
    pub provider: String,
}

/// Quote-to-transaction source
#[async_trait::async_trait]
pub trait SwapGateway: Send + Sync {
    /// Fetch the unsigned transaction for `request`
    async fn unsigned_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<VersionedTransaction, SwapError>;
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    #[serde(default)]
    success: bool,
    data: Option<SwapData>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapData {
    base64_transaction: Option<String>,
}

/// Decode a base64 wire transaction
pub fn decode_transaction(encoded: &str) -> Result<VersionedTransaction, SwapError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| SwapError::Decode(format!("Invalid base64: {}", e)))?;

    bincode::deserialize::<VersionedTransaction>(&bytes)
        .map_err(|e| SwapError::Decode(format!("Invalid transaction bytes: {}", e)))
}

/// Re-sign the gateway's message with the wallet keypair
pub fn sign_transaction(
    unsigned: VersionedTransaction,
    keypair: &Keypair,
) -> Result<VersionedTransaction, SwapError> {
    VersionedTransaction::try_new(unsigned.message, &[keypair])
        .map_err(|e| SwapError::Signing(e.to_string()))
}

/// HTTP implementation
pub struct HttpSwapGateway {
    session: Arc<Session>,
    url: String,
    api_key: SecretString,
}

impl HttpSwapGateway {
    pub fn new(session: Arc<Session>, url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            session,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl SwapGateway for HttpSwapGateway {
    async fn unsigned_transaction(
        &self,
        request: &SwapRequest,
    ) -> Result<VersionedTransaction, SwapError> {
        tracing::debug!(
            from = %request.from_mint,
            to = %request.to_mint,
            amount = %request.amount,
            slippage_bps = request.slippage,
            "Requesting swap transaction"
        );

        let response = self
            .session
            .client()?
            .get(&self.url)
            .query(request)
            .header("X-API-KEY", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| SwapError::Transport(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SwapError::Transport(e.to_string()))?;
        let body: SwapResponse = serde_json::from_slice(&bytes)
            .map_err(|e| SwapError::Decode(format!("Invalid gateway response: {}", e)))?;

        if !body.success {
            return Err(SwapError::Rejected(
                body.message.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        let encoded = body
            .data
            .and_then(|d| d.base64_transaction)
            .ok_or(SwapError::MissingField("data.base64Transaction"))?;

        decode_transaction(&encoded)
    }
}
