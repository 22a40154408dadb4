//! Chain client
//!
//! JSON-RPC 2.0 over the shared HTTP session:
//! - `getBalance` for the wallet's base-currency balance
//! - `getAccountInfo` (jsonParsed) for associated token accounts
//! - `sendTransaction` for signed swap transactions

use crate::models::TokenBalance;
use crate::session::{Session, SessionClosed};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;

/// RPC error messages that indicate the transaction may land on a resend
const TRANSIENT_NODE_ERRORS: [&str; 2] = ["blockhash not found", "transaction was not confirmed"];

/// Chain client errors
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Session released
    #[error(transparent)]
    Closed(#[from] SessionClosed),

    /// Connection failure or timeout
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("RPC HTTP status {0}")]
    Status(u16),

    /// Error object returned by the node
    #[error("RPC node error {code}: {message}")]
    Node { code: i64, message: String },

    /// Response did not match the expected schema
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// Account exists but is not an SPL token account
    #[error("Account {0} is not an SPL token account")]
    NotTokenAccount(String),

    /// Transaction could not be serialized
    #[error("Transaction encoding failed: {0}")]
    Encode(String),
}

impl RpcError {
    /// Whether retrying the whole attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::Status(status) => *status == 429 || *status >= 500,
            RpcError::Node { message, .. } => {
                let message = message.to_lowercase();
                TRANSIENT_NODE_ERRORS
                    .iter()
                    .any(|pattern| message.contains(pattern))
            }
            _ => false,
        }
    }
}

/// Read and write access to the chain
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance of `address` in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// Balance of an SPL token account, `None` if the account does not exist
    async fn get_token_balance(&self, token_account: &Pubkey)
        -> Result<Option<TokenBalance>, RpcError>;

    /// Broadcast a signed transaction, returning its signature
    async fn send_transaction(&self, transaction: &VersionedTransaction)
        -> Result<String, RpcError>;
}

/// JSON-RPC envelope
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `{context, value}` result wrapper
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    data: AccountData,
}

/// jsonParsed falls back to raw encoding for unknown programs
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountData {
    Parsed(ParsedAccountData),
    Raw(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct ParsedAccountData {
    program: String,
    parsed: ParsedTokenAccount,
}

#[derive(Debug, Deserialize)]
struct ParsedTokenAccount {
    info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
struct UiTokenAmount {
    amount: String,
    decimals: u8,
}

/// HTTP JSON-RPC implementation
pub struct HttpChainClient {
    session: Arc<Session>,
    url: String,
    node_max_retries: u32,
}

impl HttpChainClient {
    pub fn new(session: Arc<Session>, url: impl Into<String>, node_max_retries: u32) -> Self {
        Self {
            session,
            url: url.into(),
            node_max_retries,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .session
            .client()?
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status(status.as_u16()));
        }

        // A stalled or dropped body is a transport failure, not a schema mismatch
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let body: RpcResponse<T> = serde_json::from_slice(&bytes)
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }

        body.result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{} returned no result", method)))
    }
}

#[async_trait::async_trait]
impl ChainClient for HttpChainClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let result: WithContext<u64> = self
            .call("getBalance", serde_json::json!([address.to_string()]))
            .await?;
        Ok(result.value)
    }

    async fn get_token_balance(
        &self,
        token_account: &Pubkey,
    ) -> Result<Option<TokenBalance>, RpcError> {
        let result: WithContext<Option<AccountInfo>> = self
            .call(
                "getAccountInfo",
                serde_json::json!([token_account.to_string(), {"encoding": "jsonParsed"}]),
            )
            .await?;

        let Some(account) = result.value else {
            return Ok(None);
        };

        let parsed = match account.data {
            AccountData::Parsed(parsed) if parsed.program == "spl-token" => parsed,
            _ => return Err(RpcError::NotTokenAccount(token_account.to_string())),
        };

        let amount = &parsed.parsed.info.token_amount;
        let raw_amount = amount.amount.parse::<u64>().map_err(|e| {
            RpcError::InvalidResponse(format!("Invalid token amount {:?}: {}", amount.amount, e))
        })?;

        Ok(Some(TokenBalance::from_raw(raw_amount, amount.decimals)))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<String, RpcError> {
        let bytes = bincode::serialize(transaction).map_err(|e| RpcError::Encode(e.to_string()))?;
        let encoded = BASE64.encode(bytes);

        self.call(
            "sendTransaction",
            serde_json::json!([
                encoded,
                {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "maxRetries": self.node_max_retries,
                }
            ]),
        )
        .await
    }
}
