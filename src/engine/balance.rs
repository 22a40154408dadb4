//! Balance verifier
//!
//! Reads a token account repeatedly and trusts the amount only after enough
//! consecutive identical reads. A zero read ends the pass at once.

use crate::config::VerifierConfig;
use crate::models::TokenBalance;
use crate::rpc::ChainClient;
use crate::token::associated_token_address;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one verification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Stable positive balance
    Confirmed(TokenBalance),
    /// A read showed zero
    Empty,
    /// Not enough matching reads; carries the last successful read
    Unstable { last: Option<TokenBalance> },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Confirmed(_))
    }

    /// Confirmed balance, if any
    pub fn balance(&self) -> Option<TokenBalance> {
        match self {
            Verification::Confirmed(balance) => Some(*balance),
            _ => None,
        }
    }
}

/// Quorum reader for the wallet's token accounts
pub struct BalanceVerifier {
    chain: Arc<dyn ChainClient>,
    owner: Pubkey,
    min_reads: u32,
    read_interval: Duration,
    required_confirmations: u32,
}

impl BalanceVerifier {
    pub fn new(chain: Arc<dyn ChainClient>, owner: Pubkey, config: &VerifierConfig) -> Self {
        Self {
            chain,
            owner,
            min_reads: config.min_reads.max(1),
            read_interval: Duration::from_millis(config.read_interval_ms),
            required_confirmations: config.required_confirmations,
        }
    }

    /// Run one verification pass for `mint`
    pub async fn verify(&self, mint: &Pubkey) -> Verification {
        let account = associated_token_address(&self.owner, mint);
        let mut confirmations = 0u32;
        let mut last: Option<TokenBalance> = None;

        for read in 0..self.min_reads {
            if read > 0 {
                tokio::time::sleep(self.read_interval).await;
            }

            let balance = match self.chain.get_token_balance(&account).await {
                Ok(Some(balance)) => balance,
                Ok(None) => {
                    tracing::debug!(mint = %mint, read, "Token account not found");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(mint = %mint, read, error = %e, "Token balance read failed");
                    continue;
                }
            };

            if balance.is_empty() {
                tracing::warn!(mint = %mint, read, "Zero balance detected");
                return Verification::Empty;
            }

            match last {
                Some(previous) if previous.raw_amount == balance.raw_amount => confirmations += 1,
                _ => confirmations = 0,
            }
            last = Some(balance);
        }

        match last {
            Some(balance) if confirmations >= self.required_confirmations => {
                Verification::Confirmed(balance)
            }
            _ => {
                tracing::warn!(
                    mint = %mint,
                    confirmations,
                    required = self.required_confirmations,
                    "Token balance not stable"
                );
                Verification::Unstable { last }
            }
        }
    }
}
