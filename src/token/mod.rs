//! Wallet and token account helpers
//!
//! - Decoding the base58 wallet keypair
//! - Deriving associated token accounts (owner, token program, mint)

use crate::constants::programs;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::str::FromStr;
use zeroize::Zeroize;

/// Keypair decoding errors
#[derive(Debug, thiserror::Error)]
pub enum KeypairError {
    /// Not valid base58
    #[error("Invalid base58 private key: {0}")]
    Encoding(String),

    /// Decoded bytes are not a 64-byte keypair
    #[error("Invalid keypair length (expected 64 bytes, got {0})")]
    Length(usize),

    /// Bytes rejected by the signer
    #[error("Invalid keypair bytes: {0}")]
    Invalid(String),
}

/// Decode a base58 encoded 64-byte keypair (32 secret + 32 public)
pub fn parse_keypair(encoded: &str) -> Result<Keypair, KeypairError> {
    let mut bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| KeypairError::Encoding(e.to_string()))?;

    if bytes.len() != 64 {
        let len = bytes.len();
        bytes.zeroize();
        return Err(KeypairError::Length(len));
    }

    let keypair =
        Keypair::try_from(bytes.as_slice()).map_err(|e| KeypairError::Invalid(e.to_string()));
    bytes.zeroize();
    keypair
}

/// Parse a mint or account address
pub fn parse_pubkey(address: &str) -> Option<Pubkey> {
    Pubkey::from_str(address.trim()).ok()
}

/// Derive the associated token account of `owner` for `mint`
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    let token_program = Pubkey::from_str(programs::TOKEN).unwrap_or_default();
    let ata_program = Pubkey::from_str(programs::ASSOCIATED_TOKEN).unwrap_or_default();

    let (address, _bump) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ata_program,
    );
    address
}
