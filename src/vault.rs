//! Encrypted secrets vault using AES-256-GCM
//!
//! Provides secure storage and retrieval of the bot's credentials:
//! - Wallet private key (base58)
//! - Swap gateway API key
//!
//! File format: Base64 encoded (nonce || ciphertext || tag)

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secrets stored in the encrypted vault
#[derive(Debug, Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct VaultSecrets {
    /// Wallet private key (base58 encoded 64-byte keypair)
    #[serde(default)]
    pub wallet_private_key: Option<String>,
    /// Swap gateway API key
    #[serde(default)]
    pub swap_api_key: Option<String>,
}

impl VaultSecrets {
    /// Copy present secrets into the loaded configuration
    pub fn apply_to(&self, config: &mut crate::config::AppConfig) {
        if let Some(key) = self.wallet_private_key.as_ref().filter(|k| !k.is_empty()) {
            config.wallet.private_key = SecretString::new(key.clone());
        }
        if let Some(key) = self.swap_api_key.as_ref().filter(|k| !k.is_empty()) {
            config.swap.api_key = SecretString::new(key.clone());
        }
    }
}

/// Vault for encrypted secrets
pub struct Vault {
    /// Encryption key (32 bytes for AES-256)
    key: [u8; 32],
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Vault errors
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Invalid encryption key
    #[error("Invalid vault key: {0}")]
    InvalidKey(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// OS randomness unavailable
    #[error("Random source failed: {0}")]
    Random(String),

    /// File I/O error
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Base64 decoding error
    #[error("Base64 decode error: {0}")]
    Base64Error(String),
}

impl Vault {
    /// Create a new vault with the given key
    ///
    /// # Arguments
    /// * `key_hex` - 64-character hex string (32 bytes)
    pub fn new(key_hex: &str) -> Result<Self, VaultError> {
        let mut key_bytes = hex::decode(key_hex)
            .map_err(|e| VaultError::InvalidKey(format!("Invalid hex key: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(VaultError::InvalidKey(format!(
                "Key must be 32 bytes (64 hex chars), got {} bytes",
                key_bytes.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        key_bytes.zeroize();

        Ok(Self { key })
    }

    /// Create a vault from the SCALPER_VAULT_KEY environment variable
    pub fn from_env() -> Result<Self, VaultError> {
        let key_hex = std::env::var("SCALPER_VAULT_KEY").map_err(|_| {
            VaultError::InvalidKey("SCALPER_VAULT_KEY environment variable not set".to_string())
        })?;

        Self::new(&key_hex)
    }

    /// Load and decrypt secrets from a file
    pub fn load_secrets(&self, path: impl AsRef<Path>) -> Result<VaultSecrets, VaultError> {
        let encrypted_data = std::fs::read_to_string(path)?;
        self.decrypt_secrets(&encrypted_data)
    }

    /// Decrypt secrets from a base64-encoded string
    pub fn decrypt_secrets(&self, encrypted_base64: &str) -> Result<VaultSecrets, VaultError> {
        let encrypted_bytes = BASE64
            .decode(encrypted_base64.trim())
            .map_err(|e| VaultError::Base64Error(format!("Failed to decode base64: {}", e)))?;

        // nonce (12) + tag (16) at minimum
        if encrypted_bytes.len() < 12 + 16 {
            return Err(VaultError::DecryptionFailed(
                "Encrypted data too short".to_string(),
            ));
        }

        let nonce = Nonce::from_slice(&encrypted_bytes[..12]);
        let ciphertext = &encrypted_bytes[12..];

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| VaultError::InvalidKey(format!("Failed to create cipher: {}", e)))?;

        let mut plaintext = cipher.decrypt(nonce, ciphertext).map_err(|e| {
            VaultError::DecryptionFailed(format!("AES-GCM decryption failed: {}", e))
        })?;

        let secrets = serde_json::from_slice::<VaultSecrets>(&plaintext);
        plaintext.zeroize();

        Ok(secrets?)
    }

    /// Encrypt and save secrets to a file
    pub fn save_secrets(
        &self,
        secrets: &VaultSecrets,
        path: impl AsRef<Path>,
    ) -> Result<(), VaultError> {
        let encrypted = self.encrypt_secrets(secrets)?;
        std::fs::write(path, encrypted)?;
        Ok(())
    }

    /// Encrypt secrets to a base64-encoded string
    pub fn encrypt_secrets(&self, secrets: &VaultSecrets) -> Result<String, VaultError> {
        let mut plaintext = serde_json::to_vec(secrets)?;

        let nonce_bytes: [u8; 12] = rand_bytes()?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| VaultError::InvalidKey(format!("Failed to create cipher: {}", e)))?;

        let ciphertext = cipher.encrypt(nonce, plaintext.as_slice()).map_err(|e| {
            VaultError::EncryptionFailed(format!("AES-GCM encryption failed: {}", e))
        });
        plaintext.zeroize();
        let ciphertext = ciphertext?;

        let mut combined = Vec::with_capacity(12 + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&combined))
    }

    /// Generate a new random vault key (for setup)
    pub fn generate_key() -> Result<String, VaultError> {
        let key_bytes: [u8; 32] = rand_bytes()?;
        Ok(hex::encode(key_bytes))
    }
}

/// Generate random bytes using getrandom (cryptographically secure)
fn rand_bytes<const N: usize>() -> Result<[u8; N], VaultError> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes).map_err(|e| VaultError::Random(e.to_string()))?;
    Ok(bytes)
}

/// Try to load secrets from vault file, falling back to environment variables
///
/// The plain `PRIVATE_KEY` and `API_KEY` variables are honoured for
/// compatibility with existing `.env` files.
pub fn load_secrets_with_fallback() -> Result<VaultSecrets, VaultError> {
    if let Ok(vault) = Vault::from_env() {
        let vault_path = std::env::var("SCALPER_VAULT_PATH")
            .unwrap_or_else(|_| "config/secrets.enc".to_string());

        if Path::new(&vault_path).exists() {
            match vault.load_secrets(&vault_path) {
                Ok(secrets) => {
                    tracing::info!("Loaded secrets from encrypted vault");
                    return Ok(secrets);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load vault, falling back to env vars");
                }
            }
        }
    }

    Ok(VaultSecrets {
        wallet_private_key: std::env::var("SCALPER_WALLET__PRIVATE_KEY")
            .or_else(|_| std::env::var("PRIVATE_KEY"))
            .ok(),
        swap_api_key: std::env::var("SCALPER_SWAP__API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok(),
    })
}
