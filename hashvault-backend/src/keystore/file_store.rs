//! JSON file key store
//!
//! The file maps wallet identifiers to hex-encoded private keys:
//! `{"hot": "0xac09..."}`. It is re-read on every call so key rotation
//! needs no restart.

use async_trait::async_trait;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature, transaction::eip2718::TypedTransaction};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{KeyStore, KeyStoreError};

pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_wallet(&self, wallet_id: &str) -> Result<LocalWallet, KeyStoreError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            log::error!("[KeyStore] Failed to read {}: {}", self.path.display(), e);
            KeyStoreError::Unreadable(format!("{}: {}", self.path.display(), e))
        })?;

        let keys: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| KeyStoreError::Malformed(e.to_string()))?;

        let private_key = keys
            .get(wallet_id)
            .ok_or_else(|| KeyStoreError::MissingKey(wallet_id.to_string()))?;

        wallet_from_private_key(private_key).map_err(|reason| KeyStoreError::InvalidKey {
            wallet_id: wallet_id.to_string(),
            reason,
        })
    }
}

fn wallet_from_private_key(private_key: &str) -> Result<LocalWallet, String> {
    let private_key = private_key.trim();
    let key_hex = private_key.strip_prefix("0x").unwrap_or(private_key);

    let key_bytes = hex::decode(key_hex)
        .map_err(|e| format!("Invalid private key hex: {}", e))?;
    if key_bytes.len() != 32 {
        return Err(format!("Private key must be 32 bytes, got {}", key_bytes.len()));
    }

    let signing_key = SigningKey::from_bytes(key_bytes.as_slice().into())
        .map_err(|e| format!("Invalid private key: {}", e))?;

    Ok(LocalWallet::from(signing_key))
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn address(&self, wallet_id: &str) -> Result<Address, KeyStoreError> {
        Ok(self.load_wallet(wallet_id).await?.address())
    }

    async fn sign(&self, wallet_id: &str, tx: &TypedTransaction) -> Result<Signature, KeyStoreError> {
        let wallet = self.load_wallet(wallet_id).await?;
        wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| KeyStoreError::Signing(e.to_string()))
    }
}
