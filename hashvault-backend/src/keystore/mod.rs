//! Custodial key access
//!
//! Signing goes through the `KeyStore` trait so the key source can be swapped.
//! The file-backed store is the only implementation shipped here.

mod file_store;

pub use file_store::FileKeyStore;

use async_trait::async_trait;
use ethers::types::{Address, Signature, transaction::eip2718::TypedTransaction};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum KeyStoreError {
    /// The backing store could not be read
    Unreadable(String),
    /// The backing store was read but is not a wallet-id to key mapping
    Malformed(String),
    /// No key for the requested wallet identifier
    MissingKey(String),
    InvalidKey { wallet_id: String, reason: String },
    Signing(String),
}

impl fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStoreError::Unreadable(e) => write!(f, "Key store unreadable: {}", e),
            KeyStoreError::Malformed(e) => write!(f, "Key store malformed: {}", e),
            KeyStoreError::MissingKey(id) => write!(f, "No key for wallet '{}'", id),
            KeyStoreError::InvalidKey { wallet_id, reason } => {
                write!(f, "Invalid key for wallet '{}': {}", wallet_id, reason)
            }
            KeyStoreError::Signing(e) => write!(f, "Failed to sign transaction: {}", e),
        }
    }
}

impl std::error::Error for KeyStoreError {}

#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Public address controlled by the key stored under `wallet_id`
    async fn address(&self, wallet_id: &str) -> Result<Address, KeyStoreError>;

    /// Sign a typed transaction with the key stored under `wallet_id`
    async fn sign(&self, wallet_id: &str, tx: &TypedTransaction) -> Result<Signature, KeyStoreError>;
}
