//! Ledger access: token transfers, balances and native transfers
//!
//! `LedgerGateway` is the seam the reconciler and gas funder talk to.
//! `HttpLedgerGateway` backs it with a block explorer for token data and a
//! JSON-RPC node for native balance and transfers.

pub mod evm_rpc;
pub mod explorer;
#[cfg(test)]
pub(crate) mod mock;

pub use explorer::TokenTransfer;

use async_trait::async_trait;
use ethers::types::{Address, TransactionRequest, U256, transaction::eip2718::TypedTransaction};
use ethers::utils::{format_ether, parse_ether};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::keystore::KeyStore;
use evm_rpc::EvmRpc;
use explorer::ExplorerClient;

/// Gas limit of a plain value transfer
const NATIVE_TRANSFER_GAS: u64 = 21_000;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Transport or provider failure
    Request(String),
    /// Provider answered but the payload made no sense
    InvalidResponse(String),
    /// Caller supplied something unusable (bad address, bad amount)
    InvalidInput(String),
    Signing(String),
    /// Submitted but not confirmed with a successful receipt
    NotConfirmed(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Request(e) => write!(f, "Ledger request failed: {}", e),
            LedgerError::InvalidResponse(e) => write!(f, "Invalid ledger response: {}", e),
            LedgerError::InvalidInput(e) => write!(f, "Invalid ledger input: {}", e),
            LedgerError::Signing(e) => write!(f, "Signing failed: {}", e),
            LedgerError::NotConfirmed(e) => write!(f, "Transfer not confirmed: {}", e),
        }
    }
}

impl std::error::Error for LedgerError {}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Token transfers touching `address`, most recent first, restricted to the
    /// configured token. `None` means the ledger has no data for the address.
    async fn inbound_transfers(&self, address: &str) -> Result<Option<Vec<TokenTransfer>>, LedgerError>;

    /// Token balance in whole tokens
    async fn token_balance(&self, address: &str) -> Result<f64, LedgerError>;

    /// Native balance in whole native units
    async fn native_balance(&self, address: &str) -> Result<f64, LedgerError>;

    /// Send `amount` native units from the key-store wallet `from_wallet_id` to `to`.
    /// Resolves once the transfer has one successful confirmation; returns the tx hash.
    async fn transfer_native(&self, from_wallet_id: &str, to: &str, amount: f64) -> Result<String, LedgerError>;
}

/// Convert a raw smallest-unit amount to whole tokens, truncated to 6 decimals.
///
/// The division happens on 256-bit integers so the result never rounds up.
pub fn to_token_amount(raw: &str, decimals: u32) -> Result<f64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Empty token amount".to_string());
    }
    let raw_value = U256::from_dec_str(raw)
        .map_err(|e| format!("Unparsable token amount '{}': {:?}", raw, e))?;

    let micro_units = if decimals >= 6 {
        let divisor = U256::from(10u64)
            .checked_pow(U256::from(decimals - 6))
            .ok_or_else(|| format!("Token decimals {} out of range", decimals))?;
        raw_value / divisor
    } else {
        let factor = U256::from(10u64).pow(U256::from(6 - decimals));
        raw_value
            .checked_mul(factor)
            .ok_or_else(|| format!("Token amount '{}' overflows", raw))?
    };

    if micro_units > U256::from(u128::MAX) {
        return Err(format!("Token amount '{}' is too large", raw));
    }
    Ok(micro_units.as_u128() as f64 / 1e6)
}

fn parse_address(address: &str) -> Result<Address, LedgerError> {
    address
        .trim()
        .parse()
        .map_err(|e| LedgerError::InvalidInput(format!("Invalid address '{}': {}", address, e)))
}

pub struct HttpLedgerGateway {
    explorer: ExplorerClient,
    rpc: EvmRpc,
    keystore: Arc<dyn KeyStore>,
    chain_id: u64,
    token_decimals: u32,
    receipt_timeout: Duration,
}

impl HttpLedgerGateway {
    pub fn from_config(config: &Config, keystore: Arc<dyn KeyStore>) -> Result<Self, String> {
        let explorer = ExplorerClient::new(
            &config.explorer_api_url,
            &config.explorer_api_key,
            &config.token_contract_address,
            config.http_timeout,
        )?;
        let rpc = EvmRpc::new(&config.rpc_url, config.http_timeout)?;

        Ok(Self {
            explorer,
            rpc,
            keystore,
            chain_id: config.chain_id,
            token_decimals: config.token_decimals,
            receipt_timeout: config.receipt_timeout,
        })
    }
}

#[async_trait]
impl LedgerGateway for HttpLedgerGateway {
    async fn inbound_transfers(&self, address: &str) -> Result<Option<Vec<TokenTransfer>>, LedgerError> {
        self.explorer
            .token_transfers(address)
            .await
            .map_err(LedgerError::Request)
    }

    async fn token_balance(&self, address: &str) -> Result<f64, LedgerError> {
        let raw = self
            .explorer
            .token_balance(address)
            .await
            .map_err(LedgerError::Request)?;
        to_token_amount(&raw, self.token_decimals).map_err(LedgerError::InvalidResponse)
    }

    async fn native_balance(&self, address: &str) -> Result<f64, LedgerError> {
        let wei = self
            .rpc
            .get_balance(parse_address(address)?)
            .await
            .map_err(LedgerError::Request)?;
        format_ether(wei)
            .parse::<f64>()
            .map_err(|e| LedgerError::InvalidResponse(format!("Balance {} not representable: {}", wei, e)))
    }

    async fn transfer_native(&self, from_wallet_id: &str, to: &str, amount: f64) -> Result<String, LedgerError> {
        let to = parse_address(to)?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidInput(format!("Invalid transfer amount {}", amount)));
        }
        let value = parse_ether(amount)
            .map_err(|e| LedgerError::InvalidInput(format!("Invalid transfer amount {}: {}", amount, e)))?;

        let from = self
            .keystore
            .address(from_wallet_id)
            .await
            .map_err(|e| LedgerError::Signing(e.to_string()))?;

        let nonce = self.rpc.get_transaction_count(from).await.map_err(LedgerError::Request)?;
        let gas_price = self.rpc.gas_price().await.map_err(LedgerError::Request)?;

        let tx: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .nonce(nonce)
            .gas(NATIVE_TRANSFER_GAS)
            .gas_price(gas_price)
            .chain_id(self.chain_id)
            .into();

        let signature = self
            .keystore
            .sign(from_wallet_id, &tx)
            .await
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);

        let tx_hash = self.rpc.send_raw_transaction(&raw).await.map_err(LedgerError::Request)?;
        log::info!("[EvmRpc] Submitted native transfer {:?} ({} to {:?})", tx_hash, amount, to);

        let receipt = self
            .rpc
            .wait_for_receipt(tx_hash, self.receipt_timeout)
            .await
            .map_err(LedgerError::NotConfirmed)?;
        if !receipt.succeeded() {
            return Err(LedgerError::NotConfirmed(format!("{:?} reverted", tx_hash)));
        }
        log::info!(
            "[EvmRpc] {:?} confirmed in block {:?}, gas used {:?}",
            receipt.transaction_hash, receipt.block_number, receipt.gas_used
        );

        Ok(format!("{:?}", tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_token_amount_exact() {
        assert_eq!(to_token_amount("1500000000000000000", 18).unwrap(), 1.5);
        assert_eq!(to_token_amount("500000000000000000000", 18).unwrap(), 500.0);
        assert_eq!(to_token_amount("0", 18).unwrap(), 0.0);
    }

    #[test]
    fn test_to_token_amount_truncates() {
        assert_eq!(to_token_amount("1234567999999999999", 18).unwrap(), 1.234567);
        // Below one micro-unit
        assert_eq!(to_token_amount("999999999999", 18).unwrap(), 0.0);
    }

    #[test]
    fn test_to_token_amount_other_decimals() {
        assert_eq!(to_token_amount("2500000", 6).unwrap(), 2.5);
        assert_eq!(to_token_amount("15", 1).unwrap(), 1.5);
    }

    #[test]
    fn test_to_token_amount_rejects_garbage() {
        assert!(to_token_amount("12abc", 18).is_err());
        assert!(to_token_amount("", 18).is_err());
        assert!(to_token_amount("-5", 18).is_err());
    }
}
