//! Plain JSON-RPC client for an EVM node
//!
//! Covers what gas top-ups need: balance, nonce, gas price, raw submission
//! and receipt polling.

use ethers::types::{Address, H256, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub struct EvmRpc {
    client: reqwest::Client,
    rpc_url: String,
    poll_interval: Duration,
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Transaction receipt from eth_getTransactionReceipt
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    pub block_number: Option<U64>,
    pub status: Option<U64>,
    pub gas_used: Option<U256>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == Some(U64::from(1))
    }
}

impl EvmRpc {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build RPC client: {}", e))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            poll_interval: Duration::from_secs(2),
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, String> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: 1,
        };

        log::debug!("[EvmRpc] {} with params: {:?}", method, request.params);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("RPC request {} failed: {}", method, e))?;

        let status = response.status();
        let body = response.text().await
            .map_err(|e| format!("Failed to read response: {}", e))?;

        if !status.is_success() {
            return Err(format!("RPC error ({}): {}", status, if body.is_empty() { "empty response" } else { &body }));
        }

        let rpc_response: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse RPC response: {} - body: {}", e, body))?;

        if let Some(error) = rpc_response.error {
            return Err(format!("RPC error {}: {}", error.code, error.message));
        }

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }

    async fn rpc_quantity(&self, method: &str, params: Value) -> Result<U256, String> {
        let result = self.rpc_call(method, params).await?;
        let hex_str = result.as_str()
            .ok_or_else(|| format!("Invalid {} response", method))?;
        U256::from_str_radix(hex_str.trim_start_matches("0x"), 16)
            .map_err(|e| format!("Failed to parse {} result: {}", method, e))
    }

    /// Native balance in wei
    pub async fn get_balance(&self, address: Address) -> Result<U256, String> {
        self.rpc_quantity("eth_getBalance", json!([format!("{:?}", address), "latest"])).await
    }

    /// Pending nonce for an address
    pub async fn get_transaction_count(&self, address: Address) -> Result<U256, String> {
        self.rpc_quantity("eth_getTransactionCount", json!([format!("{:?}", address), "pending"])).await
    }

    pub async fn gas_price(&self) -> Result<U256, String> {
        self.rpc_quantity("eth_gasPrice", json!([])).await
    }

    pub async fn send_raw_transaction(&self, signed_tx: &[u8]) -> Result<H256, String> {
        let params = json!([format!("0x{}", hex::encode(signed_tx))]);
        let result = self.rpc_call("eth_sendRawTransaction", params).await?;

        let hash_hex = result.as_str()
            .ok_or_else(|| "Invalid sendRawTransaction response".to_string())?;

        hash_hex.parse()
            .map_err(|e| format!("Failed to parse tx hash: {}", e))
    }

    pub async fn get_transaction_receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>, String> {
        let result = self.rpc_call("eth_getTransactionReceipt", json!([format!("{:?}", tx_hash)])).await?;

        if result.is_null() {
            return Ok(None);
        }

        let receipt: TransactionReceipt = serde_json::from_value(result)
            .map_err(|e| format!("Failed to parse receipt: {}", e))?;

        Ok(Some(receipt))
    }

    /// Poll until the transaction is mined or `timeout` elapses
    pub async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        timeout: Duration,
    ) -> Result<TransactionReceipt, String> {
        let start = tokio::time::Instant::now();

        loop {
            if start.elapsed() > timeout {
                return Err(format!("Timeout waiting for tx receipt: {:?}", tx_hash));
            }

            match self.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {
                    log::debug!("[EvmRpc] Waiting for receipt of {:?}...", tx_hash);
                }
                Err(e) => {
                    log::warn!("[EvmRpc] Error fetching receipt: {}, retrying...", e);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
