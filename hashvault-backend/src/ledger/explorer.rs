//! Etherscan-style block explorer client (`module=account`).
//!
//! Used for `tokentx` (token transfer history) and `tokenbalance`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// One token transfer as reported by `action=tokentx`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub hash: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// Raw amount in the token's smallest unit, base-10
    pub value: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub block_number: String,
    #[serde(default)]
    pub time_stamp: String,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

pub struct ExplorerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    contract_address: String,
}

impl ExplorerClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        contract_address: &str,
        timeout: Duration,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build explorer client: {}", e))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            contract_address: contract_address.to_string(),
        })
    }

    async fn account_query(&self, action: &str, address: &str) -> Result<ExplorerResponse, String> {
        let mut params = vec![
            ("module", "account"),
            ("action", action),
            ("contractaddress", self.contract_address.as_str()),
            ("address", address),
            ("tag", "latest"),
            ("apikey", self.api_key.as_str()),
        ];
        if action == "tokentx" {
            params.extend([("startblock", "0"), ("endblock", "99999999"), ("sort", "desc")]);
        }

        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| format!("Explorer {} request failed: {}", action, e))?;

        if !resp.status().is_success() {
            return Err(format!("Explorer {} returned HTTP {}", action, resp.status()));
        }

        resp.json()
            .await
            .map_err(|e| format!("Failed to parse explorer {} response: {}", action, e))
    }

    /// Transfers of the configured token involving `address`, most recent first.
    /// Returns `Ok(None)` when the explorer has no data for the address.
    pub async fn token_transfers(&self, address: &str) -> Result<Option<Vec<TokenTransfer>>, String> {
        let response = self.account_query("tokentx", address).await?;
        parse_token_transfers(response, &self.contract_address)
    }

    /// Raw token balance (smallest unit, base-10 string)
    pub async fn token_balance(&self, address: &str) -> Result<String, String> {
        let response = self.account_query("tokenbalance", address).await?;
        parse_token_balance(response)
    }
}

fn parse_token_transfers(
    response: ExplorerResponse,
    contract_address: &str,
) -> Result<Option<Vec<TokenTransfer>>, String> {
    if response.status != "1" {
        // "No transactions found" and friends
        log::debug!("[Explorer] tokentx status {}: {}", response.status, response.message);
        return Ok(None);
    }

    let mut transfers: Vec<TokenTransfer> = serde_json::from_value(response.result)
        .map_err(|e| format!("Unexpected tokentx result: {}", e))?;

    transfers.retain(|t| t.contract_address.is_empty() || t.contract_address.eq_ignore_ascii_case(contract_address));
    if transfers.is_empty() {
        return Ok(None);
    }
    Ok(Some(transfers))
}

fn parse_token_balance(response: ExplorerResponse) -> Result<String, String> {
    if response.status != "1" {
        return Err(format!(
            "Explorer tokenbalance failed: {} {}",
            response.message,
            response.result.as_str().unwrap_or_default()
        ));
    }
    response
        .result
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| "tokenbalance result is not a string".to_string())
}
