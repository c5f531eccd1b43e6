use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

/// Append-only ledger row; `tx_hash` is globally unique
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub token: String,
    pub tx_hash: String,
    pub user_id: i64,
    pub wallet_id: i64,
    pub created_at: String,
}
