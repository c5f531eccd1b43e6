//! Native gas top-ups for custodial wallets

use std::sync::Arc;

use crate::ledger::LedgerGateway;

/// Threshold rule: a wallet at or below `threshold` gets `amount` more.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasTopUpPolicy {
    pub threshold: f64,
    pub amount: f64,
}

impl Default for GasTopUpPolicy {
    fn default() -> Self {
        Self {
            threshold: crate::config::defaults::GAS_TOPUP_THRESHOLD,
            amount: crate::config::defaults::GAS_TOPUP_AMOUNT,
        }
    }
}

impl GasTopUpPolicy {
    pub fn new(threshold: f64, amount: f64) -> Self {
        Self { threshold, amount }
    }

    pub fn top_up_amount(&self, current_gas_balance: f64) -> Option<f64> {
        if current_gas_balance <= self.threshold {
            Some(self.amount)
        } else {
            None
        }
    }
}

/// Sends top-ups from the company hot wallet
pub struct GasFunder {
    ledger: Arc<dyn LedgerGateway>,
    hot_wallet_id: String,
}

impl GasFunder {
    pub fn new(ledger: Arc<dyn LedgerGateway>, hot_wallet_id: impl Into<String>) -> Self {
        Self {
            ledger,
            hot_wallet_id: hot_wallet_id.into(),
        }
    }

    /// Best effort: failures are logged and reported as `false`
    pub async fn fund(&self, to_address: &str, amount: f64) -> bool {
        match self.ledger.transfer_native(&self.hot_wallet_id, to_address, amount).await {
            Ok(tx_hash) => {
                log::info!("[GasTopUp] Sent {} to {} ({})", amount, to_address, tx_hash);
                true
            }
            Err(e) => {
                log::error!("[GasTopUp] Top-up of {} to {} failed: {}", amount, to_address, e);
                false
            }
        }
    }
}
