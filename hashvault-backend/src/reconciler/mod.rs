//! Deposit reconciliation
//!
//! Each pass walks every custodial wallet, looks at the most recent inbound
//! token transfer, credits it once per tx hash and keeps the wallet's native
//! gas topped up.
//!
//! Only the latest transfer is inspected per pass. Several deposits landing
//! between two passes are not all seen.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::db::tables::DepositCredit;
use crate::db::Database;
use crate::gas::{GasFunder, GasTopUpPolicy};
use crate::ledger::{to_token_amount, LedgerError, LedgerGateway};
use crate::models::Wallet;
use crate::scheduler::TaskHandler;

#[derive(Debug)]
pub enum ReconcileError {
    /// Bad data for one wallet or transfer; only that item is skipped
    Validation(String),
    External(LedgerError),
    Storage(rusqlite::Error),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Validation(e) => write!(f, "Validation error: {}", e),
            ReconcileError::External(e) => write!(f, "External service error: {}", e),
            ReconcileError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ReconcileError {}

impl From<rusqlite::Error> for ReconcileError {
    fn from(e: rusqlite::Error) -> Self {
        ReconcileError::Storage(e)
    }
}

impl From<LedgerError> for ReconcileError {
    fn from(e: LedgerError) -> Self {
        ReconcileError::External(e)
    }
}

/// What happened to one wallet in a pass
#[derive(Debug, Clone, PartialEq)]
pub enum WalletOutcome {
    /// Ledger had no transfers for the address
    NoData,
    /// Transfers exist but none is addressed to the wallet
    NoInbound,
    /// Latest inbound transfer was already credited
    Duplicate { tx_hash: String },
    Credited {
        tx_hash: String,
        amount: f64,
        balance_after: f64,
        gas_topped_up: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileSummary {
    pub scanned: usize,
    pub credited: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
    pub gas_topped_up: usize,
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned={} credited={} duplicates={} skipped={} failed={} gas_topped_up={}",
            self.scanned, self.credited, self.duplicates, self.skipped, self.failed, self.gas_topped_up
        )
    }
}

pub struct DepositReconciler {
    db: Arc<Database>,
    ledger: Arc<dyn LedgerGateway>,
    funder: GasFunder,
    policy: GasTopUpPolicy,
    token_symbol: String,
    token_decimals: u32,
}

impl DepositReconciler {
    pub fn new(
        db: Arc<Database>,
        ledger: Arc<dyn LedgerGateway>,
        funder: GasFunder,
        policy: GasTopUpPolicy,
        token_symbol: impl Into<String>,
        token_decimals: u32,
    ) -> Self {
        Self {
            db,
            ledger,
            funder,
            policy,
            token_symbol: token_symbol.into(),
            token_decimals,
        }
    }

    pub fn from_config(db: Arc<Database>, ledger: Arc<dyn LedgerGateway>, config: &Config) -> Self {
        let funder = GasFunder::new(ledger.clone(), config.hot_wallet_id.clone());
        let policy = GasTopUpPolicy::new(config.gas_topup_threshold, config.gas_topup_amount);
        Self::new(db, ledger, funder, policy, config.token_symbol.clone(), config.token_decimals)
    }

    /// One pass over every wallet. Per-wallet failures are logged and counted;
    /// only failing to list the wallets fails the pass.
    pub async fn reconcile_all(&self) -> Result<ReconcileSummary, ReconcileError> {
        let wallets = self.db.list_wallets()?;
        let mut summary = ReconcileSummary::default();

        for wallet in &wallets {
            summary.scanned += 1;
            match self.reconcile_wallet(wallet).await {
                Ok(WalletOutcome::NoData) | Ok(WalletOutcome::NoInbound) => summary.skipped += 1,
                Ok(WalletOutcome::Duplicate { .. }) => summary.duplicates += 1,
                Ok(WalletOutcome::Credited { gas_topped_up, .. }) => {
                    summary.credited += 1;
                    if gas_topped_up {
                        summary.gas_topped_up += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    log::error!("[Reconciler] Wallet {} ({}): {}", wallet.id, wallet.address, e);
                }
            }
        }

        log::info!("[Reconciler] Pass complete: {}", summary);
        Ok(summary)
    }

    pub async fn reconcile_wallet(&self, wallet: &Wallet) -> Result<WalletOutcome, ReconcileError> {
        wallet.validate_address().map_err(ReconcileError::Validation)?;

        let Some(transfers) = self.ledger.inbound_transfers(&wallet.address).await? else {
            return Ok(WalletOutcome::NoData);
        };

        let Some(latest) = transfers.into_iter().find(|t| wallet.is_recipient(&t.to)) else {
            return Ok(WalletOutcome::NoInbound);
        };

        let tx_hash = latest.hash.trim().to_string();
        if tx_hash.is_empty() {
            return Err(ReconcileError::Validation(format!(
                "transfer to {} has no hash",
                wallet.address
            )));
        }
        let amount = to_token_amount(&latest.value, self.token_decimals)
            .map_err(ReconcileError::Validation)?;

        let balance_after = match self
            .db
            .credit_deposit(wallet.id, amount, &self.token_symbol, &tx_hash)?
        {
            DepositCredit::Duplicate => {
                log::debug!("[Reconciler] {} already credited, skipping", tx_hash);
                return Ok(WalletOutcome::Duplicate { tx_hash });
            }
            DepositCredit::Credited { balance_before, balance_after } => {
                log::info!(
                    "[Reconciler] Credited {} {} to wallet {} ({} -> {}, tx {})",
                    amount, self.token_symbol, wallet.id, balance_before, balance_after, tx_hash
                );
                balance_after
            }
        };

        let gas_topped_up = self.check_gas(wallet).await;

        Ok(WalletOutcome::Credited {
            tx_hash,
            amount,
            balance_after,
            gas_topped_up,
        })
    }

    /// Top up native gas if needed and refresh the cached figure.
    /// Never fails: the deposit credit is already committed.
    ///
    /// Only reached after a new credit, so a failed top-up is not retried
    /// until the wallet's next deposit.
    async fn check_gas(&self, wallet: &Wallet) -> bool {
        let current = match self.ledger.native_balance(&wallet.address).await {
            Ok(balance) => balance,
            Err(e) => {
                log::error!("[GasTopUp] Native balance lookup for {} failed: {}", wallet.address, e);
                return false;
            }
        };

        let (topped_up, figure) = match self.policy.top_up_amount(current) {
            Some(amount) => {
                log::info!(
                    "[GasTopUp] Wallet {} has {} native, sending {}",
                    wallet.id, current, amount
                );
                if self.funder.fund(&wallet.address, amount).await {
                    (true, current + amount)
                } else {
                    (false, current)
                }
            }
            None => (false, current),
        };

        if figure != wallet.native_gas_balance {
            if let Err(e) = self.db.update_wallet_gas_balance(wallet.id, figure) {
                log::error!("[GasTopUp] Failed to persist gas figure for wallet {}: {}", wallet.id, e);
            }
        }
        topped_up
    }
}

#[async_trait]
impl TaskHandler for DepositReconciler {
    async fn run(&self) -> Result<String, String> {
        self.reconcile_all()
            .await
            .map(|summary| summary.to_string())
            .map_err(|e| e.to_string())
    }
}
