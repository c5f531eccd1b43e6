//! In-memory `LedgerGateway` for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{LedgerError, LedgerGateway, TokenTransfer};

#[derive(Default)]
pub struct MockLedger {
    transfers: Mutex<HashMap<String, Option<Vec<TokenTransfer>>>>,
    native: Mutex<HashMap<String, f64>>,
    tokens: Mutex<HashMap<String, f64>>,
    failing: Mutex<Vec<String>>,
    fail_native_transfers: AtomicBool,
    pub sent: Mutex<Vec<(String, String, f64)>>,
    pub native_queries: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most-recent-first list returned for `address`
    pub fn set_transfers(&self, address: &str, transfers: Vec<TokenTransfer>) {
        self.transfers.lock().insert(address.to_lowercase(), Some(transfers));
    }

    pub fn set_native(&self, address: &str, balance: f64) {
        self.native.lock().insert(address.to_lowercase(), balance);
    }

    pub fn set_token(&self, address: &str, balance: f64) {
        self.tokens.lock().insert(address.to_lowercase(), balance);
    }

    /// Every call for `address` fails with a request error
    pub fn fail_address(&self, address: &str) {
        self.failing.lock().push(address.to_lowercase());
    }

    pub fn fail_native_transfers(&self, fail: bool) {
        self.fail_native_transfers.store(fail, Ordering::SeqCst);
    }

    fn check(&self, address: &str) -> Result<(), LedgerError> {
        if self.failing.lock().contains(&address.to_lowercase()) {
            return Err(LedgerError::Request(format!("mock failure for {}", address)));
        }
        Ok(())
    }
}

pub fn transfer(hash: &str, to: &str, value: &str) -> TokenTransfer {
    TokenTransfer {
        hash: hash.to_string(),
        from: "0x00000000000000000000000000000000000000aa".to_string(),
        to: to.to_string(),
        value: value.to_string(),
        ..Default::default()
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn inbound_transfers(&self, address: &str) -> Result<Option<Vec<TokenTransfer>>, LedgerError> {
        self.check(address)?;
        Ok(self.transfers.lock().get(&address.to_lowercase()).cloned().flatten())
    }

    async fn token_balance(&self, address: &str) -> Result<f64, LedgerError> {
        self.check(address)?;
        Ok(self.tokens.lock().get(&address.to_lowercase()).copied().unwrap_or(0.0))
    }

    async fn native_balance(&self, address: &str) -> Result<f64, LedgerError> {
        self.check(address)?;
        self.native_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.native.lock().get(&address.to_lowercase()).copied().unwrap_or(0.0))
    }

    async fn transfer_native(&self, from_wallet_id: &str, to: &str, amount: f64) -> Result<String, LedgerError> {
        if self.fail_native_transfers.load(Ordering::SeqCst) {
            return Err(LedgerError::NotConfirmed("mock reverted".to_string()));
        }
        self.sent.lock().push((from_wallet_id.to_string(), to.to_string(), amount));
        Ok(format!("0xtopup{}", self.sent.lock().len()))
    }
}
