//! Shared fixtures for controller tests

use actix_web::web;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{env_vars, Config};
use crate::db::Database;
use crate::gas::{GasFunder, GasTopUpPolicy};
use crate::ledger::mock::MockLedger;
use crate::models::TaskKind;
use crate::reconciler::DepositReconciler;
use crate::referral::ReferralCascade;
use crate::scheduler::{HandlerRegistry, TaskScheduler};
use crate::AppState;

pub fn test_config() -> Config {
    Config::from_lookup(|var| {
        let value = match var {
            v if v == env_vars::EXPLORER_API_URL => "http://127.0.0.1:1/api",
            v if v == env_vars::TOKEN_CONTRACT_ADDRESS => "0x55d398326f99059ff775485246999027b3197955",
            v if v == env_vars::RPC_URL => "http://127.0.0.1:1",
            v if v == env_vars::HOT_WALLET_ID => "hot",
            v if v == env_vars::DATABASE_URL => ":memory:",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test config")
}

pub fn test_state() -> web::Data<AppState> {
    test_state_with_ledger(Arc::new(MockLedger::new()))
}

pub fn test_state_with_ledger(ledger: Arc<MockLedger>) -> web::Data<AppState> {
    let config = test_config();
    let db = Arc::new(Database::new(":memory:").unwrap());

    let reconciler = DepositReconciler::new(
        db.clone(),
        ledger.clone(),
        GasFunder::new(ledger.clone(), "hot"),
        GasTopUpPolicy::default(),
        "USDT",
        18,
    );
    let registry = HandlerRegistry::new().with(TaskKind::Deposit, Arc::new(reconciler));
    let scheduler = Arc::new(TaskScheduler::new(db.clone(), registry, Duration::from_secs(300)));
    let cascade = Arc::new(ReferralCascade::new(db.clone(), config.referral_max_hops));

    web::Data::new(AppState {
        db,
        config,
        scheduler,
        cascade,
        ledger,
    })
}
