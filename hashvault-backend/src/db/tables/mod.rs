//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod monitoring_tasks; // monitoring_tasks (scheduler task registry)
mod users;            // users (generic referrer, commission balance)
mod wallets;          // wallets
mod transactions;     // transaction_records (deposit dedup)
mod referrals;        // referrer_edges, referral_logs

pub use referrals::{NewReferralPayout, PayoutWrite};
pub use transactions::DepositCredit;
pub use users::ReferrerLookup;
