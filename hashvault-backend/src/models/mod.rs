pub mod monitoring_task;
pub mod referral;
pub mod transaction;
pub mod wallet;

pub use monitoring_task::{MonitoringTask, TaskKind, TaskResponse, TaskStatus, UpdateMonitoringTaskRequest};
pub use referral::{PurchaseCompletedRequest, ReferralLog, ReferrerEdge, User};
pub use transaction::{TransactionRecord, TransactionType};
pub use wallet::Wallet;
