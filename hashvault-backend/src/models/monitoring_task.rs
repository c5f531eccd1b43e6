use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The five fixed kinds of recurring background work.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum TaskKind {
    #[strum(serialize = "deposit")]
    #[serde(rename = "deposit")]
    Deposit,
    #[strum(serialize = "mining")]
    #[serde(rename = "mining")]
    Mining,
    #[strum(serialize = "crawler")]
    #[serde(rename = "crawler")]
    Crawler,
    #[strum(serialize = "coinPrice")]
    #[serde(rename = "coinPrice")]
    CoinPrice,
    #[strum(serialize = "masterWithdraw")]
    #[serde(rename = "masterWithdraw")]
    MasterWithdraw,
}

impl TaskKind {
    /// Interval used when the row is seeded at first boot
    pub fn default_interval_secs(&self) -> i64 {
        match self {
            TaskKind::Deposit => 60,
            TaskKind::Mining => 3600,
            TaskKind::Crawler => 600,
            TaskKind::CoinPrice => 300,
            TaskKind::MasterWithdraw => 300,
        }
    }

    /// Whether the seeded row starts enabled. Only deposit polling runs out of the box.
    pub fn default_running(&self) -> bool {
        matches!(self, TaskKind::Deposit)
    }
}

/// Persisted definition of a recurring job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringTask {
    pub id: i64,
    pub kind: TaskKind,
    pub is_running: bool,
    pub interval_seconds: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Admin request to change a task definition
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMonitoringTaskRequest {
    pub is_running: Option<bool>,
    pub interval_seconds: Option<i64>,
}

/// Persisted row joined with the scheduler's in-memory view of it
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub kind: TaskKind,
    pub enabled: bool,
    pub running: bool,
    /// A tick is executing right now
    pub busy: bool,
    pub interval_seconds: i64,
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub failures: u64,
    pub last_tick_at: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kind_names_match_persisted_form() {
        assert_eq!(TaskKind::CoinPrice.to_string(), "coinPrice");
        assert_eq!(TaskKind::MasterWithdraw.as_ref(), "masterWithdraw");
        assert_eq!(TaskKind::from_str("deposit").unwrap(), TaskKind::Deposit);
        assert!(TaskKind::from_str("Deposit").is_err());
        assert!(TaskKind::from_str("withdraw").is_err());
    }

    #[test]
    fn test_five_canonical_kinds() {
        assert_eq!(TaskKind::iter().count(), 5);
        assert_eq!(TaskKind::iter().filter(|k| k.default_running()).count(), 1);
    }
}
