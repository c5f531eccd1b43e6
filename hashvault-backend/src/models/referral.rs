use serde::{Deserialize, Serialize};

/// Package-specific referrer relation, keyed by (user_name, package_type)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferrerEdge {
    pub user_name: String,
    pub referrer_user_name: String,
    pub package_type: String,
    /// Percentage of the purchase paid to the referrer, 0..=100
    pub fee_rate: f64,
    pub group_leader_name: Option<String>,
    /// Percentage of the purchase paid to the group leader, 0..=100
    pub fee_rate_leader: Option<f64>,
}

impl ReferrerEdge {
    pub fn validate(&self) -> Result<(), String> {
        check_rate("fee_rate", self.fee_rate)?;
        if let Some(rate) = self.fee_rate_leader {
            check_rate("fee_rate_leader", rate)?;
        }
        Ok(())
    }
}

fn check_rate(field: &str, rate: f64) -> Result<(), String> {
    if rate.is_finite() && (0.0..=100.0).contains(&rate) {
        Ok(())
    } else {
        Err(format!("{} must be within [0, 100], got {}", field, rate))
    }
}

/// Audit row written for every commission payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralLog {
    pub id: i64,
    pub group_leader_name: Option<String>,
    pub payer_user_name: String,
    pub payee_user_name: String,
    pub package_type: String,
    pub profit: f64,
    pub created_at: String,
}

/// Platform account as seen by the referral cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub user_name: String,
    /// Account-level referrer, used when no package-specific edge exists
    pub referrer_user_name: Option<String>,
    pub referral_earnings: f64,
    pub created_at: String,
}

/// Purchase-completion event delivered to the cascade
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseCompletedRequest {
    pub payer_user_name: String,
    pub package_type: String,
    pub total_price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(fee_rate: f64, fee_rate_leader: Option<f64>) -> ReferrerEdge {
        ReferrerEdge {
            user_name: "alice".to_string(),
            referrer_user_name: "bob".to_string(),
            package_type: "gold".to_string(),
            fee_rate,
            group_leader_name: Some("carol".to_string()),
            fee_rate_leader,
        }
    }

    #[test]
    fn test_rates_bounds() {
        assert!(edge(0.0, None).validate().is_ok());
        assert!(edge(100.0, Some(100.0)).validate().is_ok());
        assert!(edge(100.5, None).validate().is_err());
        assert!(edge(-1.0, None).validate().is_err());
        assert!(edge(10.0, Some(f64::NAN)).validate().is_err());
    }
}
