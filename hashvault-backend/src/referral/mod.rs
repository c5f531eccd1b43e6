//! Referral commission cascade
//!
//! Triggered by a completed purchase. Walks up from the payer until a
//! package-specific referrer edge is found, falling back to account-level
//! referrers, and pays that edge's referrer and group leader. Only the first
//! matched edge pays.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::db::tables::{NewReferralPayout, PayoutWrite, ReferrerLookup};
use crate::db::Database;
use crate::models::ReferrerEdge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutRole {
    Referrer,
    GroupLeader,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payout {
    pub payee_user_name: String,
    pub amount: f64,
    pub role: PayoutRole,
    pub group_leader_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CascadeOutcome {
    /// Nobody up the chain refers this package
    NoReferrer,
    /// First matching edge settled; `payouts` is empty when its rates are zero
    Settled { payouts: Vec<Payout> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CascadeError {
    CycleDetected { user_name: String },
    ChainExhausted { hops: usize },
    /// A user on the walk has no account
    DanglingReferrer { user_name: String },
    InvalidFeeRate { user_name: String, package_type: String, reason: String },
    UnknownPayee(String),
    InvalidPrice(f64),
    Storage(String),
}

impl fmt::Display for CascadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeError::CycleDetected { user_name } => {
                write!(f, "Referrer cycle detected at '{}'", user_name)
            }
            CascadeError::ChainExhausted { hops } => {
                write!(f, "Referrer chain longer than {} hops", hops)
            }
            CascadeError::DanglingReferrer { user_name } => {
                write!(f, "Referrer chain points at unknown user '{}'", user_name)
            }
            CascadeError::InvalidFeeRate { user_name, package_type, reason } => {
                write!(f, "Invalid fee rate on edge ({}, {}): {}", user_name, package_type, reason)
            }
            CascadeError::UnknownPayee(name) => write!(f, "Payee '{}' has no account", name),
            CascadeError::InvalidPrice(price) => write!(f, "Invalid purchase price {}", price),
            CascadeError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for CascadeError {}

impl From<rusqlite::Error> for CascadeError {
    fn from(e: rusqlite::Error) -> Self {
        CascadeError::Storage(e.to_string())
    }
}

pub struct ReferralCascade {
    db: Arc<Database>,
    max_hops: usize,
}

impl ReferralCascade {
    pub fn new(db: Arc<Database>, max_hops: usize) -> Self {
        Self { db, max_hops }
    }

    pub fn run(
        &self,
        payer_user_name: &str,
        package_type: &str,
        total_price: f64,
    ) -> Result<CascadeOutcome, CascadeError> {
        if !total_price.is_finite() || total_price < 0.0 {
            return Err(CascadeError::InvalidPrice(total_price));
        }

        let Some(edge) = self.find_paying_edge(payer_user_name, package_type)? else {
            log::debug!("[Referral] No referrer for {} on {}", payer_user_name, package_type);
            return Ok(CascadeOutcome::NoReferrer);
        };

        edge.validate().map_err(|reason| CascadeError::InvalidFeeRate {
            user_name: edge.user_name.clone(),
            package_type: edge.package_type.clone(),
            reason,
        })?;

        let payouts = commissions(&edge, total_price);
        if payouts.is_empty() {
            return Ok(CascadeOutcome::Settled { payouts });
        }

        let rows: Vec<NewReferralPayout> = payouts
            .iter()
            .map(|p| NewReferralPayout {
                payee_user_name: p.payee_user_name.clone(),
                profit: p.amount,
                group_leader_name: p.group_leader_name.clone(),
            })
            .collect();

        match self.db.record_referral_payouts(payer_user_name, package_type, &rows)? {
            PayoutWrite::Recorded => {
                for p in &payouts {
                    log::info!(
                        "[Referral] Paid {} to {} ({:?}) for {} buying {}",
                        p.amount, p.payee_user_name, p.role, payer_user_name, package_type
                    );
                }
                Ok(CascadeOutcome::Settled { payouts })
            }
            PayoutWrite::UnknownPayee(name) => {
                log::error!("[Referral] Payee '{}' not found, nothing credited", name);
                Err(CascadeError::UnknownPayee(name))
            }
        }
    }

    /// First package edge found walking up from `payer`, following
    /// account-level referrers where a user has no edge.
    fn find_paying_edge(
        &self,
        payer_user_name: &str,
        package_type: &str,
    ) -> Result<Option<ReferrerEdge>, CascadeError> {
        let mut current = payer_user_name.to_string();
        let mut visited = HashSet::from([current.clone()]);
        let mut hops = 0;

        loop {
            if let Some(edge) = self.db.find_referrer_edge(&current, package_type)? {
                return Ok(Some(edge));
            }

            let next = match self.db.find_generic_referrer(&current)? {
                ReferrerLookup::Referrer(next) => next,
                ReferrerLookup::NoReferrer => return Ok(None),
                ReferrerLookup::UnknownUser => {
                    log::error!("[Referral] Chain from {} reached unknown user {}", payer_user_name, current);
                    return Err(CascadeError::DanglingReferrer { user_name: current });
                }
            };

            hops += 1;
            if hops > self.max_hops {
                log::error!("[Referral] Chain from {} exceeded {} hops", payer_user_name, self.max_hops);
                return Err(CascadeError::ChainExhausted { hops: self.max_hops });
            }
            if !visited.insert(next.clone()) {
                log::error!("[Referral] Cycle from {} at {}", payer_user_name, next);
                return Err(CascadeError::CycleDetected { user_name: next });
            }
            current = next;
        }
    }
}

fn commissions(edge: &ReferrerEdge, total_price: f64) -> Vec<Payout> {
    let mut payouts = Vec::new();

    if edge.fee_rate > 0.0 {
        let commission = total_price * edge.fee_rate / 100.0;
        if commission > 0.0 {
            payouts.push(Payout {
                payee_user_name: edge.referrer_user_name.clone(),
                amount: commission,
                role: PayoutRole::Referrer,
                group_leader_name: edge.group_leader_name.clone(),
            });
        }
    }

    if let (Some(leader), Some(rate)) = (&edge.group_leader_name, edge.fee_rate_leader) {
        if rate > 0.0 && !leader.trim().is_empty() {
            let commission = total_price * rate / 100.0;
            if commission > 0.0 {
                payouts.push(Payout {
                    payee_user_name: leader.clone(),
                    amount: commission,
                    role: PayoutRole::GroupLeader,
                    group_leader_name: Some(leader.clone()),
                });
            }
        }
    }

    payouts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(users: &[(&str, Option<&str>)]) -> (Arc<Database>, ReferralCascade) {
        let db = Arc::new(Database::new(":memory:").unwrap());
        for (name, referrer) in users {
            db.create_user(name, *referrer).unwrap();
        }
        let cascade = ReferralCascade::new(db.clone(), 32);
        (db, cascade)
    }

    fn edge(user: &str, referrer: &str, fee_rate: f64) -> ReferrerEdge {
        ReferrerEdge {
            user_name: user.to_string(),
            referrer_user_name: referrer.to_string(),
            package_type: "gold".to_string(),
            fee_rate,
            group_leader_name: None,
            fee_rate_leader: None,
        }
    }

    fn earnings(db: &Database, name: &str) -> f64 {
        db.get_user_by_name(name).unwrap().unwrap().referral_earnings
    }

    #[test]
    fn test_direct_referrer_paid() {
        let (db, cascade) = setup(&[("alice", None), ("bob", None)]);
        db.upsert_referrer_edge(&edge("alice", "bob", 10.0)).unwrap();

        let outcome = cascade.run("alice", "gold", 100.0).unwrap();
        let CascadeOutcome::Settled { payouts } = outcome else {
            panic!("expected settlement");
        };
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].payee_user_name, "bob");
        assert_eq!(payouts[0].amount, 10.0);

        assert_eq!(earnings(&db, "bob"), 10.0);
        let logs = db.list_referral_logs(None).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].payer_user_name, "alice");
        assert_eq!(logs[0].payee_user_name, "bob");
        assert_eq!(logs[0].profit, 10.0);
    }

    #[test]
    fn test_zero_rate_pays_nothing() {
        let (db, cascade) = setup(&[("alice", None), ("bob", None)]);
        db.upsert_referrer_edge(&edge("alice", "bob", 0.0)).unwrap();

        let outcome = cascade.run("alice", "gold", 100.0).unwrap();
        assert_eq!(outcome, CascadeOutcome::Settled { payouts: vec![] });
        assert_eq!(earnings(&db, "bob"), 0.0);
        assert!(db.list_referral_logs(None).unwrap().is_empty());
    }

    #[test]
    fn test_group_leader_paid_alongside_referrer() {
        let (db, cascade) = setup(&[("alice", None), ("bob", None), ("carol", None)]);
        let mut e = edge("alice", "bob", 10.0);
        e.group_leader_name = Some("carol".to_string());
        e.fee_rate_leader = Some(5.0);
        db.upsert_referrer_edge(&e).unwrap();

        cascade.run("alice", "gold", 200.0).unwrap();

        assert_eq!(earnings(&db, "bob"), 20.0);
        assert_eq!(earnings(&db, "carol"), 10.0);
        let logs = db.list_referral_logs(Some("carol")).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].group_leader_name.as_deref(), Some("carol"));
    }

    #[test]
    fn test_falls_back_to_generic_referrer() {
        // alice has no gold edge; her account referrer bob does, paying dave
        let (db, cascade) = setup(&[("dave", None), ("bob", None), ("alice", Some("bob"))]);
        db.upsert_referrer_edge(&edge("bob", "dave", 10.0)).unwrap();

        cascade.run("alice", "gold", 50.0).unwrap();

        assert_eq!(earnings(&db, "dave"), 5.0);
        let logs = db.list_referral_logs(None).unwrap();
        assert_eq!(logs[0].payer_user_name, "alice");
    }

    #[test]
    fn test_only_first_edge_pays() {
        let (db, cascade) = setup(&[("alice", None), ("bob", None), ("carol", None)]);
        db.upsert_referrer_edge(&edge("alice", "bob", 10.0)).unwrap();
        db.upsert_referrer_edge(&edge("bob", "carol", 10.0)).unwrap();

        cascade.run("alice", "gold", 100.0).unwrap();
        assert_eq!(earnings(&db, "bob"), 10.0);
        assert_eq!(earnings(&db, "carol"), 0.0);
    }

    #[test]
    fn test_no_referrer() {
        let (_db, cascade) = setup(&[("alice", None)]);
        assert_eq!(cascade.run("alice", "gold", 100.0).unwrap(), CascadeOutcome::NoReferrer);
    }

    #[test]
    fn test_cycle_detected() {
        let (db, cascade) = setup(&[("a", None), ("b", Some("a"))]);
        db.set_generic_referrer("a", Some("b")).unwrap();

        assert_eq!(
            cascade.run("a", "gold", 100.0).unwrap_err(),
            CascadeError::CycleDetected { user_name: "a".to_string() }
        );
        assert!(db.list_referral_logs(None).unwrap().is_empty());
    }

    #[test]
    fn test_dangling_referrer_reported() {
        let (db, cascade) = setup(&[("alice", Some("ghost"))]);

        assert_eq!(
            cascade.run("alice", "gold", 100.0).unwrap_err(),
            CascadeError::DanglingReferrer { user_name: "ghost".to_string() }
        );
        assert!(db.list_referral_logs(None).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_payer_reported() {
        let (_db, cascade) = setup(&[]);
        assert_eq!(
            cascade.run("nobody", "gold", 100.0).unwrap_err(),
            CascadeError::DanglingReferrer { user_name: "nobody".to_string() }
        );
    }

    #[test]
    fn test_chain_exhausted() {
        let db = Arc::new(Database::new(":memory:").unwrap());
        db.create_user("u0", None).unwrap();
        for i in 1..=10 {
            db.create_user(&format!("u{}", i), Some(&format!("u{}", i - 1))).unwrap();
        }
        let cascade = ReferralCascade::new(db.clone(), 5);

        assert_eq!(
            cascade.run("u10", "gold", 100.0).unwrap_err(),
            CascadeError::ChainExhausted { hops: 5 }
        );
    }

    #[test]
    fn test_unknown_payee_credits_nothing() {
        let (db, cascade) = setup(&[("alice", None)]);
        db.upsert_referrer_edge(&edge("alice", "ghost", 10.0)).unwrap();

        assert_eq!(
            cascade.run("alice", "gold", 100.0).unwrap_err(),
            CascadeError::UnknownPayee("ghost".to_string())
        );
        assert!(db.list_referral_logs(None).unwrap().is_empty());
    }

    #[test]
    fn test_bad_price_rejected() {
        let (_db, cascade) = setup(&[("alice", None)]);
        assert!(matches!(cascade.run("alice", "gold", -1.0), Err(CascadeError::InvalidPrice(_))));
        assert!(matches!(cascade.run("alice", "gold", f64::NAN), Err(CascadeError::InvalidPrice(_))));
    }
}
