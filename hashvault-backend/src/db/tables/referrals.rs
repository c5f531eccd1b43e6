//! Referrer edges and commission payouts

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use crate::models::{ReferralLog, ReferrerEdge};
use super::super::Database;

/// One commission credit to be written with its audit row
#[derive(Debug, Clone, PartialEq)]
pub struct NewReferralPayout {
    pub payee_user_name: String,
    pub profit: f64,
    pub group_leader_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayoutWrite {
    Recorded,
    UnknownPayee(String),
}

impl Database {
    /// Insert or replace the edge for (user_name, package_type).
    /// Rates outside [0, 100] are rejected before touching storage.
    pub fn upsert_referrer_edge(&self, edge: &ReferrerEdge) -> SqliteResult<()> {
        edge.validate().map_err(|e| {
            rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                e,
            )))
        })?;

        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO referrer_edges (user_name, referrer_user_name, package_type, fee_rate,
                                         group_leader_name, fee_rate_leader, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(user_name, package_type) DO UPDATE SET
                referrer_user_name = excluded.referrer_user_name,
                fee_rate = excluded.fee_rate,
                group_leader_name = excluded.group_leader_name,
                fee_rate_leader = excluded.fee_rate_leader,
                updated_at = excluded.updated_at",
            rusqlite::params![
                edge.user_name,
                edge.referrer_user_name,
                edge.package_type,
                edge.fee_rate,
                edge.group_leader_name,
                edge.fee_rate_leader,
                now
            ],
        )?;
        Ok(())
    }

    pub fn find_referrer_edge(&self, user_name: &str, package_type: &str) -> SqliteResult<Option<ReferrerEdge>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT user_name, referrer_user_name, package_type, fee_rate, group_leader_name, fee_rate_leader
             FROM referrer_edges WHERE user_name = ?1 AND package_type = ?2",
            [user_name, package_type],
            |row| {
                Ok(ReferrerEdge {
                    user_name: row.get(0)?,
                    referrer_user_name: row.get(1)?,
                    package_type: row.get(2)?,
                    fee_rate: row.get(3)?,
                    group_leader_name: row.get(4)?,
                    fee_rate_leader: row.get(5)?,
                })
            },
        )
        .optional()
    }

    /// Credit every commission of one purchase and write their log rows in a
    /// single transaction. If any payee has no account nothing is written and
    /// that payee is returned.
    pub fn record_referral_payouts(
        &self,
        payer_user_name: &str,
        package_type: &str,
        payouts: &[NewReferralPayout],
    ) -> SqliteResult<PayoutWrite> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        for payout in payouts {
            let rows = tx.execute(
                "UPDATE users SET referral_earnings = referral_earnings + ?1 WHERE user_name = ?2",
                rusqlite::params![payout.profit, payout.payee_user_name],
            )?;
            if rows == 0 {
                return Ok(PayoutWrite::UnknownPayee(payout.payee_user_name.clone()));
            }

            tx.execute(
                "INSERT INTO referral_logs (group_leader_name, payer_user_name, payee_user_name,
                                            package_type, profit, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    payout.group_leader_name,
                    payer_user_name,
                    payout.payee_user_name,
                    package_type,
                    payout.profit,
                    now
                ],
            )?;
        }

        tx.commit()?;
        Ok(PayoutWrite::Recorded)
    }

    pub fn list_referral_logs(&self, payee_user_name: Option<&str>) -> SqliteResult<Vec<ReferralLog>> {
        let conn = self.conn.lock();
        let map_row = |row: &rusqlite::Row| {
            Ok(ReferralLog {
                id: row.get(0)?,
                group_leader_name: row.get(1)?,
                payer_user_name: row.get(2)?,
                payee_user_name: row.get(3)?,
                package_type: row.get(4)?,
                profit: row.get(5)?,
                created_at: row.get(6)?,
            })
        };

        let logs = match payee_user_name {
            Some(payee) => {
                let mut stmt = conn.prepare(
                    "SELECT id, group_leader_name, payer_user_name, payee_user_name, package_type, profit, created_at
                     FROM referral_logs WHERE payee_user_name = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt.query_map([payee], map_row)?;
                rows.collect::<SqliteResult<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, group_leader_name, payer_user_name, payee_user_name, package_type, profit, created_at
                     FROM referral_logs ORDER BY id ASC",
                )?;
                let rows = stmt.query_map([], map_row)?;
                rows.collect::<SqliteResult<Vec<_>>>()?
            }
        };
        Ok(logs)
    }
}
