//! User account operations used by the referral cascade

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use crate::models::User;
use super::super::Database;

/// Result of looking up a user's account-level referrer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferrerLookup {
    Referrer(String),
    /// User exists but names no referrer
    NoReferrer,
    /// No account with that user name
    UnknownUser,
}

impl Database {
    pub fn create_user(&self, user_name: &str, referrer_user_name: Option<&str>) -> SqliteResult<User> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO users (user_name, referrer_user_name, referral_earnings, created_at)
             VALUES (?1, ?2, 0, ?3)",
            rusqlite::params![user_name, referrer_user_name, now],
        )?;

        Ok(User {
            id: conn.last_insert_rowid(),
            user_name: user_name.to_string(),
            referrer_user_name: referrer_user_name.map(|s| s.to_string()),
            referral_earnings: 0.0,
            created_at: now,
        })
    }

    pub fn get_user_by_name(&self, user_name: &str) -> SqliteResult<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_name, referrer_user_name, referral_earnings, created_at
             FROM users WHERE user_name = ?1",
            [user_name],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    user_name: row.get(1)?,
                    referrer_user_name: row.get(2)?,
                    referral_earnings: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()
    }

    /// Account-level referrer of a user, independent of package type.
    /// A blank referrer counts as none.
    pub fn find_generic_referrer(&self, user_name: &str) -> SqliteResult<ReferrerLookup> {
        let conn = self.conn.lock();
        let referrer: Option<Option<String>> = conn
            .query_row(
                "SELECT referrer_user_name FROM users WHERE user_name = ?1",
                [user_name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match referrer {
            None => ReferrerLookup::UnknownUser,
            Some(r) => match r.filter(|r| !r.trim().is_empty()) {
                Some(r) => ReferrerLookup::Referrer(r),
                None => ReferrerLookup::NoReferrer,
            },
        })
    }

    pub fn set_generic_referrer(&self, user_name: &str, referrer_user_name: Option<&str>) -> SqliteResult<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE users SET referrer_user_name = ?1 WHERE user_name = ?2",
            rusqlite::params![referrer_user_name, user_name],
        )?;
        Ok(rows > 0)
    }
}
