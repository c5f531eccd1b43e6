//! Custodial wallet database operations

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use crate::models::Wallet;
use super::super::Database;

const WALLET_COLUMNS: &str = "id, user_id, address, native_gas_balance, stable_token_balance,
                              withdraw_address, created_at, updated_at";

impl Database {
    pub fn create_wallet(
        &self,
        user_id: i64,
        address: &str,
        withdraw_address: Option<&str>,
    ) -> SqliteResult<Wallet> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO wallets (user_id, address, native_gas_balance, stable_token_balance,
                                  withdraw_address, created_at, updated_at)
             VALUES (?1, ?2, 0, 0, ?3, ?4, ?4)",
            rusqlite::params![user_id, address, withdraw_address, now],
        )?;

        Ok(Wallet {
            id: conn.last_insert_rowid(),
            user_id,
            address: address.to_string(),
            native_gas_balance: 0.0,
            stable_token_balance: 0.0,
            withdraw_address: withdraw_address.map(|s| s.to_string()),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn list_wallets(&self) -> SqliteResult<Vec<Wallet>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM wallets ORDER BY id ASC", WALLET_COLUMNS))?;
        let wallets = stmt
            .query_map([], map_wallet_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(wallets)
    }

    pub fn get_wallet(&self, id: i64) -> SqliteResult<Option<Wallet>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM wallets WHERE id = ?1", WALLET_COLUMNS),
            [id],
            map_wallet_row,
        )
        .optional()
    }

    pub fn get_wallet_by_user_id(&self, user_id: i64) -> SqliteResult<Option<Wallet>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM wallets WHERE user_id = ?1", WALLET_COLUMNS),
            [user_id],
            map_wallet_row,
        )
        .optional()
    }

    pub fn get_wallet_by_address(&self, address: &str) -> SqliteResult<Option<Wallet>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM wallets WHERE lower(address) = lower(?1)", WALLET_COLUMNS),
            [address.trim()],
            map_wallet_row,
        )
        .optional()
    }

    /// Persist a new cached native gas figure
    pub fn update_wallet_gas_balance(&self, id: i64, native_gas_balance: f64) -> SqliteResult<bool> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE wallets SET native_gas_balance = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![native_gas_balance, now, id],
        )?;
        Ok(rows > 0)
    }
}

fn map_wallet_row(row: &rusqlite::Row) -> SqliteResult<Wallet> {
    Ok(Wallet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        address: row.get(2)?,
        native_gas_balance: row.get(3)?,
        stable_token_balance: row.get(4)?,
        withdraw_address: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
