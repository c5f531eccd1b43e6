//! Transaction record operations and the deposit credit

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};
use std::str::FromStr;

use crate::models::{TransactionRecord, TransactionType};
use super::super::Database;

/// Result of attempting to credit an on-chain deposit
#[derive(Debug, Clone, PartialEq)]
pub enum DepositCredit {
    Credited { balance_before: f64, balance_after: f64 },
    /// A record with this hash already exists; nothing was written
    Duplicate,
}

impl Database {
    pub fn transaction_exists(&self, tx_hash: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transaction_records WHERE tx_hash = ?1",
            [tx_hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Credit a deposit to a wallet and append its record, atomically.
    ///
    /// The hash is checked inside the same transaction, before the balance is touched,
    /// so a duplicate can never move money.
    pub fn credit_deposit(
        &self,
        wallet_id: i64,
        amount: f64,
        token: &str,
        tx_hash: &str,
    ) -> SqliteResult<DepositCredit> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM transaction_records WHERE tx_hash = ?1",
            [tx_hash],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Ok(DepositCredit::Duplicate);
        }

        let (user_id, balance_before): (i64, f64) = tx.query_row(
            "SELECT user_id, stable_token_balance FROM wallets WHERE id = ?1",
            [wallet_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let balance_after = balance_before + amount;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO transaction_records (tx_type, amount, token, tx_hash, user_id, wallet_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                TransactionType::Deposit.as_ref(),
                amount,
                token,
                tx_hash,
                user_id,
                wallet_id,
                now
            ],
        )?;
        tx.execute(
            "UPDATE wallets SET stable_token_balance = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![balance_after, now, wallet_id],
        )?;
        tx.commit()?;

        Ok(DepositCredit::Credited {
            balance_before,
            balance_after,
        })
    }

    pub fn get_transaction_by_hash(&self, tx_hash: &str) -> SqliteResult<Option<TransactionRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, tx_type, amount, token, tx_hash, user_id, wallet_id, created_at
             FROM transaction_records WHERE tx_hash = ?1",
            [tx_hash],
            map_transaction_row,
        )
        .optional()
    }

    pub fn list_wallet_transactions(&self, wallet_id: i64) -> SqliteResult<Vec<TransactionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tx_type, amount, token, tx_hash, user_id, wallet_id, created_at
             FROM transaction_records WHERE wallet_id = ?1 ORDER BY id ASC",
        )?;
        let records = stmt
            .query_map([wallet_id], map_transaction_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }

    pub fn count_transactions(&self) -> SqliteResult<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM transaction_records", [], |row| row.get(0))
    }
}

fn map_transaction_row(row: &rusqlite::Row) -> SqliteResult<TransactionRecord> {
    let type_str: String = row.get(1)?;
    let tx_type = TransactionType::from_str(&type_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(TransactionRecord {
        id: row.get(0)?,
        tx_type,
        amount: row.get(2)?,
        token: row.get(3)?,
        tx_hash: row.get(4)?,
        user_id: row.get(5)?,
        wallet_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, i64) {
        let db = Database::new(":memory:").unwrap();
        let user = db.create_user("alice", None).unwrap();
        let wallet = db
            .create_wallet(user.id, "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266", None)
            .unwrap();
        (db, wallet.id)
    }

    #[test]
    fn test_credit_then_duplicate() {
        let (db, wallet_id) = setup();

        let first = db.credit_deposit(wallet_id, 1.5, "USDT", "0xabc").unwrap();
        assert_eq!(
            first,
            DepositCredit::Credited { balance_before: 0.0, balance_after: 1.5 }
        );

        let second = db.credit_deposit(wallet_id, 1.5, "USDT", "0xabc").unwrap();
        assert_eq!(second, DepositCredit::Duplicate);

        assert_eq!(db.get_wallet(wallet_id).unwrap().unwrap().stable_token_balance, 1.5);
        assert_eq!(db.count_transactions().unwrap(), 1);
        assert!(db.transaction_exists("0xabc").unwrap());

        let record = db.get_transaction_by_hash("0xabc").unwrap().unwrap();
        assert_eq!(record.tx_type, TransactionType::Deposit);
        assert_eq!(record.wallet_id, wallet_id);
        assert_eq!(record.token, "USDT");
    }

    #[test]
    fn test_credits_accumulate() {
        let (db, wallet_id) = setup();
        db.credit_deposit(wallet_id, 500.0, "USDT", "0x01").unwrap();
        let second = db.credit_deposit(wallet_id, 0.25, "USDT", "0x02").unwrap();
        assert_eq!(
            second,
            DepositCredit::Credited { balance_before: 500.0, balance_after: 500.25 }
        );
        assert_eq!(db.list_wallet_transactions(wallet_id).unwrap().len(), 2);
    }

    #[test]
    fn test_credit_unknown_wallet_writes_nothing() {
        let (db, _) = setup();
        assert!(db.credit_deposit(999, 1.0, "USDT", "0xdead").is_err());
        assert_eq!(db.count_transactions().unwrap(), 0);
    }
}
