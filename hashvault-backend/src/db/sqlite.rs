use parking_lot::Mutex;
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;

pub struct Database {
    pub(super) conn: Mutex<Connection>,
}

impl Database {
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        let conn = if database_url == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Create parent directory if it doesn't exist
            if let Some(parent) = Path::new(database_url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).ok();
                }
            }
            let conn = Connection::open(database_url)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn
        };
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock();

        // One row per task kind
        conn.execute(
            "CREATE TABLE IF NOT EXISTS monitoring_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT UNIQUE NOT NULL,
                is_running INTEGER NOT NULL DEFAULT 0,
                interval_seconds INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_name TEXT UNIQUE NOT NULL,
                referrer_user_name TEXT,
                referral_earnings REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS wallets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER UNIQUE NOT NULL,
                address TEXT NOT NULL,
                native_gas_balance REAL NOT NULL DEFAULT 0,
                stable_token_balance REAL NOT NULL DEFAULT 0,
                withdraw_address TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // Append-only; tx_hash uniqueness backs up the dedup check
        conn.execute(
            "CREATE TABLE IF NOT EXISTS transaction_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tx_type TEXT NOT NULL,
                amount REAL NOT NULL,
                token TEXT NOT NULL,
                tx_hash TEXT UNIQUE NOT NULL,
                user_id INTEGER NOT NULL,
                wallet_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (wallet_id) REFERENCES wallets(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS referrer_edges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_name TEXT NOT NULL,
                referrer_user_name TEXT NOT NULL,
                package_type TEXT NOT NULL,
                fee_rate REAL NOT NULL DEFAULT 0,
                group_leader_name TEXT,
                fee_rate_leader REAL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_name, package_type)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS referral_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_leader_name TEXT,
                payer_user_name TEXT NOT NULL,
                payee_user_name TEXT NOT NULL,
                package_type TEXT NOT NULL,
                profit REAL NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_referral_logs_payee ON referral_logs(payee_user_name, created_at DESC)",
            [],
        )?;

        Ok(())
    }
}
