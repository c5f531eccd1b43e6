//! Monitoring task registry database operations

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};
use std::str::FromStr;
use strum::IntoEnumIterator;

use crate::models::{MonitoringTask, TaskKind};
use super::super::Database;

impl Database {
    /// Insert the canonical row for every task kind that has none yet.
    /// Returns how many rows were created.
    pub fn seed_monitoring_tasks(&self) -> SqliteResult<usize> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let mut created = 0;
        for kind in TaskKind::iter() {
            created += conn.execute(
                "INSERT OR IGNORE INTO monitoring_tasks (kind, is_running, interval_seconds, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                rusqlite::params![kind.as_ref(), kind.default_running(), kind.default_interval_secs(), now],
            )?;
        }
        Ok(created)
    }

    pub fn get_monitoring_task(&self, kind: TaskKind) -> SqliteResult<Option<MonitoringTask>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, kind, is_running, interval_seconds, created_at, updated_at
             FROM monitoring_tasks WHERE kind = ?1",
            [kind.as_ref()],
            map_monitoring_task_row,
        )
        .optional()
    }

    pub fn list_monitoring_tasks(&self) -> SqliteResult<Vec<MonitoringTask>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, kind, is_running, interval_seconds, created_at, updated_at
             FROM monitoring_tasks ORDER BY id ASC",
        )?;
        let tasks = stmt
            .query_map([], map_monitoring_task_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Apply an admin change. Returns the updated row, or None if the kind was never seeded.
    pub fn update_monitoring_task(
        &self,
        kind: TaskKind,
        is_running: Option<bool>,
        interval_seconds: Option<i64>,
    ) -> SqliteResult<Option<MonitoringTask>> {
        {
            let conn = self.conn.lock();
            let now = Utc::now().to_rfc3339();

            let mut updates = vec!["updated_at = ?1".to_string()];
            let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];

            if let Some(v) = is_running {
                params.push(Box::new(v));
                updates.push(format!("is_running = ?{}", params.len()));
            }
            if let Some(v) = interval_seconds {
                params.push(Box::new(v));
                updates.push(format!("interval_seconds = ?{}", params.len()));
            }
            params.push(Box::new(kind.as_ref().to_string()));

            let sql = format!(
                "UPDATE monitoring_tasks SET {} WHERE kind = ?{}",
                updates.join(", "),
                params.len()
            );
            let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
            conn.execute(&sql, param_refs.as_slice())?;
        }

        self.get_monitoring_task(kind)
    }
}

fn map_monitoring_task_row(row: &rusqlite::Row) -> SqliteResult<MonitoringTask> {
    let kind_str: String = row.get(1)?;
    let kind = TaskKind::from_str(&kind_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(MonitoringTask {
        id: row.get(0)?,
        kind,
        is_running: row.get::<_, i32>(2)? != 0,
        interval_seconds: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_idempotent() {
        let db = Database::new(":memory:").unwrap();
        assert_eq!(db.seed_monitoring_tasks().unwrap(), 5);
        assert_eq!(db.seed_monitoring_tasks().unwrap(), 0);

        let tasks = db.list_monitoring_tasks().unwrap();
        assert_eq!(tasks.len(), 5);
        let deposit = db.get_monitoring_task(TaskKind::Deposit).unwrap().unwrap();
        assert!(deposit.is_running);
        assert_eq!(deposit.interval_seconds, 60);
    }

    #[test]
    fn test_seed_keeps_admin_changes() {
        let db = Database::new(":memory:").unwrap();
        db.seed_monitoring_tasks().unwrap();
        db.update_monitoring_task(TaskKind::Mining, Some(true), Some(120)).unwrap();
        db.seed_monitoring_tasks().unwrap();

        let mining = db.get_monitoring_task(TaskKind::Mining).unwrap().unwrap();
        assert!(mining.is_running);
        assert_eq!(mining.interval_seconds, 120);
    }

    #[test]
    fn test_update_partial_and_missing() {
        let db = Database::new(":memory:").unwrap();
        assert!(db.update_monitoring_task(TaskKind::Crawler, Some(true), None).unwrap().is_none());

        db.seed_monitoring_tasks().unwrap();
        let crawler = db
            .update_monitoring_task(TaskKind::Crawler, None, Some(42))
            .unwrap()
            .unwrap();
        assert!(!crawler.is_running);
        assert_eq!(crawler.interval_seconds, 42);
    }
}
