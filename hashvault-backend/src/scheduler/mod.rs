//! Recurring background tasks
//!
//! One timer per `TaskKind`, driven by the persisted `monitoring_tasks` rows.
//! Handles live in a `DashMap` so inserting a timer is atomic per kind.

mod handler;
mod runner;

pub use handler::{HandlerRegistry, TaskHandler};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::sync::oneshot;

use crate::db::Database;
use crate::models::{TaskKind, TaskStatus};
use runner::TaskStats;

/// What `start` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// Persisted row says the task is off
    Disabled,
    /// No persisted row for the kind
    Missing,
    NoHandler,
    /// Name did not parse as a task kind
    UnknownKind,
}

struct TimerHandle {
    interval_seconds: i64,
    shutdown_tx: oneshot::Sender<()>,
}

pub struct TaskScheduler {
    db: Arc<Database>,
    registry: HandlerRegistry,
    running: Arc<DashMap<TaskKind, TimerHandle>>,
    stats: HashMap<TaskKind, Arc<TaskStats>>,
    tick_timeout: Duration,
}

impl TaskScheduler {
    pub fn new(db: Arc<Database>, registry: HandlerRegistry, tick_timeout: Duration) -> Self {
        let stats = TaskKind::iter()
            .map(|kind| (kind, Arc::new(TaskStats::default())))
            .collect();
        Self {
            db,
            registry,
            running: Arc::new(DashMap::new()),
            stats,
            tick_timeout,
        }
    }

    /// Seed missing task rows, then start every task persisted as running.
    /// Returns how many timers were started.
    pub fn boot(&self) -> Result<usize, String> {
        let seeded = self
            .db
            .seed_monitoring_tasks()
            .map_err(|e| format!("Failed to seed monitoring tasks: {}", e))?;
        if seeded > 0 {
            log::info!("[Scheduler] Seeded {} monitoring task(s)", seeded);
        }

        let tasks = self
            .db
            .list_monitoring_tasks()
            .map_err(|e| format!("Failed to list monitoring tasks: {}", e))?;

        let mut started = 0;
        for task in tasks.into_iter().filter(|t| t.is_running) {
            match self.start(task.kind) {
                Ok(StartOutcome::Started) => started += 1,
                Ok(_) => {}
                Err(e) => log::error!("[Scheduler] Failed to start {} at boot: {}", task.kind, e),
            }
        }

        log::info!("[Scheduler] Boot complete, {} task(s) running", started);
        Ok(started)
    }

    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.running.contains_key(&kind)
    }

    pub fn running_kinds(&self) -> Vec<TaskKind> {
        self.running.iter().map(|e| *e.key()).collect()
    }

    /// Start the timer for `kind` if its persisted row allows it
    pub fn start(&self, kind: TaskKind) -> Result<StartOutcome, String> {
        let Some(handler) = self.registry.get(kind) else {
            log::warn!("[Scheduler] No handler registered for {}, not starting", kind);
            return Ok(StartOutcome::NoHandler);
        };

        let task = match self.db.get_monitoring_task(kind) {
            Ok(Some(task)) => task,
            Ok(None) => {
                log::warn!("[Scheduler] No monitoring task row for {}, not starting", kind);
                return Ok(StartOutcome::Missing);
            }
            Err(e) => return Err(format!("Failed to load task {}: {}", kind, e)),
        };

        if self.running.contains_key(&kind) {
            return Ok(StartOutcome::AlreadyRunning);
        }

        if !task.is_running {
            log::warn!("[Scheduler] {} is disabled, refusing to start", kind);
            return Ok(StartOutcome::Disabled);
        }

        if task.interval_seconds <= 0 {
            return Err(format!("Task {} has invalid interval {}s", kind, task.interval_seconds));
        }

        match self.running.entry(kind) {
            Entry::Occupied(_) => Ok(StartOutcome::AlreadyRunning),
            Entry::Vacant(slot) => {
                let (shutdown_tx, shutdown_rx) = oneshot::channel();
                let period = Duration::from_secs(task.interval_seconds as u64);

                tokio::spawn(runner::run_timer(
                    kind,
                    period,
                    handler,
                    self.stats_for(kind),
                    self.tick_timeout,
                    shutdown_rx,
                ));

                slot.insert(TimerHandle {
                    interval_seconds: task.interval_seconds,
                    shutdown_tx,
                });
                log::info!("[Scheduler] Started {} (every {}s)", kind, task.interval_seconds);
                Ok(StartOutcome::Started)
            }
        }
    }

    /// Clear the timer for `kind`. In-flight work runs to completion.
    /// Returns whether a timer was running.
    pub fn stop(&self, kind: TaskKind) -> bool {
        match self.running.remove(&kind) {
            Some((_, handle)) => {
                log::info!("[Scheduler] Stopping {}", kind);
                let _ = handle.shutdown_tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn start_by_name(&self, name: &str) -> Result<StartOutcome, String> {
        match TaskKind::from_str(name) {
            Ok(kind) => self.start(kind),
            Err(_) => {
                log::warn!("[Scheduler] Unknown task kind '{}', ignoring start", name);
                Ok(StartOutcome::UnknownKind)
            }
        }
    }

    pub fn stop_by_name(&self, name: &str) -> bool {
        match TaskKind::from_str(name) {
            Ok(kind) => self.stop(kind),
            Err(_) => {
                log::warn!("[Scheduler] Unknown task kind '{}', ignoring stop", name);
                false
            }
        }
    }

    /// Bring the in-memory timer in line with the persisted row.
    /// A running timer whose interval no longer matches is restarted.
    /// Returns whether the task is running afterwards.
    pub fn reconcile_with_persisted(&self, kind: TaskKind) -> Result<bool, String> {
        let task = self
            .db
            .get_monitoring_task(kind)
            .map_err(|e| format!("Failed to load task {}: {}", kind, e))?;

        let Some(task) = task.filter(|t| t.is_running) else {
            self.stop(kind);
            return Ok(false);
        };

        let stale = self
            .running
            .get(&kind)
            .map(|h| h.interval_seconds != task.interval_seconds)
            .unwrap_or(false);
        if stale {
            log::info!("[Scheduler] {} interval changed to {}s, restarting", kind, task.interval_seconds);
            self.stop(kind);
        }

        let outcome = self.start(kind)?;
        Ok(matches!(outcome, StartOutcome::Started | StartOutcome::AlreadyRunning))
    }

    pub fn status(&self, kind: TaskKind) -> Result<Option<TaskStatus>, String> {
        let task = self
            .db
            .get_monitoring_task(kind)
            .map_err(|e| format!("Failed to load task {}: {}", kind, e))?;
        Ok(task.map(|t| self.build_status(t.kind, t.is_running, t.interval_seconds)))
    }

    pub fn status_all(&self) -> Result<Vec<TaskStatus>, String> {
        let tasks = self
            .db
            .list_monitoring_tasks()
            .map_err(|e| format!("Failed to list monitoring tasks: {}", e))?;
        Ok(tasks
            .into_iter()
            .map(|t| self.build_status(t.kind, t.is_running, t.interval_seconds))
            .collect())
    }

    pub fn stop_all(&self) {
        for kind in self.running_kinds() {
            self.stop(kind);
        }
    }

    fn stats_for(&self, kind: TaskKind) -> Arc<TaskStats> {
        self.stats
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn build_status(&self, kind: TaskKind, enabled: bool, interval_seconds: i64) -> TaskStatus {
        let stats = self.stats_for(kind);
        TaskStatus {
            kind,
            enabled,
            running: self.is_running(kind),
            busy: stats.is_busy(),
            interval_seconds,
            ticks: stats.ticks.load(Ordering::SeqCst),
            skipped_ticks: stats.skipped.load(Ordering::SeqCst),
            failures: stats.failures.load(Ordering::SeqCst),
            last_tick_at: stats.last_tick_at.lock().clone(),
            last_error: stats.last_error.lock().clone(),
        }
    }
}
