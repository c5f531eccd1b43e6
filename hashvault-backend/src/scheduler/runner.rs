//! Timer loop and tick execution for one task kind

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use super::handler::TaskHandler;
use crate::models::TaskKind;

/// Per-kind counters. Owned by the scheduler, so they outlive any one timer.
#[derive(Default)]
pub(super) struct TaskStats {
    /// Set while a tick is executing
    busy: AtomicBool,
    pub ticks: AtomicU64,
    pub skipped: AtomicU64,
    pub failures: AtomicU64,
    pub last_tick_at: Mutex<Option<String>>,
    pub last_error: Mutex<Option<String>>,
}

impl TaskStats {
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn record_failure(&self, kind: TaskKind, error: String) {
        log::error!("[Scheduler] {} tick failed: {}", kind, error);
        self.failures.fetch_add(1, Ordering::SeqCst);
        *self.last_error.lock() = Some(error);
    }
}

/// Clears the busy flag however the tick ends
struct BusyGuard(Arc<TaskStats>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

/// Fire every `period` until the shutdown signal arrives.
/// The first tick fires one full period after start.
pub(super) async fn run_timer(
    kind: TaskKind,
    period: Duration,
    handler: Arc<dyn TaskHandler>,
    stats: Arc<TaskStats>,
    tick_timeout: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                log::debug!("[Scheduler] {} timer received shutdown signal", kind);
                break;
            }
            _ = ticker.tick() => {
                dispatch_tick(kind, handler.clone(), stats.clone(), tick_timeout);
            }
        }
    }
}

/// Start a tick in the background unless the previous one is still running
fn dispatch_tick(kind: TaskKind, handler: Arc<dyn TaskHandler>, stats: Arc<TaskStats>, tick_timeout: Duration) {
    if stats
        .busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        let skipped = stats.skipped.fetch_add(1, Ordering::SeqCst) + 1;
        log::warn!("[Scheduler] {} tick skipped, previous tick still running ({} skipped so far)", kind, skipped);
        return;
    }

    stats.ticks.fetch_add(1, Ordering::SeqCst);
    *stats.last_tick_at.lock() = Some(Utc::now().to_rfc3339());

    tokio::spawn(async move {
        let _guard = BusyGuard(stats.clone());

        // Separate task so a panic surfaces as a JoinError instead of unwinding here
        let mut work = tokio::spawn(async move { handler.run().await });

        match timeout(tick_timeout, &mut work).await {
            Ok(Ok(Ok(summary))) => {
                log::debug!("[Scheduler] {} tick finished: {}", kind, summary);
            }
            Ok(Ok(Err(e))) => stats.record_failure(kind, e),
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() { "panicked" } else { "was cancelled" };
                stats.record_failure(kind, format!("handler {}", reason));
            }
            Err(_) => {
                work.abort();
                stats.record_failure(kind, format!("timed out after {}s", tick_timeout.as_secs()));
            }
        }
    });
}
