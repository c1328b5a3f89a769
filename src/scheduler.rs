// src/scheduler.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::watcher::{CycleReport, Watcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Fixed-interval trigger for polling cycles.
///
/// The watcher sits behind a mutex that only `tick` locks: a tick that cannot
/// take it immediately is dropped, so at most one cycle is ever in flight.
/// The reported state is a flag set while a tick holds the lock, so reading
/// it never competes with a tick.
pub struct PollScheduler {
    watcher: Arc<Mutex<Watcher>>,
    interval: Duration,
    running: AtomicBool,
}

/// Clears the running flag when the cycle ends, panics included.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PollScheduler {
    pub fn new(watcher: Arc<Mutex<Watcher>>, interval: Duration) -> Self {
        Self {
            watcher,
            interval,
            running: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// One gated trigger. `None` when a cycle was already running.
    pub async fn tick(&self) -> Option<CycleReport> {
        let Ok(mut watcher) = self.watcher.try_lock() else {
            counter!("poll_ticks_dropped_total").increment(1);
            tracing::debug!(target: "scheduler", "tick dropped: previous cycle still running");
            return None;
        };
        self.running.store(true, Ordering::SeqCst);
        let _running = RunningGuard(&self.running);
        let report = watcher.run_cycle().await;
        tracing::info!(
            target: "scheduler",
            outcome = ?report.outcome,
            fetched = report.fetched,
            processed = report.items.len(),
            gap = report.gap,
            cursor = ?report.cursor_after,
            "poll cycle finished"
        );
        Some(report)
    }

    /// Tick forever. Each cycle runs in its own task so the ticker keeps
    /// firing (and dropping) while a slow cycle is in flight; a panicking
    /// cycle only takes its own task down.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(target: "scheduler", interval_secs = self.interval.as_secs(), "poll scheduler started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let me = self.clone();
                let cycle = tokio::spawn(async move {
                    me.tick().await;
                });
                tokio::spawn(async move {
                    if let Err(e) = cycle.await {
                        tracing::error!(target: "scheduler", error = %e, "poll cycle task failed");
                    }
                });
            }
        })
    }
}
