// src/watcher.rs
//! One polling cycle: fetch → normalize → detect → process → advance cursor.
//!
//! The cursor is read from the store at the start of each cycle and only
//! written after the whole batch has been iterated. A crash in between means
//! the batch is detected and processed again next time (at-least-once).
//! If the write itself fails, the advanced cursor is kept as `pending`,
//! used for detection, and the write is retried at the start of the next
//! cycle.
//!
//! The cursor never moves backwards. A stale window whose newest item is older
//! than the cursor is processed once, then skipped while the cursor stays put.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::cursor::{Cursor, CursorStore};
use crate::delta::{self, newest_known, Delta};
use crate::error::{WatchError, WatchResult};
use crate::feed::{self, Item, RecencyRule, SnapshotFetcher};
use crate::pipeline::{ItemOutcome, ItemProcessor};
use crate::store::{ContentLog, ImpactLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Cursor was absent; seeded from the snapshot, nothing processed.
    Bootstrapped,
    /// At least one new item went through the pipeline.
    Processed,
    NoChange,
    /// Fetch or normalization failed; treated as zero items.
    FetchFailed,
    /// Cursor could not be read; nothing was done.
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub fetched: usize,
    /// Cursor id was not in the snapshot.
    pub gap: bool,
    pub cursor_before: Option<String>,
    pub cursor_after: Option<String>,
    /// The cursor write for this cycle completed durably.
    pub cursor_persisted: bool,
    pub error: Option<String>,
    pub items: Vec<ItemOutcome>,
}

impl CycleReport {
    fn begin(cursor_before: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            outcome: CycleOutcome::NoChange,
            fetched: 0,
            gap: false,
            cursor_after: cursor_before.clone(),
            cursor_before,
            cursor_persisted: false,
            error: None,
            items: Vec::new(),
        }
    }

    fn finish(mut self, outcome: CycleOutcome, err: Option<&WatchError>) -> Self {
        self.outcome = outcome;
        self.error = err.map(|e| e.to_string());
        self.finished_at = Utc::now();
        self
    }

    pub fn processed_ids(&self) -> Vec<&str> {
        self.items.iter().map(|o| o.item_id.as_str()).collect()
    }
}

/// Latest cycle report, shared with the debug surface.
pub type StatusHandle = Arc<RwLock<Option<CycleReport>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Seeded(Cursor),
    AlreadySeeded(Cursor),
    /// Nothing visible yet; the cursor stays absent.
    EmptySnapshot,
    /// Items were visible but none carried an id.
    NoKnownId,
}

/// Items already processed under a cursor that could not move past them
/// (a stale window). Kept so the same window is not processed again.
struct HeldBack {
    cursor_id: String,
    ids: HashSet<String>,
}

pub struct Watcher {
    fetcher: Arc<dyn SnapshotFetcher>,
    cursor_store: Arc<dyn CursorStore>,
    content_log: Arc<dyn ContentLog>,
    impact_log: Arc<dyn ImpactLog>,
    processor: ItemProcessor,
    bootstrap_seed_limit: usize,
    pending: Option<Cursor>,
    held_back: Option<HeldBack>,
    status: StatusHandle,
}

impl Watcher {
    pub fn new(
        fetcher: Arc<dyn SnapshotFetcher>,
        cursor_store: Arc<dyn CursorStore>,
        content_log: Arc<dyn ContentLog>,
        impact_log: Arc<dyn ImpactLog>,
        processor: ItemProcessor,
    ) -> Self {
        crate::metrics::ensure_metrics_described();
        Self {
            fetcher,
            cursor_store,
            content_log,
            impact_log,
            processor,
            bootstrap_seed_limit: 20,
            pending: None,
            held_back: None,
            status: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_bootstrap_seed_limit(mut self, limit: usize) -> Self {
        self.bootstrap_seed_limit = limit;
        self
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Advanced cursor whose write has not gone through yet.
    pub fn pending_cursor(&self) -> Option<&Cursor> {
        self.pending.as_ref()
    }

    /// First-run seeding from a fresh fetch. No-op if a cursor already exists.
    pub async fn bootstrap(&mut self) -> WatchResult<BootstrapOutcome> {
        if let Some(c) = self.current_cursor().await? {
            return Ok(BootstrapOutcome::AlreadySeeded(c));
        }
        let raw = self.fetcher.fetch_snapshot().await?;
        let items = feed::normalize_snapshot(&raw)?;
        self.seed_from(&items).await
    }

    /// Seed the cursor from a newest-first snapshot without processing it.
    async fn seed_from(&mut self, items: &[Item]) -> WatchResult<BootstrapOutcome> {
        if items.is_empty() {
            tracing::warn!(target: "watcher", "bootstrap: snapshot empty, cursor stays absent");
            return Ok(BootstrapOutcome::EmptySnapshot);
        }
        let Some(cursor) = items.iter().find_map(|it| Cursor::seed(it, Utc::now())) else {
            tracing::warn!(target: "watcher", visible = items.len(), "bootstrap: no item carries an id");
            return Ok(BootstrapOutcome::NoKnownId);
        };

        if let Err(e) = self.impact_log.ensure_initialized().await {
            tracing::warn!(target: "watcher", error = %e, "bootstrap: impact log init failed");
        }
        match self.content_log.is_empty().await {
            Ok(true) => {
                let baseline: Vec<&Item> = items.iter().take(self.bootstrap_seed_limit).collect();
                for it in baseline.iter().rev() {
                    if let Err(e) = self.content_log.append(it).await {
                        tracing::warn!(target: "watcher", error = %e, "bootstrap: content log seed failed");
                        break;
                    }
                }
                tracing::info!(target: "watcher", seeded = baseline.len(), "bootstrap: content log initialized with baseline");
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(target: "watcher", error = %e, "bootstrap: content log check failed"),
        }

        self.cursor_store.write(&cursor).await?;
        counter!("cursor_writes_total").increment(1);
        tracing::info!(
            target: "watcher",
            cursor = %cursor.last_seen_id,
            baseline = items.len(),
            "bootstrap: cursor seeded, baseline items not processed"
        );
        Ok(BootstrapOutcome::Seeded(cursor))
    }

    /// Cursor used for detection: a pending (unwritten) one wins over the store.
    async fn current_cursor(&mut self) -> WatchResult<Option<Cursor>> {
        if let Some(p) = self.pending.clone() {
            match self.cursor_store.write(&p).await {
                Ok(()) => {
                    counter!("cursor_writes_total").increment(1);
                    tracing::info!(target: "watcher", cursor = %p.last_seen_id, "pending cursor write succeeded");
                    self.pending = None;
                }
                Err(e) => {
                    counter!("persistence_failures_total", "what" => "cursor").increment(1);
                    tracing::warn!(target: "watcher", cursor = %p.last_seen_id, error = %e, "pending cursor write failed again");
                }
            }
            return Ok(Some(p));
        }
        self.cursor_store.read().await
    }

    /// Run one full cycle. Never fails; problems end up in the report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        counter!("poll_cycles_total").increment(1);
        let report = self.cycle().await;
        gauge!("poll_last_cycle_ts").set(report.finished_at.timestamp() as f64);
        if let Ok(mut slot) = self.status.write() {
            *slot = Some(report.clone());
        }
        report
    }

    async fn cycle(&mut self) -> CycleReport {
        let cursor = match self.current_cursor().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(target: "watcher", error = %e, "cursor unreadable; skipping cycle");
                return CycleReport::begin(None).finish(CycleOutcome::Aborted, Some(&e));
            }
        };
        let mut report = CycleReport::begin(cursor.as_ref().map(|c| c.last_seen_id.clone()));
        report.cursor_persisted = cursor.is_some() && self.pending.is_none();

        let (items, fetch_err) = feed::fetch_items(self.fetcher.as_ref()).await;
        if let Some(e) = fetch_err {
            tracing::warn!(target: "watcher", fetcher = self.fetcher.name(), kind = e.kind(), error = %e, "no items this cycle");
            return report.finish(CycleOutcome::FetchFailed, Some(&e));
        }
        report.fetched = items.len();
        let rule = RecencyRule::for_items(&items);

        let delta = delta::detect(&items, cursor.as_ref());
        let (cursor, delta) = match (cursor, delta) {
            (Some(c), d @ Delta::New { .. }) => (c, d),
            _ => return self.bootstrap_in_cycle(&items, report).await,
        };

        report.gap = delta.gap();
        let batch = self.skip_held_back(&cursor, delta.new_items());
        if batch.is_empty() {
            tracing::debug!(target: "watcher", cursor = %cursor.last_seen_id, "no new items since last check");
            return report.finish(CycleOutcome::NoChange, None);
        }
        tracing::info!(target: "watcher", new = batch.len(), gap = report.gap, "processing new items");
        report.items = self.processor.process_batch(&batch).await.outcomes;

        let Some(next) = newest_known(&batch).and_then(|target| cursor.advanced_to(target, Utc::now()))
        else {
            tracing::warn!(target: "watcher", "processed items carry no id; cursor not advanced");
            return report.finish(CycleOutcome::Processed, None);
        };
        if next.recency().cmp_by(rule, &cursor.recency()) == Ordering::Less {
            tracing::warn!(
                target: "watcher",
                current = %cursor.last_seen_id,
                candidate = %next.last_seen_id,
                "refusing to move cursor backwards"
            );
            self.hold_back(&cursor, &batch);
            return report.finish(CycleOutcome::Processed, None);
        }
        self.held_back = None;

        report.cursor_after = Some(next.last_seen_id.clone());
        match self.cursor_store.write(&next).await {
            Ok(()) => {
                counter!("cursor_writes_total").increment(1);
                self.pending = None;
                report.cursor_persisted = true;
                tracing::info!(target: "watcher", cursor = %next.last_seen_id, version = next.version, "cursor advanced");
                report.finish(CycleOutcome::Processed, None)
            }
            Err(e) => {
                counter!("persistence_failures_total", "what" => "cursor").increment(1);
                tracing::error!(target: "watcher", cursor = %next.last_seen_id, error = %e, "cursor write failed; advancement will be retried");
                report.cursor_persisted = false;
                self.pending = Some(next);
                report.finish(CycleOutcome::Processed, Some(&e))
            }
        }
    }

    /// Drop items already processed under this same cursor in a cycle that
    /// could not advance it.
    fn skip_held_back(&self, cursor: &Cursor, items: &[Item]) -> Vec<Item> {
        let held = self
            .held_back
            .as_ref()
            .filter(|h| h.cursor_id == cursor.last_seen_id);
        let batch: Vec<Item> = items
            .iter()
            .filter(|it| match (held, it.id.as_known()) {
                (Some(h), Some(id)) => !h.ids.contains(id),
                _ => true,
            })
            .cloned()
            .collect();
        if batch.len() < items.len() {
            tracing::debug!(target: "watcher", skipped = items.len() - batch.len(), "skipping items already processed under this cursor");
        }
        batch
    }

    fn hold_back(&mut self, cursor: &Cursor, batch: &[Item]) {
        let mut held = match self.held_back.take() {
            Some(h) if h.cursor_id == cursor.last_seen_id => h,
            _ => HeldBack {
                cursor_id: cursor.last_seen_id.clone(),
                ids: HashSet::new(),
            },
        };
        held.ids
            .extend(batch.iter().filter_map(|it| it.id.as_known().map(str::to_string)));
        self.held_back = Some(held);
    }

    async fn bootstrap_in_cycle(&mut self, items: &[Item], mut report: CycleReport) -> CycleReport {
        match self.seed_from(items).await {
            Ok(BootstrapOutcome::Seeded(c)) => {
                report.cursor_after = Some(c.last_seen_id);
                report.cursor_persisted = true;
                report.finish(CycleOutcome::Bootstrapped, None)
            }
            Ok(_) => report.finish(CycleOutcome::NoChange, None),
            Err(e) => {
                counter!("persistence_failures_total", "what" => "cursor").increment(1);
                tracing::warn!(target: "watcher", error = %e, "bootstrap cursor write failed; will retry next cycle");
                report.finish(CycleOutcome::NoChange, Some(&e))
            }
        }
    }
}
