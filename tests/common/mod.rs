// tests/common/mod.rs
//! Shared fixtures for the integration tests: a scriptable fetcher and a
//! watcher wired to in-memory stores.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use feed_impact_watcher::config::NotifyConfig;
use feed_impact_watcher::cursor::MemoryCursorStore;
use feed_impact_watcher::notify::RecordingNotifier;
use feed_impact_watcher::pipeline::ItemProcessor;
use feed_impact_watcher::score::{DynScorer, FixedScorer};
use feed_impact_watcher::store::{MemoryContentLog, MemoryImpactLog};
use feed_impact_watcher::{SnapshotFetcher, WatchError, WatchResult, Watcher};

/// Returns whatever snapshot was last set, or fails when told to.
#[derive(Default)]
pub struct ScriptedFetcher {
    snapshot: Mutex<Value>,
    fail: Mutex<bool>,
}

impl ScriptedFetcher {
    pub fn new(snapshot: Value) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            fail: Mutex::new(false),
        }
    }

    pub fn set(&self, snapshot: Value) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch_snapshot(&self) -> WatchResult<Value> {
        if *self.fail.lock().unwrap() {
            return Err(WatchError::Fetch("simulated outage".into()));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Provider-shaped status for `id`, one minute apart per id step.
pub fn status(id: u64) -> Value {
    json!({
        "id": id.to_string(),
        "created_at": format!("2025-04-01T12:{:02}:00Z", id % 60),
        "content": format!("<p>post {id}</p>"),
    })
}

/// Snapshot in the order the provider returns it (newest first).
pub fn snapshot(ids: &[u64]) -> Value {
    Value::Array(ids.iter().map(|&id| status(id)).collect())
}

pub struct Harness {
    pub fetcher: Arc<ScriptedFetcher>,
    pub cursor: Arc<MemoryCursorStore>,
    pub content: Arc<MemoryContentLog>,
    pub impact: Arc<MemoryImpactLog>,
    pub notifier: Arc<RecordingNotifier>,
    pub watcher: Watcher,
}

impl Harness {
    pub fn new(snap: Value, cursor: MemoryCursorStore) -> Self {
        Self::with_scorer(snap, cursor, Arc::new(FixedScorer::new(4)))
    }

    pub fn with_scorer(snap: Value, cursor: MemoryCursorStore, scorer: DynScorer) -> Self {
        let fetcher = Arc::new(ScriptedFetcher::new(snap));
        let cursor = Arc::new(cursor);
        let content = Arc::new(MemoryContentLog::new());
        let impact = Arc::new(MemoryImpactLog::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = ItemProcessor::new(
            content.clone(),
            impact.clone(),
            scorer,
            notifier.clone(),
            NotifyConfig::default(),
        );
        let watcher = Watcher::new(
            fetcher.clone(),
            cursor.clone(),
            content.clone(),
            impact.clone(),
            processor,
        );
        Self {
            fetcher,
            cursor,
            content,
            impact,
            notifier,
            watcher,
        }
    }

    pub fn cursor_id(&self) -> Option<String> {
        self.cursor.current().map(|c| c.last_seen_id)
    }

    pub fn notified_ids(&self) -> Vec<String> {
        self.notifier
            .events()
            .into_iter()
            .map(|e| e.item_id)
            .collect()
    }
}
