// src/runtime.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shuttle_axum::axum::Router;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::config::WatcherConfig;
use crate::cursor::{CursorStore, FileCursorStore};
use crate::feed::providers::StatusFeedProvider;
use crate::feed::SnapshotFetcher;
use crate::notify::NotifierMux;
use crate::pipeline::ItemProcessor;
use crate::scheduler::PollScheduler;
use crate::score::build_scorer;
use crate::store::{FileContentLog, FileImpactLog};
use crate::watcher::{BootstrapOutcome, StatusHandle, Watcher};

/// Everything the service needs, wired from config. Construction failures
/// here are the only fatal errors.
pub struct WatcherRuntime {
    pub cfg: WatcherConfig,
    pub fetcher: Arc<dyn SnapshotFetcher>,
    pub cursor_store: Arc<dyn CursorStore>,
    pub watcher: Arc<Mutex<Watcher>>,
    pub scheduler: Arc<PollScheduler>,
    pub status: StatusHandle,
}

impl WatcherRuntime {
    pub fn from_config(cfg: WatcherConfig) -> anyhow::Result<Self> {
        let fetcher: Arc<dyn SnapshotFetcher> =
            Arc::new(StatusFeedProvider::from_config(&cfg.feed).context("building feed fetcher")?);
        let cursor_store: Arc<dyn CursorStore> =
            Arc::new(FileCursorStore::new(&cfg.storage.cursor_path));
        let content_log = Arc::new(FileContentLog::new(&cfg.storage.content_log_path));
        let impact_log = Arc::new(FileImpactLog::new(&cfg.storage.impact_log_path));
        let scorer = build_scorer(&cfg.scoring).context("building scorer")?;
        let notifier = Arc::new(NotifierMux::from_env(&cfg.notify).context("building notifiers")?);

        info!(
            fetcher = fetcher.name(),
            scorer = scorer.name(),
            interval_secs = cfg.poll_interval_secs,
            cursor_path = %cfg.storage.cursor_path.display(),
            "watcher runtime configured"
        );

        let processor = ItemProcessor::new(
            content_log.clone(),
            impact_log.clone(),
            scorer,
            notifier,
            cfg.notify.clone(),
        );
        let watcher = Watcher::new(
            fetcher.clone(),
            cursor_store.clone(),
            content_log,
            impact_log,
            processor,
        )
        .with_bootstrap_seed_limit(cfg.bootstrap_seed_limit);
        let status = watcher.status_handle();
        let watcher = Arc::new(Mutex::new(watcher));
        let scheduler = Arc::new(PollScheduler::new(
            watcher.clone(),
            Duration::from_secs(cfg.poll_interval_secs),
        ));

        Ok(Self {
            cfg,
            fetcher,
            cursor_store,
            watcher,
            scheduler,
            status,
        })
    }

    /// Seed the cursor on first run. A failure here is not fatal: the first
    /// cycle that finds the cursor absent seeds it instead.
    pub async fn bootstrap(&self) {
        match self.watcher.lock().await.bootstrap().await {
            Ok(BootstrapOutcome::Seeded(c)) => info!(cursor = %c.last_seen_id, "initialized cursor"),
            Ok(BootstrapOutcome::AlreadySeeded(c)) => info!(cursor = %c.last_seen_id, "resuming from stored cursor"),
            Ok(other) => warn!(outcome = ?other, "cursor not seeded yet"),
            Err(e) => warn!(error = %e, "startup bootstrap failed; will retry on the first cycle"),
        }
    }

    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.scheduler.clone().spawn()
    }

    pub fn router(&self) -> Router {
        api::create_router(AppState {
            fetcher: self.fetcher.clone(),
            cursor_store: self.cursor_store.clone(),
            status: self.status.clone(),
            scheduler: Some(self.scheduler.clone()),
        })
    }
}
