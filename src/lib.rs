// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod config;
pub mod cursor;
pub mod delta;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod pipeline;
pub mod runtime;
pub mod scheduler;
pub mod score;
pub mod store;
pub mod watcher;

// Notifications (email / Slack / Discord)
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::error::{WatchError, WatchResult};
pub use crate::feed::{Item, ItemId, SnapshotFetcher};
pub use crate::notify::{NotificationEvent, Notifier, NotifierMux};
pub use crate::watcher::{BootstrapOutcome, CycleOutcome, CycleReport, Watcher};
