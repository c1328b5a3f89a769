// src/store/mod.rs
//! Append-only outputs of the pipeline: the raw content log and the impact
//! rating log. Neither deduplicates; re-processing an item after a crash
//! appends it again.

pub mod content_log;
pub mod impact_log;

pub use content_log::{FileContentLog, MemoryContentLog};
pub use impact_log::{FileImpactLog, MemoryImpactLog};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WatchResult;
use crate::feed::Item;

/// One rating per processed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactRecord {
    #[serde(rename = "id")]
    pub item_id: String,
    #[serde(rename = "rating")]
    pub score: u8,
    #[serde(rename = "evaluatedAt")]
    pub evaluated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ContentLog: Send + Sync {
    async fn append(&self, item: &Item) -> WatchResult<()>;
    /// True when nothing has been written yet (missing or blank).
    async fn is_empty(&self) -> WatchResult<bool>;
}

#[async_trait]
pub trait ImpactLog: Send + Sync {
    async fn append(&self, record: &ImpactRecord) -> WatchResult<()>;
    /// Make sure the log exists and is readable, creating an empty one if not.
    async fn ensure_initialized(&self) -> WatchResult<()>;
}
