// src/cursor.rs
//! Durable "last seen" pointer.
//!
//! The cursor is a plain value passed into and out of the cycle; the store is
//! the only place it lives between cycles. File writes go to a sibling
//! `.tmp` file first and are renamed over the target, so a crash mid-write
//! leaves either the old cursor or the new one, never a torn mix.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{WatchError, WatchResult};
use crate::feed::{Item, Recency};
use crate::feed::types::parse_numeric_id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub last_seen_id: String,
    /// Timestamp of the item behind `last_seen_id`, kept so non-numeric ids
    /// can still be ordered against it.
    pub last_seen_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every successful write.
    pub version: u64,
}

impl Cursor {
    /// First cursor, pointing at `item`. `None` for items without a known id.
    pub fn seed(item: &Item, now: DateTime<Utc>) -> Option<Self> {
        Some(Self {
            last_seen_id: item.id.as_known()?.to_string(),
            last_seen_at: item.timestamp,
            updated_at: now,
            version: 1,
        })
    }

    /// Successor cursor pointing at `item`.
    pub fn advanced_to(&self, item: &Item, now: DateTime<Utc>) -> Option<Self> {
        Some(Self {
            last_seen_id: item.id.as_known()?.to_string(),
            last_seen_at: item.timestamp,
            updated_at: now,
            version: self.version.saturating_add(1),
        })
    }

    pub fn recency(&self) -> Recency {
        Recency {
            numeric_id: parse_numeric_id(&self.last_seen_id),
            at: self.last_seen_at,
        }
    }
}

#[async_trait]
pub trait CursorStore: Send + Sync {
    /// `Ok(None)` means nothing has ever been processed.
    async fn read(&self) -> WatchResult<Option<Cursor>>;
    /// Must not return `Ok` unless the write is durable.
    async fn write(&self, cursor: &Cursor) -> WatchResult<()>;
}

/// On-disk shape. Also accepts the older `{ "lastTruthId": .. }` layout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorFile {
    #[serde(alias = "lastTruthId")]
    last_seen_id: Option<String>,
    #[serde(default)]
    last_seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    version: u64,
}

pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn read(&self) -> WatchResult<Option<Cursor>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WatchError::persistence("cursor read", e)),
        };
        let file: CursorFile = serde_json::from_str(&raw).map_err(|e| {
            WatchError::persistence("cursor read", format!("{} is not a valid cursor: {e}", self.path.display()))
        })?;
        Ok(file
            .last_seen_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| Cursor {
                last_seen_id: id,
                last_seen_at: file.last_seen_at,
                updated_at: file.updated_at.unwrap_or_else(Utc::now),
                version: file.version,
            }))
    }

    async fn write(&self, cursor: &Cursor) -> WatchResult<()> {
        let bytes = serde_json::to_vec_pretty(cursor)?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|e| WatchError::persistence("cursor write", e))
    }
}

/// Write `bytes` to `<path>.tmp`, sync, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut f = tokio::fs::File::create(&tmp).await?;
    f.write_all(bytes).await?;
    f.sync_all().await?;
    drop(f);
    tokio::fs::rename(&tmp, path).await
}

/// In-memory store for tests and dry runs. Writes can be made to fail.
#[derive(Default)]
pub struct MemoryCursorStore {
    inner: Mutex<Option<Cursor>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(id: &str) -> Self {
        let store = Self::new();
        *store.inner.lock().expect("cursor mutex poisoned") = Some(Cursor {
            last_seen_id: id.to_string(),
            last_seen_at: None,
            updated_at: Utc::now(),
            version: 1,
        });
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Cursor> {
        self.inner.lock().expect("cursor mutex poisoned").clone()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn read(&self) -> WatchResult<Option<Cursor>> {
        Ok(self.current())
    }

    async fn write(&self, cursor: &Cursor) -> WatchResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WatchError::persistence("cursor write", "simulated failure"));
        }
        *self.inner.lock().expect("cursor mutex poisoned") = Some(cursor.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
