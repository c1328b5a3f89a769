// src/store/content_log.rs
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::ContentLog;
use crate::error::{WatchError, WatchResult};
use crate::feed::Item;

/// Plain-text log, one `---` separated block per item.
pub struct FileContentLog {
    path: PathBuf,
}

impl FileContentLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn format_entry(item: &Item) -> String {
    format!("---\n{}\n", item.content)
}

#[async_trait]
impl ContentLog for FileContentLog {
    async fn append(&self, item: &Item) -> WatchResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| WatchError::persistence("content log", e))?;
        }
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| WatchError::persistence("content log", e))?;
        f.write_all(format_entry(item).as_bytes())
            .await
            .map_err(|e| WatchError::persistence("content log", e))?;
        f.flush()
            .await
            .map_err(|e| WatchError::persistence("content log", e))
    }

    async fn is_empty(&self) -> WatchResult<bool> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(s.trim().is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(WatchError::persistence("content log", e)),
        }
    }
}

#[derive(Default)]
pub struct MemoryContentLog {
    entries: Mutex<Vec<String>>,
}

impl MemoryContentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().expect("content log mutex poisoned").clone()
    }
}

#[async_trait]
impl ContentLog for MemoryContentLog {
    async fn append(&self, item: &Item) -> WatchResult<()> {
        self.entries
            .lock()
            .expect("content log mutex poisoned")
            .push(item.content.clone());
        Ok(())
    }

    async fn is_empty(&self) -> WatchResult<bool> {
        Ok(self.entries.lock().expect("content log mutex poisoned").is_empty())
    }
}
