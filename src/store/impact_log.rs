// src/store/impact_log.rs
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ImpactLog, ImpactRecord};
use crate::cursor::write_atomic;
use crate::error::{WatchError, WatchResult};

/// JSON array file of [`ImpactRecord`]s, rewritten atomically on each append.
pub struct FileImpactLog {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileImpactLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// `Ok(None)` when the file is missing.
    async fn load(&self) -> WatchResult<Option<Vec<ImpactRecord>>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s).map(Some).map_err(|e| {
                WatchError::persistence("impact log", format!("{} is not a record array: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WatchError::persistence("impact log", e)),
        }
    }

    async fn store(&self, records: &[ImpactRecord]) -> WatchResult<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|e| WatchError::persistence("impact log", e))
    }

    pub async fn records(&self) -> WatchResult<Vec<ImpactRecord>> {
        Ok(self.load().await?.unwrap_or_default())
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", chrono::Utc::now().timestamp()));
    PathBuf::from(name)
}

#[async_trait]
impl ImpactLog for FileImpactLog {
    async fn append(&self, record: &ImpactRecord) -> WatchResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?.unwrap_or_default();
        records.push(record.clone());
        self.store(&records).await
    }

    async fn ensure_initialized(&self) -> WatchResult<()> {
        let _guard = self.lock.lock().await;
        match self.load().await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => self.store(&[]).await,
            Err(WatchError::Persistence { reason, .. }) if self.path.exists() => {
                let aside = corrupt_path(&self.path);
                tracing::warn!(
                    target: "store",
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    %reason,
                    "impact log unreadable; starting a fresh one"
                );
                tokio::fs::rename(&self.path, &aside)
                    .await
                    .map_err(|e| WatchError::persistence("impact log", e))?;
                self.store(&[]).await
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
pub struct MemoryImpactLog {
    records: Mutex<Vec<ImpactRecord>>,
    fail_appends: AtomicBool,
}

impl MemoryImpactLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<ImpactRecord> {
        self.records.lock().expect("impact log mutex poisoned").clone()
    }
}

#[async_trait]
impl ImpactLog for MemoryImpactLog {
    async fn append(&self, record: &ImpactRecord) -> WatchResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(WatchError::persistence("impact log", "simulated failure"));
        }
        self.records
            .lock()
            .expect("impact log mutex poisoned")
            .push(record.clone());
        Ok(())
    }

    async fn ensure_initialized(&self) -> WatchResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rec(id: &str, score: u8) -> ImpactRecord {
        ImpactRecord {
            item_id: id.into(),
            score,
            evaluated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_keep_history_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileImpactLog::new(dir.path().join("ratings.json"));
        log.ensure_initialized().await.unwrap();
        log.append(&rec("1", 3)).await.unwrap();
        log.append(&rec("2", 5)).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("ratings.json")).unwrap()).unwrap();
        assert_eq!(raw[0]["id"], "1");
        assert_eq!(raw[1]["rating"], 5);
        assert!(raw[1]["evaluatedAt"].is_string());
    }

    #[tokio::test]
    async fn garbage_file_is_moved_aside_on_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.json");
        std::fs::write(&path, "{not json").unwrap();
        let log = FileImpactLog::new(&path);

        assert!(log.append(&rec("1", 2)).await.is_err());
        log.ensure_initialized().await.unwrap();
        assert_eq!(log.records().await.unwrap(), vec![]);

        let moved = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .any(|e| e.file_name().to_string_lossy().contains(".corrupt-"));
        assert!(moved);
    }
}
