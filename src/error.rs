// src/error.rs
use thiserror::Error;

/// Failures surfaced by the collaborators a polling cycle talks to.
///
/// None of these escape a cycle: the watcher maps each one to its policy
/// (zero items, default score, skipped advancement, or just a log line).
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("feed fetch failed: {0}")]
    Fetch(String),
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
    #[error("scoring failed: {0}")]
    Scoring(String),
    #[error("persistence failed ({what}): {reason}")]
    Persistence { what: &'static str, reason: String },
    #[error("notification failed: {0}")]
    Notification(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl WatchError {
    pub fn persistence(what: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Persistence {
            what,
            reason: reason.to_string(),
        }
    }

    /// Short label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::MalformedSnapshot(_) => "malformed_snapshot",
            Self::Scoring(_) => "scoring",
            Self::Persistence { .. } => "persistence",
            Self::Notification(_) => "notification",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

pub type WatchResult<T> = std::result::Result<T, WatchError>;
