// src/feed/types.rs
use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::WatchResult;

/// Identifier of a feed item.
///
/// `Unknown` marks an item whose upstream id was missing. The ordinal is the
/// item's position in the raw snapshot, so two unknown ids from the same
/// snapshot never collapse into one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    Known(String),
    Unknown(usize),
}

impl ItemId {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            Self::Known(s) => Some(s.as_str()),
            Self::Unknown(_) => None,
        }
    }

    /// Numeric value when the id is a plain digit string.
    pub fn numeric(&self) -> Option<u128> {
        self.as_known().and_then(parse_numeric_id)
    }

    /// True when this is a known id equal to `raw`.
    pub fn matches(&self, raw: &str) -> bool {
        self.as_known() == Some(raw)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(s) => f.write_str(s),
            Self::Unknown(n) => write!(f, "<unknown#{n}>"),
        }
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(v) => s.serialize_str(v),
            Self::Unknown(_) => s.serialize_none(),
        }
    }
}

pub fn parse_numeric_id(raw: &str) -> Option<u128> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// One normalized feed entry. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub timestamp: Option<DateTime<Utc>>,
    pub content: String,
}

impl Item {
    pub fn recency(&self) -> Recency {
        Recency {
            numeric_id: self.id.numeric(),
            at: self.timestamp,
        }
    }
}

/// The two facts the "which one is newer" rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Recency {
    pub numeric_id: Option<u128>,
    pub at: Option<DateTime<Utc>>,
}

impl Recency {
    /// Total order under `rule`. Missing values sort as oldest.
    pub fn cmp_by(&self, rule: RecencyRule, other: &Recency) -> Ordering {
        match rule {
            RecencyRule::ById => (self.numeric_id, self.at).cmp(&(other.numeric_id, other.at)),
            RecencyRule::ByTime => (self.at, self.numeric_id).cmp(&(other.at, other.numeric_id)),
        }
    }
}

/// How one snapshot is ordered. Chosen once per snapshot and reused for the
/// sort, the advance target and the cursor guard, so all three agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyRule {
    /// Every id is numeric: ids decide, timestamps break ties.
    ById,
    /// Timestamps decide, numeric ids break ties.
    ByTime,
}

impl RecencyRule {
    pub fn for_items(items: &[Item]) -> Self {
        if items.iter().all(|it| it.id.numeric().is_some()) {
            Self::ById
        } else {
            Self::ByTime
        }
    }
}

/// Fetch capability. Returns the raw provider payload; shape checks happen in
/// [`crate::feed::normalize`].
#[async_trait::async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_snapshot(&self) -> WatchResult<serde_json::Value>;
    fn name(&self) -> &'static str;
}
