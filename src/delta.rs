// src/delta.rs
//! Which items in a newest-first snapshot are new relative to the cursor.

use std::collections::HashSet;

use metrics::counter;

use crate::cursor::Cursor;
use crate::feed::Item;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// No cursor yet. `seed` is the newest visible item, if any.
    BootstrapRequired { seed: Option<Item> },
    /// New items, oldest first. `gap` is set when the cursor id was not in
    /// the snapshot (the feed moved further than one window since last poll).
    New { items: Vec<Item>, gap: bool },
}

impl Delta {
    pub fn new_items(&self) -> &[Item] {
        match self {
            Delta::New { items, .. } => items,
            Delta::BootstrapRequired { .. } => &[],
        }
    }

    pub fn gap(&self) -> bool {
        matches!(self, Delta::New { gap: true, .. })
    }

    /// Newest item with a known id; the cursor moves here after the batch.
    pub fn advance_target(&self) -> Option<&Item> {
        newest_known(self.new_items())
    }
}

/// Last item with a known id in an oldest-first batch.
pub fn newest_known(items: &[Item]) -> Option<&Item> {
    items.iter().rev().find(|it| it.id.as_known().is_some())
}

/// Compute the delta for `snapshot` (newest-first) against `cursor`.
///
/// Scans until the cursor id shows up. If it never does, the whole snapshot
/// counts as new and the delta is flagged as a gap. Duplicate ids keep their
/// first occurrence.
pub fn detect(snapshot: &[Item], cursor: Option<&Cursor>) -> Delta {
    let Some(cursor) = cursor else {
        return Delta::BootstrapRequired {
            seed: snapshot.first().cloned(),
        };
    };

    let found_at = snapshot
        .iter()
        .position(|it| it.id.matches(&cursor.last_seen_id));
    let gap = found_at.is_none() && !snapshot.is_empty();
    let window = &snapshot[..found_at.unwrap_or(snapshot.len())];

    let mut seen: HashSet<&str> = HashSet::new();
    let mut items: Vec<Item> = window
        .iter()
        .filter(|it| match it.id.as_known() {
            Some(id) => seen.insert(id),
            None => true,
        })
        .cloned()
        .collect();
    items.reverse();

    if gap {
        counter!("cursor_gap_total").increment(1);
        tracing::warn!(
            target: "delta",
            cursor = %cursor.last_seen_id,
            snapshot_len = snapshot.len(),
            treated_as_new = items.len(),
            "CursorGapDetected: cursor id not in snapshot, treating the window as new"
        );
    }

    Delta::New { items, gap }
}
