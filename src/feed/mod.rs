// src/feed/mod.rs
pub mod normalize;
pub mod providers;
pub mod types;

pub use normalize::{clean_content, normalize_snapshot};
pub use types::{Item, ItemId, Recency, RecencyRule, SnapshotFetcher};

use metrics::{counter, histogram};

/// Fetch + normalize, with every failure folded into "zero items".
///
/// Used by the polling cycle; the error is returned alongside so the caller
/// can log it with its own context.
pub async fn fetch_items(fetcher: &dyn SnapshotFetcher) -> (Vec<Item>, Option<crate::WatchError>) {
    let t0 = std::time::Instant::now();
    let raw = match fetcher.fetch_snapshot().await {
        Ok(raw) => raw,
        Err(e) => {
            counter!("feed_fetch_errors_total").increment(1);
            return (Vec::new(), Some(e));
        }
    };
    histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    match normalize_snapshot(&raw) {
        Ok(items) => {
            counter!("feed_items_seen_total").increment(items.len() as u64);
            (items, None)
        }
        Err(e) => {
            counter!("feed_malformed_total").increment(1);
            (Vec::new(), Some(e))
        }
    }
}

/// Read-only "top N" view for the debug surface. Never touches the cursor.
pub async fn latest(fetcher: &dyn SnapshotFetcher, limit: usize) -> crate::WatchResult<Vec<Item>> {
    let raw = fetcher.fetch_snapshot().await?;
    let mut items = normalize_snapshot(&raw)?;
    items.truncate(limit);
    Ok(items)
}
