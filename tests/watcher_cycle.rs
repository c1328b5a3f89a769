// tests/watcher_cycle.rs
//
// End-to-end polling cycles against in-memory stores.
//
// Covered:
// - new items are processed oldest first and the cursor lands on the newest
// - first run seeds the cursor without processing or notifying
// - bootstrap is idempotent
// - scorer failures fall back to the default rating, alerts still go out
// - the cursor never moves backwards across cycles
// - gaps (cursor id gone from the window) take the whole window
// - mixed numeric and text ids advance the cursor exactly once
// - a failed cursor write blocks durable advancement but not correctness
// - fetch failures and malformed snapshots are zero-item cycles

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{snapshot, Harness};
use feed_impact_watcher::cursor::MemoryCursorStore;
use feed_impact_watcher::score::{DisabledScorer, DEFAULT_SCORE};
use feed_impact_watcher::{BootstrapOutcome, CycleOutcome};

#[tokio::test]
async fn processes_new_items_oldest_first_and_advances_cursor() {
    let mut h = Harness::new(snapshot(&[103, 102, 101, 100, 99]), MemoryCursorStore::with_cursor("100"));

    let report = h.watcher.run_cycle().await;
    assert_eq!(report.outcome, CycleOutcome::Processed);
    assert_eq!(report.processed_ids(), vec!["101", "102", "103"]);
    assert!(!report.gap);
    assert!(report.cursor_persisted);
    assert_eq!(h.cursor_id().as_deref(), Some("103"));
    assert_eq!(h.notified_ids(), vec!["101", "102", "103"]);
    assert_eq!(h.content.entries(), vec!["post 101", "post 102", "post 103"]);
    assert!(h.impact.records().iter().all(|r| r.score == 4));

    // Same snapshot again: nothing new.
    let again = h.watcher.run_cycle().await;
    assert_eq!(again.outcome, CycleOutcome::NoChange);
    assert!(again.items.is_empty());
    assert_eq!(h.notifier.events().len(), 3);
}

#[tokio::test]
async fn first_cycle_without_cursor_only_seeds() {
    let mut h = Harness::new(snapshot(&[105, 104, 103, 102, 101]), MemoryCursorStore::new());

    let report = h.watcher.run_cycle().await;
    assert_eq!(report.outcome, CycleOutcome::Bootstrapped);
    assert_eq!(report.cursor_after.as_deref(), Some("105"));
    assert_eq!(h.cursor_id().as_deref(), Some("105"));
    assert!(h.notifier.events().is_empty(), "baseline must not alert");
    assert!(h.impact.records().is_empty(), "baseline must not be scored");
    // Baseline goes to the content log in chronological order.
    assert_eq!(
        h.content.entries(),
        vec!["post 101", "post 102", "post 103", "post 104", "post 105"]
    );

    h.fetcher.set(snapshot(&[106, 105, 104]));
    let next = h.watcher.run_cycle().await;
    assert_eq!(next.processed_ids(), vec!["106"]);
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let mut h = Harness::new(snapshot(&[12, 11, 10]), MemoryCursorStore::new());

    let first = h.watcher.bootstrap().await.expect("bootstrap");
    let seeded = match first {
        BootstrapOutcome::Seeded(c) => c,
        other => panic!("expected Seeded, got {other:?}"),
    };
    assert_eq!(seeded.last_seen_id, "12");

    h.fetcher.set(snapshot(&[14, 13, 12]));
    let second = h.watcher.bootstrap().await.expect("bootstrap again");
    assert_eq!(second, BootstrapOutcome::AlreadySeeded(seeded));
    assert_eq!(h.cursor.writes(), 1);
    assert!(h.notifier.events().is_empty());
}

#[tokio::test]
async fn bootstrap_on_empty_snapshot_leaves_cursor_absent() {
    let mut h = Harness::new(json!([]), MemoryCursorStore::new());
    let out = h.watcher.bootstrap().await.expect("bootstrap");
    assert_eq!(out, BootstrapOutcome::EmptySnapshot);
    assert!(h.cursor.current().is_none());
}

#[tokio::test]
async fn failing_scorer_records_default_and_still_notifies() {
    let mut h = Harness::with_scorer(
        snapshot(&[3, 2, 1]),
        MemoryCursorStore::with_cursor("1"),
        Arc::new(DisabledScorer),
    );

    let report = h.watcher.run_cycle().await;
    assert_eq!(report.processed_ids(), vec!["2", "3"]);
    assert!(report.items.iter().all(|o| o.score_defaulted && o.score == DEFAULT_SCORE));

    let records = h.impact.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.score == DEFAULT_SCORE));
    let events = h.notifier.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.score == DEFAULT_SCORE));
    assert_eq!(h.cursor_id().as_deref(), Some("3"));
}

#[tokio::test]
async fn cursor_is_monotonic_even_when_a_stale_snapshot_comes_back() {
    let mut h = Harness::new(snapshot(&[101, 100]), MemoryCursorStore::with_cursor("100"));

    h.watcher.run_cycle().await;
    assert_eq!(h.cursor_id().as_deref(), Some("101"));

    h.fetcher.set(snapshot(&[103, 102, 101]));
    h.watcher.run_cycle().await;
    assert_eq!(h.cursor_id().as_deref(), Some("103"));
    let writes = h.cursor.writes();

    // A lagging replica serves an older window without the cursor in it:
    // the whole window is new, but the cursor write must not go backwards.
    h.fetcher.set(snapshot(&[102, 101]));
    let stale = h.watcher.run_cycle().await;
    assert!(stale.gap);
    assert_eq!(stale.processed_ids(), vec!["101", "102"]);
    assert_eq!(stale.cursor_after.as_deref(), Some("103"));
    assert_eq!(h.cursor_id().as_deref(), Some("103"));
    assert_eq!(h.cursor.writes(), writes, "no cursor write for a stale window");

    // Same stale window again: not processed a second time.
    let again = h.watcher.run_cycle().await;
    assert_eq!(again.outcome, CycleOutcome::NoChange);
    assert_eq!(h.cursor_id().as_deref(), Some("103"));
    assert_eq!(h.notified_ids(), vec!["101", "102", "103", "101", "102"]);

    // The feed catches up and moves on normally.
    h.fetcher.set(snapshot(&[104, 103, 102]));
    let next = h.watcher.run_cycle().await;
    assert_eq!(next.processed_ids(), vec!["104"]);
    assert_eq!(h.cursor_id().as_deref(), Some("104"));
}

#[tokio::test]
async fn gap_processes_whole_window_once() {
    let mut h = Harness::new(snapshot(&[103, 102, 101, 100, 99]), MemoryCursorStore::with_cursor("50"));

    let report = h.watcher.run_cycle().await;
    assert!(report.gap);
    assert_eq!(report.processed_ids(), vec!["99", "100", "101", "102", "103"]);
    assert_eq!(h.cursor_id().as_deref(), Some("103"));

    let again = h.watcher.run_cycle().await;
    assert!(!again.gap);
    assert!(again.items.is_empty());
}

#[tokio::test]
async fn deleted_cursor_post_takes_whole_window() {
    // Post 101 was deleted after we saw it.
    let mut h = Harness::new(snapshot(&[103, 102, 100]), MemoryCursorStore::with_cursor("101"));

    let report = h.watcher.run_cycle().await;
    assert!(report.gap);
    assert_eq!(report.processed_ids(), vec!["100", "102", "103"]);
    assert_eq!(h.cursor_id().as_deref(), Some("103"));

    let again = h.watcher.run_cycle().await;
    assert_eq!(again.outcome, CycleOutcome::NoChange);
    assert_eq!(h.notifier.events().len(), 3);
}

#[tokio::test]
async fn mixed_numeric_and_text_ids_advance_once() {
    let mut h = Harness::new(
        json!([
            { "id": "5", "created_at": "2025-04-01T13:00:00Z", "content": "five" },
            { "id": "abc", "created_at": "2025-04-01T12:00:00Z", "content": "abc" },
            { "id": "7", "created_at": "2025-04-01T11:00:00Z", "content": "seven" }
        ]),
        MemoryCursorStore::with_cursor("7"),
    );

    let first = h.watcher.run_cycle().await;
    assert_eq!(first.outcome, CycleOutcome::Processed);
    assert_eq!(first.processed_ids(), vec!["abc", "5"]);
    assert!(first.cursor_persisted);
    assert_eq!(h.cursor_id().as_deref(), Some("5"));

    let second = h.watcher.run_cycle().await;
    assert_eq!(second.outcome, CycleOutcome::NoChange);
    assert_eq!(h.notified_ids(), vec!["abc", "5"]);
    assert_eq!(h.content.entries(), vec!["abc", "five"]);
}

#[tokio::test]
async fn failed_cursor_write_is_retried_without_reprocessing() {
    let mut h = Harness::new(snapshot(&[103, 102, 101, 100]), MemoryCursorStore::with_cursor("100"));
    h.cursor.set_fail_writes(true);

    let first = h.watcher.run_cycle().await;
    assert_eq!(first.outcome, CycleOutcome::Processed);
    assert!(!first.cursor_persisted);
    assert!(first.error.is_some());
    assert_eq!(h.cursor_id().as_deref(), Some("100"), "store must not advance");
    assert_eq!(
        h.watcher.pending_cursor().map(|c| c.last_seen_id.as_str()),
        Some("103")
    );

    // Still failing: the pending cursor keeps the batch from coming back.
    let second = h.watcher.run_cycle().await;
    assert_eq!(second.outcome, CycleOutcome::NoChange);
    assert!(!second.cursor_persisted);
    assert_eq!(h.notifier.events().len(), 3);

    h.cursor.set_fail_writes(false);
    let third = h.watcher.run_cycle().await;
    assert!(third.cursor_persisted);
    assert_eq!(h.cursor_id().as_deref(), Some("103"));
    assert!(h.watcher.pending_cursor().is_none());
    assert_eq!(h.notifier.events().len(), 3);
}

#[tokio::test]
async fn fetch_failure_is_a_zero_item_cycle() {
    let mut h = Harness::new(snapshot(&[5, 4]), MemoryCursorStore::with_cursor("3"));
    h.fetcher.set_failing(true);

    let report = h.watcher.run_cycle().await;
    assert_eq!(report.outcome, CycleOutcome::FetchFailed);
    assert!(report.items.is_empty());
    assert_eq!(h.cursor_id().as_deref(), Some("3"));
    assert!(h.notifier.events().is_empty());

    // Recovery picks everything up on the next cycle.
    h.fetcher.set_failing(false);
    let next = h.watcher.run_cycle().await;
    assert_eq!(next.processed_ids(), vec!["4", "5"]);
}

#[tokio::test]
async fn malformed_snapshot_is_a_zero_item_cycle() {
    let mut h = Harness::new(json!({ "error": "rate limited" }), MemoryCursorStore::with_cursor("3"));

    let report = h.watcher.run_cycle().await;
    assert_eq!(report.outcome, CycleOutcome::FetchFailed);
    assert!(report.error.unwrap_or_default().contains("malformed"));
    assert_eq!(h.cursor_id().as_deref(), Some("3"));
}

#[tokio::test]
async fn status_handle_sees_last_report() {
    let mut h = Harness::new(snapshot(&[2, 1]), MemoryCursorStore::with_cursor("1"));
    let status = h.watcher.status_handle();
    assert!(status.read().unwrap().is_none());

    h.watcher.run_cycle().await;
    let last = status.read().unwrap().clone().expect("report stored");
    assert_eq!(last.outcome, CycleOutcome::Processed);
    assert_eq!(last.cursor_after.as_deref(), Some("2"));
}
