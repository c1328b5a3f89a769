use anyhow::Context;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use shuttle_axum::axum::{routing::get, Router};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once, at startup.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Polling cycles started.");
        describe_counter!(
            "poll_ticks_dropped_total",
            "Timer ticks dropped because a cycle was still running."
        );
        describe_counter!("feed_fetch_errors_total", "Snapshot fetch failures.");
        describe_counter!("feed_malformed_total", "Snapshots that were not a JSON array.");
        describe_counter!("feed_items_seen_total", "Items in fetched snapshots.");
        describe_counter!("feed_items_new_total", "Items sent through the pipeline.");
        describe_counter!(
            "cursor_gap_total",
            "Cycles where the cursor id was missing from the snapshot."
        );
        describe_counter!("cursor_writes_total", "Successful cursor writes.");
        describe_counter!("scoring_failures_total", "Items that fell back to the default score.");
        describe_counter!("notify_failures_total", "Failed notification dispatches.");
        describe_counter!(
            "persistence_failures_total",
            "Failed writes, labelled by what (content, impact, cursor)."
        );
        describe_histogram!("feed_fetch_ms", "Snapshot fetch time in milliseconds.");
        describe_gauge!("poll_last_cycle_ts", "Unix ts when the last cycle finished.");
    });
}
