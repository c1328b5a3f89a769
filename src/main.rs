//! feed-impact-watcher binary entrypoint.
//! Loads config, seeds the cursor, starts the poll scheduler and serves the
//! debug/status router.

use feed_impact_watcher::config::WatcherConfig;
use feed_impact_watcher::metrics::Metrics;
use feed_impact_watcher::runtime::WatcherRuntime;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines when LOG_FORMAT=json.
/// RUST_LOG overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_impact_watcher=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    // The hosting runtime may already have installed a subscriber.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn main() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = WatcherConfig::load_default()?;
    let metrics = Metrics::init()?;
    let runtime = WatcherRuntime::from_config(cfg)?;

    runtime.bootstrap().await;
    runtime.start();

    let router = runtime.router().merge(metrics.router());
    Ok(router.into())
}
