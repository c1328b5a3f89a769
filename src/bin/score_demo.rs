//! Scores a sample post (or the text given as arguments) with the configured scorer.

use feed_impact_watcher::config::WatcherConfig;
use feed_impact_watcher::score::{build_scorer, DEFAULT_SCORE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = WatcherConfig::load_default()?;
    let scorer = build_scorer(&cfg.scoring)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let text = if args.is_empty() {
        "Effective immediately, 50% tariffs on all imported steel.".to_string()
    } else {
        args.join(" ")
    };

    match scorer.score(&text).await {
        Ok(s) => println!("{} rated {s}★", scorer.name()),
        Err(e) => println!("{} failed ({e}); default {DEFAULT_SCORE}★", scorer.name()),
    }
    Ok(())
}
