//! Demo that pushes a couple of sample alerts through the multiplexer
//! (log only when no channel is configured).

use feed_impact_watcher::config::WatcherConfig;
use feed_impact_watcher::{NotificationEvent, Notifier, NotifierMux};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = WatcherConfig::load_default()?;
    let mux = NotifierMux::from_env(&cfg.notify)?;
    println!("channels: {:?}", mux.channel_names());

    let samples = [
        ("demo-1", "Sample post: markets are doing great today.", 2u8),
        ("demo-2", "Sample post: 50% tariffs on all imported steel, effective Monday.", 5u8),
    ];
    for (id, content, score) in samples {
        let ev = NotificationEvent::new(id, content, score, &cfg.notify);
        if let Err(e) = mux.send(&ev).await {
            tracing::warn!(error = %format!("{e:#}"), "demo alert failed");
        }
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    println!("notify-demo done");
    Ok(())
}
