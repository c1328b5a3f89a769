// src/notify/mod.rs
pub mod discord;
pub mod email;
pub mod slack;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use crate::config::NotifyConfig;

/// One alert about one newly seen, rated post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub item_id: String,
    pub content: String,
    pub score: u8,
    pub post_url: Option<String>,
    pub ts: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(item_id: &str, content: &str, score: u8, cfg: &NotifyConfig) -> Self {
        Self {
            item_id: item_id.to_string(),
            content: content.to_string(),
            score,
            post_url: cfg
                .post_url_prefix
                .as_deref()
                .map(|prefix| format!("{prefix}{item_id}")),
            ts: Utc::now(),
        }
    }

    /// "3★ New post (ID: 123)"
    pub fn subject(&self) -> String {
        format!("{}★ New post (ID: {})", self.score, self.item_id)
    }

    pub fn stars(&self) -> String {
        let filled = usize::from(self.score.min(5));
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one event out to every configured channel, in order.
///
/// Every channel is attempted even if an earlier one fails; the returned
/// error lists the channels that failed.
#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, ch: Box<dyn Notifier>) -> Self {
        self.channels.push(ch);
        self
    }

    /// Email when SMTP_HOST is set, Slack when SLACK_WEBHOOK_URL is set,
    /// Discord when DISCORD_WEBHOOK_URL is set.
    pub fn from_env(cfg: &NotifyConfig) -> Result<Self> {
        let mut mux = Self::new();
        if let Some(email) = email::EmailSender::from_env()? {
            mux = mux.with_channel(Box::new(email));
        }
        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            mux = mux.with_channel(Box::new(slack::SlackNotifier::new(url)));
        }
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            mux = mux.with_channel(Box::new(
                discord::DiscordNotifier::new(url).with_retries(cfg.discord_retries),
            ));
        }
        tracing::info!(
            target: "notify",
            channels = ?mux.channel_names(),
            "notification channels configured"
        );
        Ok(mux)
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait::async_trait]
impl Notifier for NotifierMux {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        if self.channels.is_empty() {
            tracing::info!(
                target: "notify",
                item_id = %ev.item_id,
                score = ev.score,
                "{} (no channels configured, log only)",
                ev.subject()
            );
            return Ok(());
        }

        let mut failed = Vec::new();
        for ch in &self.channels {
            match ch.send(ev).await {
                Ok(()) => tracing::info!(target: "notify", channel = ch.name(), item_id = %ev.item_id, score = ev.score, "alert sent"),
                Err(e) => {
                    tracing::warn!(target: "notify", channel = ch.name(), item_id = %ev.item_id, error = %format!("{e:#}"), "alert failed");
                    failed.push(ch.name());
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("channels failed: {}", failed.join(", ")))
        }
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}

/// Test helper: remembers every event, optionally failing each send.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let n = Self::default();
        n.fail.store(true, Ordering::SeqCst);
        n
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(ev.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated delivery failure"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Shared(Arc<RecordingNotifier>);

    #[async_trait::async_trait]
    impl Notifier for Shared {
        async fn send(&self, ev: &NotificationEvent) -> Result<()> {
            self.0.send(ev).await
        }
        fn name(&self) -> &'static str {
            "shared"
        }
    }

    fn event() -> NotificationEvent {
        let cfg = NotifyConfig {
            post_url_prefix: Some("https://example.test/posts/".into()),
            ..NotifyConfig::default()
        };
        NotificationEvent::new("42", "hello", 4, &cfg)
    }

    #[test]
    fn subject_and_url() {
        let ev = event();
        assert_eq!(ev.subject(), "4★ New post (ID: 42)");
        assert_eq!(ev.post_url.as_deref(), Some("https://example.test/posts/42"));
        assert_eq!(ev.stars(), "★★★★☆");
    }

    #[tokio::test]
    async fn mux_tries_every_channel_and_reports_failure() {
        let ok = Arc::new(RecordingNotifier::new());
        let mux = NotifierMux::new()
            .with_channel(Box::new(RecordingNotifier::failing()))
            .with_channel(Box::new(Shared(ok.clone())));
        let err = mux.send(&event()).await.unwrap_err();
        assert!(err.to_string().contains("recording"));
        assert_eq!(ok.events().len(), 1);
    }

    #[tokio::test]
    async fn empty_mux_is_log_only() {
        assert!(NotifierMux::new().send(&event()).await.is_ok());
    }
}
