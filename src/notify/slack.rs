use anyhow::{Context, Result};
use reqwest::Client;

use super::{NotificationEvent, Notifier};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
        }
    }
}

pub fn render_text(ev: &NotificationEvent) -> String {
    let link = ev
        .post_url
        .as_deref()
        .map(|u| format!("\n<{u}|View post>"))
        .unwrap_or_default();
    format!(
        "*{}* New post `{}` (impact {}/5){}\n>{}",
        ev.stars(),
        ev.item_id,
        ev.score,
        link,
        ev.content.replace('\n', "\n>")
    )
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let body = serde_json::json!({ "text": render_text(ev) });

        self.client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
