use super::{NotificationEvent, Notifier};
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Discord embeds cap descriptions at 4096 chars.
const DESCRIPTION_CAP: usize = 4000;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let payload = DiscordWebhookPayload::from_event(ev);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    timestamp: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_event(ev: &NotificationEvent) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: ev.subject(),
                description: ev.content.chars().take(DESCRIPTION_CAP).collect(),
                url: ev.post_url.clone(),
                timestamp: ev.ts.to_rfc3339(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn payload_is_a_single_embed() {
        let ev = NotificationEvent {
            item_id: "9".into(),
            content: "x".repeat(5000),
            score: 5,
            post_url: None,
            ts: Utc::now(),
        };
        let v = serde_json::to_value(DiscordWebhookPayload::from_event(&ev)).unwrap();
        assert_eq!(v["embeds"][0]["title"], "5★ New post (ID: 9)");
        assert_eq!(v["embeds"][0]["description"].as_str().unwrap().len(), DESCRIPTION_CAP);
        assert!(v["embeds"][0].get("url").is_none());
    }
}
