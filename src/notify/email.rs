use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{NotificationEvent, Notifier};

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailSender {
    /// `Ok(None)` when SMTP_HOST is unset. Once it is set the rest
    /// (SMTP_USER, SMTP_PASS, NOTIFY_EMAIL_FROM, NOTIFY_EMAIL_TO) must be too.
    /// NOTIFY_EMAIL_TO takes a comma-separated list.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let var = |k: &str| std::env::var(k).with_context(|| format!("{k} missing"));
        let user = var("SMTP_USER")?;
        let pass = var("SMTP_PASS")?;
        let from_addr = var("NOTIFY_EMAIL_FROM")?;
        let to_addrs = var("NOTIFY_EMAIL_TO")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(Credentials::new(user, pass))
            .build();

        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = parse_recipients(&to_addrs)?;
        Ok(Some(Self { mailer, from, to }))
    }
}

pub fn parse_recipients(raw: &str) -> Result<Vec<Mailbox>> {
    let to = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Mailbox>().with_context(|| format!("invalid recipient {s:?}")))
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!to.is_empty(), "NOTIFY_EMAIL_TO has no recipients");
    Ok(to)
}

pub fn render_body(ev: &NotificationEvent) -> String {
    let link = ev
        .post_url
        .as_deref()
        .map(|u| format!("\nYou can view it here:\n{u}\n"))
        .unwrap_or_default();
    format!(
        "You have a new post (ID: {}), rated {} out of 5 for market impact.\n{}\nPost content:\n{}\n\n---\nThis is an automated alert from feed-impact-watcher.\n",
        ev.item_id, ev.score, link, ev.content
    )
}

#[async_trait::async_trait]
impl Notifier for EmailSender {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let mut builder = Message::builder().from(self.from.clone());
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let msg = builder
            .subject(ev.subject())
            .header(header::ContentType::TEXT_PLAIN)
            .body(render_body(ev))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn recipients_are_split_and_trimmed() {
        let to = parse_recipients(" a@example.test , b@example.test,").unwrap();
        assert_eq!(to.len(), 2);
        assert!(parse_recipients(" , ").is_err());
        assert!(parse_recipients("not-an-address").is_err());
    }

    #[test]
    fn body_mentions_rating_link_and_content() {
        let ev = NotificationEvent {
            item_id: "7".into(),
            content: "Big news".into(),
            score: 2,
            post_url: Some("https://example.test/posts/7".into()),
            ts: Utc::now(),
        };
        let body = render_body(&ev);
        assert!(body.contains("rated 2 out of 5"));
        assert!(body.contains("https://example.test/posts/7"));
        assert!(body.contains("Big news"));
    }
}
