// src/feed/providers/status_feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::FeedConfig;
use crate::error::{WatchError, WatchResult};
use crate::feed::types::SnapshotFetcher;

/// Account status timeline (Mastodon-compatible `statuses` endpoint).
pub struct StatusFeedProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
        cookie: Option<String>,
        bearer: Option<String>,
    },
}

impl StatusFeedProvider {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_fixture_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading feed fixture {}", path.display()))?;
        Ok(Self::from_fixture(&s))
    }

    /// Authenticated HTTP fetcher. Session cookies come from an exported jar;
    /// obtaining them is someone else's job.
    pub fn http(cfg: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feed-impact-watcher/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building feed http client")?;
        let cookie = match &cfg.cookies_path {
            Some(p) => load_cookie_header(p)?,
            None => None,
        };
        Ok(Self {
            mode: Mode::Http {
                url: statuses_url(&cfg.base_url, &cfg.account_id, cfg.limit),
                client,
                cookie,
                bearer: cfg.bearer_token.clone().filter(|t| !t.trim().is_empty()),
            },
        })
    }

    /// Fixture if configured, network otherwise.
    pub fn from_config(cfg: &FeedConfig) -> Result<Self> {
        match &cfg.fixture_path {
            Some(p) => Self::from_fixture_path(p),
            None => Self::http(cfg),
        }
    }
}

/// Newest statuses for one account, replies excluded.
pub fn statuses_url(base_url: &str, account_id: &str, limit: u32) -> String {
    format!(
        "{}/api/v1/accounts/{}/statuses?limit={}&exclude_replies=true&only_replies=false&with_muted=true",
        base_url.trim_end_matches('/'),
        account_id.trim(),
        limit
    )
}

#[derive(Debug, Deserialize)]
struct JarCookie {
    name: String,
    value: String,
}

/// Build a `Cookie` header from a browser cookie export. Empty jar → `None`.
pub fn load_cookie_header(path: &Path) -> Result<Option<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading cookie jar {}", path.display()))?;
    let jar: Vec<JarCookie> = serde_json::from_str(&raw).context("parsing cookie jar json")?;
    if jar.is_empty() {
        tracing::warn!(target: "feed", path = %path.display(), "cookie jar is empty");
        return Ok(None);
    }
    let header = jar
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    tracing::info!(target: "feed", cookies = jar.len(), "loaded cookie jar");
    Ok(Some(header))
}

#[async_trait]
impl SnapshotFetcher for StatusFeedProvider {
    async fn fetch_snapshot(&self) -> WatchResult<Value> {
        match &self.mode {
            Mode::Fixture(s) => serde_json::from_str(s)
                .map_err(|e| WatchError::Fetch(format!("fixture body is not json: {e}"))),
            Mode::Http {
                url,
                client,
                cookie,
                bearer,
            } => {
                let mut req = client.get(url).header(ACCEPT, "application/json");
                if let Some(c) = cookie {
                    req = req.header(COOKIE, c);
                }
                if let Some(t) = bearer {
                    req = req.bearer_auth(t);
                }
                let resp = req
                    .send()
                    .await
                    .map_err(|e| WatchError::Fetch(format!("request failed: {e}")))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(WatchError::Fetch(format!("feed returned status {status}")));
                }
                resp.json::<Value>()
                    .await
                    .map_err(|e| WatchError::Fetch(format!("body is not json: {e}")))
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Fixture(_) => "fixture",
            Mode::Http { .. } => "status-feed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_includes_account_and_filters() {
        let url = statuses_url("https://example.test/", "107780257626128497", 20);
        assert_eq!(
            url,
            "https://example.test/api/v1/accounts/107780257626128497/statuses?limit=20&exclude_replies=true&only_replies=false&with_muted=true"
        );
    }

    #[test]
    fn cookie_jar_becomes_header() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("cookies.json");
        std::fs::write(
            &p,
            r#"[{"name":"_session","value":"abc","domain":".example.test"},{"name":"cf","value":"1"}]"#,
        )
        .unwrap();
        assert_eq!(load_cookie_header(&p).unwrap().as_deref(), Some("_session=abc; cf=1"));

        std::fs::write(&p, "[]").unwrap();
        assert_eq!(load_cookie_header(&p).unwrap(), None);
    }

    #[tokio::test]
    async fn fixture_with_bad_json_is_fetch_error() {
        let p = StatusFeedProvider::from_fixture("<html>login</html>");
        let err = p.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, WatchError::Fetch(_)));
    }
}
