// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "WATCHER_CONFIG_PATH";

/// Service configuration. Every field has a default so a partial file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub poll_interval_secs: u64,
    /// How many baseline items seed an empty content log at bootstrap.
    pub bootstrap_seed_limit: usize,
    pub feed: FeedConfig,
    pub storage: StorageConfig,
    pub scoring: ScoringConfig,
    pub notify: NotifyConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            bootstrap_seed_limit: 20,
            feed: FeedConfig::default(),
            storage: StorageConfig::default(),
            scoring: ScoringConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub account_id: String,
    pub limit: u32,
    /// JSON cookie jar (`[{"name": .., "value": ..}]`) exported from a logged-in session.
    pub cookies_path: Option<PathBuf>,
    /// "ENV" (or unset) means: read FEED_BEARER_TOKEN.
    pub bearer_token: Option<String>,
    /// When set, snapshots are read from this file instead of the network.
    pub fixture_path: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://truthsocial.com".to_string(),
            account_id: String::new(),
            limit: 20,
            cookies_path: None,
            bearer_token: None,
            fixture_path: None,
            connect_timeout_secs: 4,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cursor_path: PathBuf,
    pub content_log_path: PathBuf,
    pub impact_log_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cursor_path: PathBuf::from("state/last-seen.json"),
            content_log_path: PathBuf::from("state/saved-texts.txt"),
            impact_log_path: PathBuf::from("state/impact-ratings.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub enabled: bool,
    pub model: String,
    /// "ENV" (or unset) means: read OPENAI_API_KEY.
    pub api_key: Option<String>,
    /// Chat Completions URL override (proxy or compatible gateway).
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o".to_string(),
            api_key: None,
            endpoint: None,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Item ids are appended to this to build the link in alerts.
    pub post_url_prefix: Option<String>,
    pub discord_retries: u8,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            post_url_prefix: None,
            discord_retries: 3,
        }
    }
}

impl WatcherConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading watcher config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: WatcherConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content).context("parsing watcher config json")?,
            _ => toml::from_str(&content).context("parsing watcher config toml")?,
        };
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides and validate:
    /// 1) $WATCHER_CONFIG_PATH
    /// 2) config/watcher.toml
    /// 3) config/watcher.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new("config/watcher.toml").exists() {
            Self::load_from(Path::new("config/watcher.toml"))?
        } else if Path::new("config/watcher.json").exists() {
            Self::load_from(Path::new("config/watcher.json"))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(secs) = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.poll_interval_secs = secs;
        }
        if let Ok(id) = std::env::var("FEED_ACCOUNT_ID") {
            self.feed.account_id = id;
        }
        if wants_env(&self.feed.bearer_token) {
            self.feed.bearer_token = std::env::var("FEED_BEARER_TOKEN").ok();
        }
        if wants_env(&self.scoring.api_key) {
            self.scoring.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be > 0");
        }
        if !(1..=40).contains(&self.feed.limit) {
            bail!("feed.limit must be within 1..=40, got {}", self.feed.limit);
        }
        if self.feed.fixture_path.is_none() && self.feed.account_id.trim().is_empty() {
            bail!("feed.account_id (or FEED_ACCOUNT_ID) is required unless feed.fixture_path is set");
        }
        Ok(())
    }
}

fn wants_env(v: &Option<String>) -> bool {
    match v {
        None => true,
        Some(s) => s.trim().eq_ignore_ascii_case("env"),
    }
}
