// src/score/openai.rs
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{parse_rating, Scorer};
use crate::error::{WatchError, WatchResult};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You are a helpful assistant specialized in financial markets.";

/// Chat Completions based rater.
pub struct OpenAiScorer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiScorer {
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("feed-impact-watcher/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: CHAT_COMPLETIONS_URL.to_string(),
        })
    }

    /// Point at a compatible endpoint (proxies, local gateways).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

pub fn build_prompt(content: &str) -> String {
    format!(
        "You are a financial-markets analyst with deep experience interpreting social-media commentary and how it moves markets.
Your task: Given the following single post, evaluate how much immediate impact it is likely to have on the U.S. or global equity markets.

- Rate it on a scale from 1 to 5 stars, where:
  1 = No or negligible market impact.
  2 = Minor / localized impact (affects a specific sector or a few stocks).
  3 = Moderate impact (noticeable price movement in certain sectors or mid-caps).
  4 = High impact (broad market movement, multi-sector effects).
  5 = Extreme impact (systemic or major macro risk/uncertainty, likely to move major indices).

- In your response, only output a single integer from 1 to 5 (no stars, no extra text).

Post:
\"{content}\""
    )
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Scorer for OpenAiScorer {
    async fn score(&self, content: &str) -> WatchResult<u8> {
        let prompt = build_prompt(content);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 5,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| WatchError::Scoring(format!("openai request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WatchError::Scoring(format!("openai returned status {status}")));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| WatchError::Scoring(format!("openai body: {e}")))?;
        let reply = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("");
        parse_rating(reply)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
