// src/score/mod.rs
//! Market-impact scoring: a 1..=5 star rating per post.

pub mod openai;

pub use openai::OpenAiScorer;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ScoringConfig;
use crate::error::{WatchError, WatchResult};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;
/// Used whenever the scorer fails or answers out of range.
pub const DEFAULT_SCORE: u8 = 1;

#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, content: &str) -> WatchResult<u8>;
    fn name(&self) -> &'static str;
}

pub type DynScorer = Arc<dyn Scorer>;

/// Parse a model reply into a rating. Takes the leading integer (so `"4"`,
/// `" 4 stars"` and `"4."` all work); anything outside 1..=5 is rejected.
pub fn parse_rating(reply: &str) -> WatchResult<u8> {
    let t = reply.trim();
    let digits: String = t
        .strip_prefix('+')
        .unwrap_or(t)
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let n: u32 = digits
        .parse()
        .map_err(|_| WatchError::Scoring(format!("non-numeric rating reply: {reply:?}")))?;
    if !(u32::from(MIN_SCORE)..=u32::from(MAX_SCORE)).contains(&n) {
        return Err(WatchError::Scoring(format!("rating out of range: {n}")));
    }
    Ok(n as u8)
}

/// Always fails, so every item gets [`DEFAULT_SCORE`].
pub struct DisabledScorer;

#[async_trait]
impl Scorer for DisabledScorer {
    async fn score(&self, _content: &str) -> WatchResult<u8> {
        Err(WatchError::Scoring("scoring disabled".into()))
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic scorer for tests and demos. Counts calls.
pub struct FixedScorer {
    score: u8,
    calls: AtomicUsize,
}

impl FixedScorer {
    pub fn new(score: u8) -> Self {
        Self {
            score,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scorer for FixedScorer {
    async fn score(&self, _content: &str) -> WatchResult<u8> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.score)
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Factory:
/// * `SCORER_TEST_MODE=mock` → fixed score 3.
/// * scoring disabled or no API key → [`DisabledScorer`].
/// * otherwise the OpenAI scorer.
pub fn build_scorer(cfg: &ScoringConfig) -> anyhow::Result<DynScorer> {
    if std::env::var("SCORER_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(FixedScorer::new(3)));
    }
    let key = cfg.api_key.as_deref().map(str::trim).unwrap_or_default();
    if !cfg.enabled || key.is_empty() {
        tracing::warn!(target: "score", enabled = cfg.enabled, "scoring unavailable; every item gets the default rating");
        return Ok(Arc::new(DisabledScorer));
    }
    let mut scorer = OpenAiScorer::new(key, &cfg.model, cfg.timeout_secs)?;
    if let Some(url) = cfg.endpoint.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        scorer = scorer.with_endpoint(url);
    }
    Ok(Arc::new(scorer))
}
