// src/pipeline.rs
//! Per-item processing: persist content → score → record rating → notify.
//!
//! Items run strictly one after another, each step awaited before the next.
//! Every step fails soft: a failure is logged and counted, and the item keeps
//! going with whatever it has (the default score if scoring failed).

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;

use crate::config::NotifyConfig;
use crate::feed::Item;
use crate::notify::{NotificationEvent, Notifier};
use crate::score::{DynScorer, DEFAULT_SCORE};
use crate::store::{ContentLog, ImpactLog, ImpactRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub score: u8,
    /// Scorer failed or answered out of range, `score` is the default.
    pub score_defaulted: bool,
    pub content_persisted: bool,
    pub recorded: bool,
    pub notified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn notify_failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.notified).count()
    }
}

pub struct ItemProcessor {
    content_log: Arc<dyn ContentLog>,
    impact_log: Arc<dyn ImpactLog>,
    scorer: DynScorer,
    notifier: Arc<dyn Notifier>,
    notify_cfg: NotifyConfig,
}

impl ItemProcessor {
    pub fn new(
        content_log: Arc<dyn ContentLog>,
        impact_log: Arc<dyn ImpactLog>,
        scorer: DynScorer,
        notifier: Arc<dyn Notifier>,
        notify_cfg: NotifyConfig,
    ) -> Self {
        Self {
            content_log,
            impact_log,
            scorer,
            notifier,
            notify_cfg,
        }
    }

    /// Process `items` (oldest first) one at a time.
    pub async fn process_batch(&self, items: &[Item]) -> BatchReport {
        let mut report = BatchReport::default();
        for item in items {
            report.outcomes.push(self.process_item(item).await);
        }
        report
    }

    pub async fn process_item(&self, item: &Item) -> ItemOutcome {
        let item_id = item.id.to_string();
        tracing::info!(
            target: "pipeline",
            item_id = %item_id,
            timestamp = ?item.timestamp,
            chars = item.content.chars().count(),
            "new item detected"
        );
        counter!("feed_items_new_total").increment(1);

        let content_persisted = match self.content_log.append(item).await {
            Ok(()) => true,
            Err(e) => {
                counter!("persistence_failures_total", "what" => "content").increment(1);
                tracing::warn!(target: "pipeline", item_id = %item_id, error = %e, "content append failed");
                false
            }
        };

        let (score, score_defaulted) = match self.scorer.score(&item.content).await {
            Ok(s) if (crate::score::MIN_SCORE..=crate::score::MAX_SCORE).contains(&s) => (s, false),
            Ok(s) => {
                counter!("scoring_failures_total").increment(1);
                tracing::warn!(target: "pipeline", item_id = %item_id, score = s, "scorer answered out of range; using default");
                (DEFAULT_SCORE, true)
            }
            Err(e) => {
                counter!("scoring_failures_total").increment(1);
                tracing::warn!(target: "pipeline", item_id = %item_id, scorer = self.scorer.name(), error = %e, "scoring failed; using default");
                (DEFAULT_SCORE, true)
            }
        };

        let record = ImpactRecord {
            item_id: item_id.clone(),
            score,
            evaluated_at: Utc::now(),
        };
        let recorded = match self.impact_log.append(&record).await {
            Ok(()) => true,
            Err(e) => {
                counter!("persistence_failures_total", "what" => "impact").increment(1);
                tracing::warn!(target: "pipeline", item_id = %item_id, error = %e, "impact record append failed");
                false
            }
        };

        let ev = NotificationEvent::new(&item_id, &item.content, score, &self.notify_cfg);
        let notified = match self.notifier.send(&ev).await {
            Ok(()) => true,
            Err(e) => {
                counter!("notify_failures_total").increment(1);
                tracing::warn!(target: "pipeline", item_id = %item_id, error = %format!("{e:#}"), "notification failed");
                false
            }
        };

        tracing::info!(target: "pipeline", item_id = %item_id, score, score_defaulted, notified, "item processed");
        ItemOutcome {
            item_id,
            score,
            score_defaulted,
            content_persisted,
            recorded,
            notified,
        }
    }
}
