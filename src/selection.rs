// src/selection.rs
//! Picking fresh topics out of a batch pool and handing them to the
//! downstream content generator.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::batch::BatchId;
use crate::ledger::UsageTracker;
use crate::normalize::normalize_title;
use crate::platform::PlatformId;
use crate::store::{TopicId, TopicStore};
use crate::topic::{Category, RawTopic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub title: String,
    pub platform: PlatformId,
    pub category: Option<Category>,
    pub style: String,
}

/// Opaque downstream generator. Called once per topic, never retried.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct SelectionOptions {
    pub limit: usize,
    pub category: Option<Category>,
    pub cross_platform_threshold: usize,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            category: None,
            cross_platform_threshold: crate::aggregate::DEFAULT_CROSS_PLATFORM_THRESHOLD,
        }
    }
}

/// Up to `opts.limit` topics that the ledger has not seen within its window.
///
/// Order of preference: confirmed on several platforms, then hot value
/// descending, then source rank ascending. One topic per normalized title.
pub async fn select_fresh(
    tracker: &UsageTracker,
    pool: &[RawTopic],
    opts: &SelectionOptions,
    now: DateTime<Utc>,
) -> Vec<RawTopic> {
    let spread: HashMap<String, usize> = Aggregator::new(pool.to_vec())
        .cross_platform(1)
        .into_iter()
        .map(|c| (c.normalized_title.clone(), c.platform_count()))
        .collect();
    let threshold = opts.cross_platform_threshold.max(1);

    let mut candidates: Vec<(String, bool, &RawTopic)> = pool
        .iter()
        .filter(|t| opts.category.map_or(true, |c| t.category == Some(c)))
        .filter_map(|t| {
            let key = normalize_title(&t.title);
            if key.is_empty() {
                return None;
            }
            let cross = spread.get(&key).copied().unwrap_or(0) >= threshold;
            Some((key, cross, t))
        })
        .collect();
    candidates.sort_by(|(_, a_cross, a), (_, b_cross, b)| {
        b_cross
            .cmp(a_cross)
            .then(b.hot_value.cmp(&a.hot_value))
            .then(a.rank.cmp(&b.rank))
    });

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for (key, _, topic) in candidates {
        if out.len() >= opts.limit {
            break;
        }
        if !seen.insert(key) {
            continue;
        }
        if tracker.is_used(&topic.title, now).await {
            continue;
        }
        out.push(topic.clone());
    }
    out
}

/// Generate content for one topic, then record it as used.
///
/// The generator is called exactly once; its error is returned as-is. After
/// a successful call, ledger and store failures are logged but do not undo
/// the generated text.
pub async fn generate_for(
    generator: &dyn ContentGenerator,
    tracker: &UsageTracker,
    store: Option<(&dyn TopicStore, TopicId)>,
    topic: &RawTopic,
    batch_id: Option<&BatchId>,
    style: &str,
) -> Result<String> {
    let request = GenerationRequest {
        title: topic.title.clone(),
        platform: topic.platform,
        category: topic.category,
        style: style.to_string(),
    };
    let text = generator
        .generate(&request)
        .await
        .with_context(|| format!("generating content for {:?}", topic.title))?;

    let now = Utc::now();
    if let Err(e) = tracker.mark_used(topic, batch_id, now).await {
        warn!(title = %topic.title, error = %e, "could not record topic usage");
    }
    if let Some((store, id)) = store {
        match store.mark_consumed(id, now).await {
            Ok(true) => {}
            Ok(false) => info!(topic_id = id, "topic was already consumed"),
            Err(e) => warn!(topic_id = id, error = %e, "could not mark topic consumed"),
        }
    }
    Ok(text)
}
