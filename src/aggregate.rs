// src/aggregate.rs
//! Per-platform ranked views and cross-platform correlation over one topic
//! pool. Everything is recomputed on each call.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_title;
use crate::platform::PlatformId;
use crate::topic::RawTopic;

pub const DEFAULT_CROSS_PLATFORM_THRESHOLD: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformGroup {
    pub platform: PlatformId,
    pub topics: Vec<RawTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossPlatformTopic {
    pub normalized_title: String,
    /// Title as first seen in the pool, for display.
    pub title: String,
    pub platforms: BTreeSet<PlatformId>,
    pub occurrences: usize,
}

impl CrossPlatformTopic {
    pub fn platform_count(&self) -> usize {
        self.platforms.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_topics: usize,
    pub platform_count: usize,
    pub cross_platform_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    topics: Vec<RawTopic>,
}

impl Aggregator {
    pub fn new(topics: Vec<RawTopic>) -> Self {
        Self { topics }
    }

    pub fn topics(&self) -> &[RawTopic] {
        &self.topics
    }

    /// Groups in first-seen platform order. Within a group: hot value
    /// descending, ties by ascending source rank.
    pub fn by_platform(&self) -> Vec<PlatformGroup> {
        let mut order: Vec<PlatformId> = Vec::new();
        let mut groups: HashMap<PlatformId, Vec<RawTopic>> = HashMap::new();
        for t in &self.topics {
            groups
                .entry(t.platform)
                .or_insert_with(|| {
                    order.push(t.platform);
                    Vec::new()
                })
                .push(t.clone());
        }
        order
            .into_iter()
            .filter_map(|platform| {
                let mut topics = groups.remove(&platform)?;
                rank_within_platform(&mut topics);
                Some(PlatformGroup { platform, topics })
            })
            .collect()
    }

    pub fn top_by_platform(&self, n: usize) -> Vec<PlatformGroup> {
        self.by_platform()
            .into_iter()
            .map(|mut g| {
                g.topics.truncate(n);
                g
            })
            .collect()
    }

    /// Normalized titles reported by at least `threshold` distinct platforms,
    /// most platforms first. Exact match on the normalized title only.
    pub fn cross_platform(&self, threshold: usize) -> Vec<CrossPlatformTopic> {
        let threshold = threshold.max(1);
        let mut order: Vec<String> = Vec::new();
        let mut entries: HashMap<String, CrossPlatformTopic> = HashMap::new();

        for t in &self.topics {
            let key = normalize_title(&t.title);
            if key.is_empty() {
                continue;
            }
            let entry = entries.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                CrossPlatformTopic {
                    normalized_title: key,
                    title: t.title.clone(),
                    platforms: BTreeSet::new(),
                    occurrences: 0,
                }
            });
            entry.platforms.insert(t.platform);
            entry.occurrences += 1;
        }

        let mut out: Vec<CrossPlatformTopic> = order
            .into_iter()
            .filter_map(|k| entries.remove(&k))
            .filter(|e| e.platform_count() >= threshold)
            .collect();
        out.sort_by(|a, b| {
            b.platform_count()
                .cmp(&a.platform_count())
                .then(b.occurrences.cmp(&a.occurrences))
                .then_with(|| a.normalized_title.cmp(&b.normalized_title))
        });
        out
    }

    pub fn summary(&self, threshold: usize) -> Summary {
        let platforms: BTreeSet<PlatformId> = self.topics.iter().map(|t| t.platform).collect();
        Summary {
            total_topics: self.topics.len(),
            platform_count: platforms.len(),
            cross_platform_count: self.cross_platform(threshold).len(),
        }
    }
}

/// Stable sort: hot value descending, then source rank ascending.
pub fn rank_within_platform(topics: &mut [RawTopic]) {
    topics.sort_by(|a, b| b.hot_value.cmp(&a.hot_value).then(a.rank.cmp(&b.rank)));
}
