// src/store.rs
//! Access contract for the persistent topic store, plus an in-memory
//! implementation used by the binary and the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::{Batch, BatchId};
use crate::error::StoreError;
use crate::platform::PlatformId;
use crate::topic::{Category, RawTopic};

pub type TopicId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTopic {
    pub id: TopicId,
    pub batch_id: BatchId,
    pub topic: RawTopic,
    pub consumed_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait TopicStore: Send + Sync {
    /// Persist topics tagged with their batch. Ids come back in input order.
    async fn insert(&self, batch: &BatchId, topics: &[RawTopic]) -> Result<Vec<TopicId>, StoreError>;

    /// Topics of one batch, hot value descending.
    async fn by_batch(&self, batch: &BatchId, limit: Option<usize>) -> Result<Vec<StoredTopic>, StoreError>;

    /// Topics observed on `date` (UTC), optionally narrowed.
    async fn by_date(
        &self,
        date: NaiveDate,
        platform: Option<PlatformId>,
        category: Option<Category>,
    ) -> Result<Vec<StoredTopic>, StoreError>;

    /// Never-consumed topics, newest first.
    async fn available(&self, category: Option<Category>, limit: Option<usize>) -> Result<Vec<StoredTopic>, StoreError>;

    /// First write wins: returns `false` (and changes nothing) when the topic
    /// was already consumed or does not exist.
    async fn mark_consumed(&self, id: TopicId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Insert or replace the run record keyed by `batch.id`. Called when a
    /// batch starts and again when it is sealed.
    async fn record_batch(&self, batch: &Batch) -> Result<(), StoreError>;

    async fn batch(&self, id: &BatchId) -> Result<Option<Batch>, StoreError>;

    /// Runs whose start date (UTC) falls in `from..=to`, newest first.
    async fn batches_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Batch>, StoreError>;

    /// Stored topic count per platform.
    async fn platform_stats(&self) -> Result<BTreeMap<PlatformId, usize>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryTopicStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: TopicId,
    rows: Vec<StoredTopic>,
    batches: HashMap<BatchId, Batch>,
}

impl MemoryTopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("topic store mutex poisoned").rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn take_limit(rows: Vec<StoredTopic>, limit: Option<usize>) -> Vec<StoredTopic> {
    match limit {
        Some(n) => rows.into_iter().take(n).collect(),
        None => rows,
    }
}

#[async_trait]
impl TopicStore for MemoryTopicStore {
    async fn insert(&self, batch: &BatchId, topics: &[RawTopic]) -> Result<Vec<TopicId>, StoreError> {
        let mut inner = self.inner.lock().expect("topic store mutex poisoned");
        let mut ids = Vec::with_capacity(topics.len());
        for topic in topics {
            inner.next_id += 1;
            let id = inner.next_id;
            inner.rows.push(StoredTopic {
                id,
                batch_id: batch.clone(),
                topic: topic.clone(),
                consumed_at: None,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn by_batch(&self, batch: &BatchId, limit: Option<usize>) -> Result<Vec<StoredTopic>, StoreError> {
        let inner = self.inner.lock().expect("topic store mutex poisoned");
        let mut rows: Vec<StoredTopic> = inner
            .rows
            .iter()
            .filter(|r| &r.batch_id == batch)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.topic.hot_value.cmp(&a.topic.hot_value));
        Ok(take_limit(rows, limit))
    }

    async fn by_date(
        &self,
        date: NaiveDate,
        platform: Option<PlatformId>,
        category: Option<Category>,
    ) -> Result<Vec<StoredTopic>, StoreError> {
        let inner = self.inner.lock().expect("topic store mutex poisoned");
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.topic.observed_at.date_naive() == date)
            .filter(|r| platform.map_or(true, |p| r.topic.platform == p))
            .filter(|r| category.map_or(true, |c| r.topic.category == Some(c)))
            .cloned()
            .collect())
    }

    async fn available(&self, category: Option<Category>, limit: Option<usize>) -> Result<Vec<StoredTopic>, StoreError> {
        let inner = self.inner.lock().expect("topic store mutex poisoned");
        let mut rows: Vec<StoredTopic> = inner
            .rows
            .iter()
            .filter(|r| r.consumed_at.is_none())
            .filter(|r| category.map_or(true, |c| r.topic.category == Some(c)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.topic.observed_at.cmp(&a.topic.observed_at).then(b.id.cmp(&a.id)));
        Ok(take_limit(rows, limit))
    }

    async fn mark_consumed(&self, id: TopicId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("topic store mutex poisoned");
        match inner.rows.iter_mut().find(|r| r.id == id) {
            Some(row) if row.consumed_at.is_none() => {
                row.consumed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_batch(&self, batch: &Batch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("topic store mutex poisoned");
        inner.batches.insert(batch.id.clone(), batch.clone());
        Ok(())
    }

    async fn batch(&self, id: &BatchId) -> Result<Option<Batch>, StoreError> {
        let inner = self.inner.lock().expect("topic store mutex poisoned");
        Ok(inner.batches.get(id).cloned())
    }

    async fn batches_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Batch>, StoreError> {
        let inner = self.inner.lock().expect("topic store mutex poisoned");
        let mut runs: Vec<Batch> = inner
            .batches
            .values()
            .filter(|b| (from..=to).contains(&b.started_at.date_naive()))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(runs)
    }

    async fn platform_stats(&self) -> Result<BTreeMap<PlatformId, usize>, StoreError> {
        let inner = self.inner.lock().expect("topic store mutex poisoned");
        let mut stats = BTreeMap::new();
        for row in &inner.rows {
            *stats.entry(row.topic.platform).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
