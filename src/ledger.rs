// src/ledger.rs
//! Usage tracker / dedup ledger.
//!
//! Keys are normalized titles. The window predicate is a pure function of a
//! record and a clock reading; storage is behind [`UsageStore`]. A failed
//! lookup is answered as "not used" so a ledger outage never blocks
//! processing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::batch::BatchId;
use crate::error::StoreError;
use crate::normalize::normalize_title;
use crate::platform::PlatformId;
use crate::telemetry::LEDGER_ERRORS;
use crate::topic::{Category, RawTopic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub platform: Option<PlatformId>,
    pub category: Option<Category>,
    pub batch_id: Option<BatchId>,
    pub original_title: String,
}

impl UsageMetadata {
    pub fn for_topic(topic: &RawTopic, batch_id: Option<&BatchId>) -> Self {
        Self {
            platform: Some(topic.platform),
            category: topic.category,
            batch_id: batch_id.cloned(),
            original_title: topic.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageOccurrence {
    pub used_at: DateTime<Utc>,
    pub metadata: UsageMetadata,
}

/// Append-only usage history of one normalized title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub normalized_title: String,
    pub first_used_at: DateTime<Utc>,
    pub occurrences: Vec<UsageOccurrence>,
}

impl UsageRecord {
    pub fn new(normalized_title: impl Into<String>, first: UsageOccurrence) -> Self {
        Self {
            normalized_title: normalized_title.into(),
            first_used_at: first.used_at,
            occurrences: vec![first],
        }
    }

    pub fn last_used_at(&self) -> DateTime<Utc> {
        self.occurrences
            .last()
            .map(|o| o.used_at)
            .unwrap_or(self.first_used_at)
    }

    /// Append keeping timestamps non-decreasing; an out-of-order clock
    /// reading is clamped to the latest one already recorded.
    pub fn push(&mut self, mut occurrence: UsageOccurrence) {
        let last = self.last_used_at();
        if occurrence.used_at < last {
            occurrence.used_at = last;
        }
        self.occurrences.push(occurrence);
    }
}

/// Was `record` used within the last `window_days` days as of `now`?
///
/// Whole days are counted, so a mark at T is still "used" at T+30d23h with a
/// 30-day window and expires at T+31d.
pub fn used_within(record: &UsageRecord, now: DateTime<Utc>, window_days: i64) -> bool {
    now.signed_duration_since(record.last_used_at()).num_days() <= window_days
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<UsageRecord>, StoreError>;

    /// Create the record on first use, otherwise append to it.
    async fn append(&self, key: &str, occurrence: UsageOccurrence) -> Result<UsageRecord, StoreError>;

    async fn records(&self) -> Result<Vec<UsageRecord>, StoreError>;
}

fn append_into(map: &mut BTreeMap<String, UsageRecord>, key: &str, occurrence: UsageOccurrence) -> UsageRecord {
    match map.get_mut(key) {
        Some(record) => {
            record.push(occurrence);
            record.clone()
        }
        None => {
            let record = UsageRecord::new(key, occurrence);
            map.insert(key.to_string(), record.clone());
            record
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    records: Mutex<BTreeMap<String, UsageRecord>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn lookup(&self, key: &str) -> Result<Option<UsageRecord>, StoreError> {
        let map = self.records.lock().expect("usage store mutex poisoned");
        Ok(map.get(key).cloned())
    }

    async fn append(&self, key: &str, occurrence: UsageOccurrence) -> Result<UsageRecord, StoreError> {
        let mut map = self.records.lock().expect("usage store mutex poisoned");
        Ok(append_into(&mut map, key, occurrence))
    }

    async fn records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let map = self.records.lock().expect("usage store mutex poisoned");
        Ok(map.values().cloned().collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    records: BTreeMap<String, UsageRecord>,
}

/// Whole ledger in one JSON document. Writes go to a sibling temp file that
/// is renamed over the original.
#[derive(Debug)]
pub struct JsonFileUsageStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileUsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<LedgerDocument, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(LedgerDocument::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, doc: &LedgerDocument) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl UsageStore for JsonFileUsageStore {
    async fn lookup(&self, key: &str) -> Result<Option<UsageRecord>, StoreError> {
        Ok(self.load().await?.records.remove(key))
    }

    async fn append(&self, key: &str, occurrence: UsageOccurrence) -> Result<UsageRecord, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let record = append_into(&mut doc.records, key, occurrence);
        self.save(&doc).await?;
        Ok(record)
    }

    async fn records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        Ok(self.load().await?.records.into_values().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub unique_titles: usize,
    pub total_occurrences: usize,
    pub used_last_7_days: usize,
    pub used_last_30_days: usize,
}

#[derive(Clone)]
pub struct UsageTracker {
    store: Arc<dyn UsageStore>,
    window_days: i64,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn UsageStore>, window_days: i64) -> Self {
        Self { store, window_days }
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    pub fn key(title: &str) -> String {
        normalize_title(title)
    }

    /// Fails closed: a store error is logged and answered with `false`.
    pub async fn is_used(&self, title: &str, now: DateTime<Utc>) -> bool {
        let key = Self::key(title);
        match self.store.lookup(&key).await {
            Ok(Some(record)) => used_within(&record, now, self.window_days),
            Ok(None) => false,
            Err(e) => {
                counter!(LEDGER_ERRORS).increment(1);
                warn!(key = %key, error = %e, "usage ledger lookup failed; treating as unused");
                false
            }
        }
    }

    pub async fn mark_used(
        &self,
        topic: &RawTopic,
        batch_id: Option<&BatchId>,
        at: DateTime<Utc>,
    ) -> Result<UsageRecord, StoreError> {
        let occurrence = UsageOccurrence {
            used_at: at,
            metadata: UsageMetadata::for_topic(topic, batch_id),
        };
        self.store.append(&Self::key(&topic.title), occurrence).await
    }

    /// Topics whose title has not been used within the window, input order kept.
    pub async fn filter_unused(&self, topics: Vec<RawTopic>, now: DateTime<Utc>) -> Vec<RawTopic> {
        let mut out = Vec::with_capacity(topics.len());
        for topic in topics {
            if !self.is_used(&topic.title, now).await {
                out.push(topic);
            }
        }
        out
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<UsageStats, StoreError> {
        let records = self.store.records().await?;
        let within = |days: i64| records.iter().filter(|r| used_within(r, now, days)).count();
        Ok(UsageStats {
            unique_titles: records.len(),
            total_occurrences: records.iter().map(|r| r.occurrences.len()).sum(),
            used_last_7_days: within(7),
            used_last_30_days: within(30),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn occurrence(at: DateTime<Utc>) -> UsageOccurrence {
        UsageOccurrence {
            used_at: at,
            metadata: UsageMetadata {
                platform: Some(PlatformId::Weibo),
                category: None,
                batch_id: None,
                original_title: "T".into(),
            },
        }
    }

    #[test]
    fn window_boundaries() {
        let r = UsageRecord::new("t", occurrence(t0()));
        assert!(used_within(&r, t0(), 30));
        assert!(used_within(&r, t0() + Duration::days(29), 30));
        assert!(used_within(&r, t0() + Duration::days(30), 30));
        assert!(!used_within(&r, t0() + Duration::days(31), 30));
    }

    #[test]
    fn occurrences_stay_monotonic() {
        let mut r = UsageRecord::new("t", occurrence(t0()));
        r.push(occurrence(t0() - Duration::days(3)));
        r.push(occurrence(t0() + Duration::days(1)));
        let times: Vec<_> = r.occurrences.iter().map(|o| o.used_at).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(r.first_used_at, t0());
    }

    #[tokio::test]
    async fn tracker_keys_by_normalized_title() {
        let tracker = UsageTracker::new(Arc::new(MemoryUsageStore::new()), 30);
        let topic = RawTopic::new(PlatformId::Zhihu, "AI Learning!", "u");
        tracker.mark_used(&topic, Some(&BatchId::new("b")), t0()).await.unwrap();

        assert!(tracker.is_used("ai   learning", t0() + Duration::days(29)).await);
        assert!(!tracker.is_used("ai learning", t0() + Duration::days(31)).await);
        assert!(!tracker.is_used("something else", t0()).await);
    }

    #[tokio::test]
    async fn json_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger").join("usage.json");
        let topic = RawTopic::new(PlatformId::Baidu, "Rust 2.0", "u");

        let tracker = UsageTracker::new(Arc::new(JsonFileUsageStore::new(&path)), 30);
        tracker.mark_used(&topic, None, t0()).await.unwrap();
        tracker.mark_used(&topic, None, t0() + Duration::days(2)).await.unwrap();

        let reopened = UsageTracker::new(Arc::new(JsonFileUsageStore::new(&path)), 30);
        assert!(reopened.is_used("rust 20", t0() + Duration::days(10)).await);
        let stats = reopened.stats(t0() + Duration::days(10)).await.unwrap();
        assert_eq!(stats.unique_titles, 1);
        assert_eq!(stats.total_occurrences, 2);
        assert_eq!(stats.used_last_7_days, 0);
        assert_eq!(stats.used_last_30_days, 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        std::fs::write(&path, "{not json").unwrap();
        let tracker = UsageTracker::new(Arc::new(JsonFileUsageStore::new(&path)), 30);
        assert!(!tracker.is_used("anything", t0()).await);
        assert!(tracker.stats(t0()).await.is_err());
    }
}
