// src/batch.rs
//! Batch bookkeeping: identifiers, per-platform outcomes, sealing, and the
//! immutable progress snapshot published while a batch runs.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::PlatformId;

/// Time-derived batch key (`20250101_093000_123`). A `-n` suffix is added
/// when two batches start within the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_time(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d_%H%M%S_%3f").to_string())
    }

    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    /// Orchestration completed. Says nothing about individual platforms.
    Success,
    /// The orchestrating worker itself was lost before sealing.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterOutcome {
    pub platform: PlatformId,
    pub status: OutcomeStatus,
    pub topic_count: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl AdapterOutcome {
    /// Success iff at least one topic came back.
    pub fn from_fetch(platform: PlatformId, topic_count: usize, diagnostic: Option<String>, elapsed: Duration) -> Self {
        let status = if topic_count > 0 {
            OutcomeStatus::Success
        } else {
            OutcomeStatus::Failed
        };
        let error = match status {
            OutcomeStatus::Success => None,
            OutcomeStatus::Failed => Some(diagnostic.unwrap_or_else(|| "no topics returned".to_string())),
        };
        Self {
            platform,
            status,
            topic_count,
            error,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failed(platform: PlatformId, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            platform,
            status: OutcomeStatus::Failed,
            topic_count: 0,
            error: Some(error.into()),
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub status: BatchStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<AdapterOutcome>,
    pub success_count: usize,
    pub failed_count: usize,
    pub total_topics: usize,
}

impl Batch {
    pub fn start(id: BatchId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: BatchStatus::Running,
            started_at,
            finished_at: None,
            outcomes: Vec::new(),
            success_count: 0,
            failed_count: 0,
            total_topics: 0,
        }
    }

    pub fn record(&mut self, outcome: AdapterOutcome) {
        debug_assert_eq!(self.status, BatchStatus::Running, "recording into a sealed batch");
        self.outcomes.push(outcome);
    }

    /// Compute aggregate totals and mark the batch terminal.
    pub fn seal(&mut self, finished_at: DateTime<Utc>) {
        self.success_count = self.outcomes.iter().filter(|o| o.is_success()).count();
        self.failed_count = self.outcomes.len() - self.success_count;
        self.total_topics = self.outcomes.iter().map(|o| o.topic_count).sum();
        self.finished_at = Some(finished_at);
        self.status = BatchStatus::Success;
    }

    pub fn is_sealed(&self) -> bool {
        self.status != BatchStatus::Running
    }

    /// Wall time from start to seal.
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }
}

/// Point-in-time view of a running batch. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub started_at: DateTime<Utc>,
    pub total_platforms: usize,
    pub completed_platforms: usize,
    pub current_platform: Option<PlatformId>,
    pub outcomes: Vec<AdapterOutcome>,
}

impl ProgressSnapshot {
    pub fn pending(batch_id: BatchId, started_at: DateTime<Utc>, total_platforms: usize) -> Self {
        Self {
            batch_id,
            status: BatchStatus::Running,
            started_at,
            total_platforms,
            completed_platforms: 0,
            current_platform: None,
            outcomes: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != BatchStatus::Running
    }

    pub fn running(&self, current: PlatformId) -> Self {
        Self {
            current_platform: Some(current),
            ..self.clone()
        }
    }

    pub fn completed(&self, outcome: AdapterOutcome) -> Self {
        let mut next = self.clone();
        next.outcomes.push(outcome);
        next.completed_platforms = next.outcomes.len();
        next.current_platform = None;
        next
    }

    pub fn finished(&self, status: BatchStatus) -> Self {
        Self {
            status,
            current_platform: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn id_is_time_derived() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap() + chrono::Duration::milliseconds(42);
        let id = BatchId::from_time(at);
        assert_eq!(id.as_str(), "20250309_070501_042");
        assert_eq!(id.with_suffix(2).as_str(), "20250309_070501_042-2");
    }

    #[test]
    fn sealing_computes_totals() {
        let mut b = Batch::start(BatchId::new("b"), Utc::now());
        b.record(AdapterOutcome::from_fetch(PlatformId::Baidu, 5, None, Duration::ZERO));
        b.record(AdapterOutcome::from_fetch(PlatformId::Weibo, 0, Some("403".into()), Duration::ZERO));
        b.record(AdapterOutcome::failed(PlatformId::Zhihu, "panicked", Duration::ZERO));
        assert!(!b.is_sealed());
        b.seal(Utc::now());
        assert_eq!(b.status, BatchStatus::Success);
        assert_eq!((b.success_count, b.failed_count, b.total_topics), (1, 2, 5));
        assert_eq!(b.outcomes[1].error.as_deref(), Some("403"));
    }

    #[test]
    fn zero_topics_without_diagnostic_still_explains_itself() {
        let o = AdapterOutcome::from_fetch(PlatformId::Baidu, 0, None, Duration::ZERO);
        assert_eq!(o.status, OutcomeStatus::Failed);
        assert!(o.error.is_some());
    }

    #[test]
    fn snapshots_advance_without_mutation() {
        let s0 = ProgressSnapshot::pending(BatchId::new("b"), Utc::now(), 2);
        let s1 = s0.running(PlatformId::Baidu);
        let s2 = s1.completed(AdapterOutcome::from_fetch(PlatformId::Baidu, 1, None, Duration::ZERO));
        assert_eq!(s0.current_platform, None);
        assert_eq!(s1.current_platform, Some(PlatformId::Baidu));
        assert_eq!(s2.completed_platforms, 1);
        assert!(!s2.is_terminal());
        assert!(s2.finished(BatchStatus::Success).is_terminal());
    }
}
