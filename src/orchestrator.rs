// src/orchestrator.rs
//! Batch orchestrator.
//!
//! Walks the configured platforms strictly in order, one adapter at a time.
//! Each adapter runs on its own task so even a panic inside it becomes a
//! failed outcome instead of taking the batch down. Progress is published
//! as a fresh [`ProgressSnapshot`] after every step; pollers only ever load
//! whole snapshots.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::{AdapterFactory, HttpAdapterFactory};
use crate::aggregate::Aggregator;
use crate::batch::{AdapterOutcome, Batch, BatchId, BatchStatus, ProgressSnapshot};
use crate::config::RadarConfig;
use crate::error::ConfigError;
use crate::platform::{parse_platforms, PlatformId};
use crate::store::TopicStore;
use crate::telemetry::{
    ensure_metrics_described, ADAPTER_RUNS, BATCH_DURATION_MS, BATCH_LAST_RUN_TS, TOPICS,
};
use crate::topic::RawTopic;

type Slot = Arc<ArcSwap<ProgressSnapshot>>;

/// Sealed batch plus the merged topic pool, in platform order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch: Batch,
    pub topics: Vec<RawTopic>,
}

impl BatchReport {
    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.topics.clone())
    }
}

/// Handle for a fire-and-forget batch.
#[derive(Debug)]
pub struct BatchTicket {
    pub id: BatchId,
    pub handle: JoinHandle<BatchReport>,
}

/// Finished snapshots kept for late pollers before the oldest are evicted.
pub const DEFAULT_KEEP_FINISHED: usize = 64;

/// Live progress of every batch started by one orchestrator.
#[derive(Debug)]
pub struct ProgressBoard {
    slots: RwLock<HashMap<BatchId, Slot>>,
    keep_finished: usize,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_KEEP_FINISHED)
    }
}

impl ProgressBoard {
    /// Board that retains at most `keep_finished` terminal snapshots.
    /// Running batches are never evicted.
    pub fn with_capacity(keep_finished: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            keep_finished,
        }
    }

    /// Reserve a unique id for a batch starting at `started_at`.
    fn register(&self, started_at: DateTime<Utc>, total: usize) -> (BatchId, Slot) {
        let mut slots = self.slots.write().expect("progress board lock poisoned");
        let base = BatchId::from_time(started_at);
        let mut id = base.clone();
        let mut n = 1;
        while slots.contains_key(&id) {
            n += 1;
            id = base.with_suffix(n);
        }
        let slot: Slot = Arc::new(ArcSwap::from_pointee(ProgressSnapshot::pending(
            id.clone(),
            started_at,
            total,
        )));
        slots.insert(id.clone(), slot.clone());
        (id, slot)
    }

    pub fn get(&self, id: &BatchId) -> Option<Arc<ProgressSnapshot>> {
        let slots = self.slots.read().expect("progress board lock poisoned");
        slots.get(id).map(|slot| slot.load_full())
    }

    pub fn batches(&self) -> Vec<BatchId> {
        let slots = self.slots.read().expect("progress board lock poisoned");
        let mut ids: Vec<BatchId> = slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Evict the oldest terminal snapshots beyond the retention bound.
    /// Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let mut slots = self.slots.write().expect("progress board lock poisoned");
        let mut finished: Vec<(DateTime<Utc>, BatchId)> = slots
            .iter()
            .map(|(id, slot)| (id, slot.load()))
            .filter(|(_, snap)| snap.is_terminal())
            .map(|(id, snap)| (snap.started_at, id.clone()))
            .collect();
        if finished.len() <= self.keep_finished {
            return 0;
        }
        finished.sort();
        let excess = finished.len() - self.keep_finished;
        for (_, id) in &finished[..excess] {
            slots.remove(id);
        }
        excess
    }

    /// Drop a finished batch's snapshot. Running batches are kept.
    pub fn forget(&self, id: &BatchId) -> bool {
        let mut slots = self.slots.write().expect("progress board lock poisoned");
        match slots.get(id) {
            Some(slot) if slot.load().is_terminal() => slots.remove(id).is_some(),
            _ => false,
        }
    }
}

/// Publishes a `Failed` snapshot if the walk is dropped before sealing,
/// e.g. when the worker task panics or its runtime shuts down.
struct UnsealedGuard {
    slot: Slot,
    armed: bool,
}

impl UnsealedGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UnsealedGuard {
    fn drop(&mut self) {
        if self.armed {
            let current = self.slot.load_full();
            self.slot.store(Arc::new(current.finished(BatchStatus::Failed)));
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<RadarConfig>,
    platforms: Vec<PlatformId>,
    factory: Arc<dyn AdapterFactory>,
    store: Option<Arc<dyn TopicStore>>,
    board: Arc<ProgressBoard>,
}

impl Orchestrator {
    /// Validate the configuration and build the networked adapter factory.
    pub fn new(config: RadarConfig) -> Result<Self, ConfigError> {
        let factory = HttpAdapterFactory::new(&config)?;
        Self::with_factory(config, Arc::new(factory))
    }

    pub fn with_factory(config: RadarConfig, factory: Arc<dyn AdapterFactory>) -> Result<Self, ConfigError> {
        let platforms = parse_platforms(&config.enabled_platforms)?;
        Ok(Self {
            config: Arc::new(config),
            platforms,
            factory,
            store: None,
            board: Arc::new(ProgressBoard::default()),
        })
    }

    /// Persist each platform's topics as they arrive, and the batch run
    /// record at start and at seal.
    pub fn with_store(mut self, store: Arc<dyn TopicStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bound how many finished progress snapshots stay pollable.
    pub fn with_progress_retention(mut self, keep_finished: usize) -> Self {
        self.board = Arc::new(ProgressBoard::with_capacity(keep_finished));
        self
    }

    pub fn config(&self) -> &RadarConfig {
        &self.config
    }

    pub fn platforms(&self) -> &[PlatformId] {
        &self.platforms
    }

    pub fn progress(&self, id: &BatchId) -> Option<Arc<ProgressSnapshot>> {
        self.board.get(id)
    }

    pub fn board(&self) -> &ProgressBoard {
        &self.board
    }

    /// Run every configured platform and return once the batch is sealed.
    pub async fn run_batch(&self) -> BatchReport {
        self.run(self.platforms.clone()).await
    }

    /// Same as [`run_batch`](Self::run_batch) over an explicit platform list.
    /// The list is validated before any batch exists.
    pub async fn run_batch_with<S: AsRef<str>>(&self, names: &[S]) -> Result<BatchReport, ConfigError> {
        let platforms = parse_platforms(names)?;
        Ok(self.run(platforms).await)
    }

    /// Start the batch on a background worker and return its id at once.
    pub fn spawn_batch(&self) -> BatchTicket {
        self.spawn(self.platforms.clone())
    }

    pub fn spawn_batch_with<S: AsRef<str>>(&self, names: &[S]) -> Result<BatchTicket, ConfigError> {
        let platforms = parse_platforms(names)?;
        Ok(self.spawn(platforms))
    }

    async fn run(&self, platforms: Vec<PlatformId>) -> BatchReport {
        let started_at = Utc::now();
        let (id, slot) = self.board.register(started_at, platforms.len());
        self.walk(id, started_at, platforms, slot).await
    }

    fn spawn(&self, platforms: Vec<PlatformId>) -> BatchTicket {
        let started_at = Utc::now();
        let (id, slot) = self.board.register(started_at, platforms.len());
        let this = self.clone();
        let batch_id = id.clone();
        let handle =
            tokio::spawn(async move { this.walk(batch_id, started_at, platforms, slot).await });
        BatchTicket { id, handle }
    }

    async fn walk(
        &self,
        id: BatchId,
        started_at: DateTime<Utc>,
        platforms: Vec<PlatformId>,
        slot: Slot,
    ) -> BatchReport {
        ensure_metrics_described();
        let guard = UnsealedGuard {
            slot: slot.clone(),
            armed: true,
        };
        let t0 = Instant::now();
        info!(target: "orchestrator", batch = %id, platforms = platforms.len(), "batch started");

        let mut batch = Batch::start(id.clone(), started_at);
        self.record(&batch).await;
        let mut pool: Vec<RawTopic> = Vec::new();

        for platform in platforms {
            slot.store(Arc::new(slot.load().running(platform)));

            let count = self.config.count_for(platform);
            let (outcome, topics) = self.run_adapter(platform, count).await;

            if !topics.is_empty() {
                self.persist(&id, platform, &topics).await;
            }
            counter!(ADAPTER_RUNS, "platform" => platform.as_str(), "status" => if outcome.is_success() { "success" } else { "failed" })
                .increment(1);
            counter!(TOPICS, "platform" => platform.as_str()).increment(topics.len() as u64);
            info!(
                target: "orchestrator",
                batch = %id,
                platform = %platform,
                topics = outcome.topic_count,
                ms = outcome.duration_ms,
                error = outcome.error.as_deref().unwrap_or(""),
                "platform finished"
            );

            pool.extend(topics);
            slot.store(Arc::new(slot.load().completed(outcome.clone())));
            batch.record(outcome);
        }

        batch.seal(Utc::now());
        self.record(&batch).await;
        histogram!(BATCH_DURATION_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!(BATCH_LAST_RUN_TS).set(Utc::now().timestamp() as f64);
        slot.store(Arc::new(slot.load().finished(BatchStatus::Success)));
        guard.disarm();
        self.board.prune();

        info!(
            target: "orchestrator",
            batch = %id,
            success = batch.success_count,
            failed = batch.failed_count,
            topics = batch.total_topics,
            "batch sealed"
        );
        BatchReport {
            batch,
            topics: pool,
        }
    }

    /// One platform, isolated on its own task. Never fails.
    async fn run_adapter(&self, platform: PlatformId, count: usize) -> (AdapterOutcome, Vec<RawTopic>) {
        let adapter = self.factory.build(platform);
        let t = Instant::now();
        match tokio::spawn(async move { adapter.fetch(count).await }).await {
            Ok(output) => {
                let mut topics = output.topics;
                topics.truncate(count);
                let outcome =
                    AdapterOutcome::from_fetch(platform, topics.len(), output.diagnostic, t.elapsed());
                (outcome, topics)
            }
            Err(e) => {
                warn!(target: "orchestrator", platform = %platform, error = %e, "adapter task aborted");
                (
                    AdapterOutcome::failed(platform, format!("adapter task aborted: {e}"), t.elapsed()),
                    Vec::new(),
                )
            }
        }
    }

    async fn persist(&self, id: &BatchId, platform: PlatformId, topics: &[RawTopic]) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.insert(id, topics).await {
            warn!(target: "orchestrator", batch = %id, platform = %platform, error = %e, "topic store insert failed");
        }
    }

    async fn record(&self, batch: &Batch) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.record_batch(batch).await {
            warn!(target: "orchestrator", batch = %batch.id, status = ?batch.status, error = %e, "batch record write failed");
        }
    }
}
