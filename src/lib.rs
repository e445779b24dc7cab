// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod adapters;
pub mod aggregate;
pub mod batch;
pub mod config;
pub mod error;
pub mod ledger;
pub mod normalize;
pub mod orchestrator;
pub mod platform;
pub mod selection;
pub mod store;
pub mod telemetry;
pub mod topic;
pub mod transport;

// ---- Re-exports for stable public API ----
pub use crate::adapters::{AdapterFactory, FetchOutput, HttpAdapterFactory, SourceAdapter};
pub use crate::aggregate::{Aggregator, CrossPlatformTopic, PlatformGroup, Summary};
pub use crate::batch::{AdapterOutcome, Batch, BatchId, BatchStatus, OutcomeStatus, ProgressSnapshot};
pub use crate::config::RadarConfig;
pub use crate::error::{ConfigError, FetchError, StoreError};
pub use crate::ledger::{UsageStore, UsageTracker};
pub use crate::orchestrator::{BatchReport, BatchTicket, Orchestrator};
pub use crate::platform::PlatformId;
pub use crate::selection::{ContentGenerator, GenerationRequest};
pub use crate::store::{MemoryTopicStore, TopicStore};
pub use crate::topic::{Category, RawTopic};
pub use crate::transport::ResilientClient;
