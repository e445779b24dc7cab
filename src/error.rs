// src/error.rs
//! Error types shared across the crate.
//!
//! Only `ConfigError` is ever allowed to reach the caller of a batch run.
//! `FetchError` stays inside the adapter boundary and `StoreError` is either
//! contained (topic store) or converted into a fail-closed answer (ledger).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no platforms configured")]
    NoPlatforms,

    #[error("unknown platform identifier: {0}")]
    UnknownPlatform(String),

    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("invalid proxy url {url}: {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("building http client: {0}")]
    HttpClient(String),

    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(String),
}

/// Transport-level failure as seen by an adapter.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection reset, timeout, 5xx, 429. Retried with jitter.
    #[error("transient failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// 401/403 on the final attempt, after identity rotation.
    #[error("rejected with HTTP {status} for {url}")]
    AuthRejected { url: String, status: u16 },

    /// Any other non-success status. Not retried.
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    /// Body could not be decoded into the requested shape.
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Failure reported by an external store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization: {0}")]
    Serde(#[from] serde_json::Error),
}
