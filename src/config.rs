// src/config.rs
//! Static configuration: enabled platforms, per-platform counts, transport
//! settings. Read once and handed to the orchestrator as an immutable value.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::platform::PlatformId;

pub const ENV_CONFIG_PATH: &str = "RADAR_CONFIG_PATH";
pub const ENV_YOUTUBE_API_KEY: &str = "YOUTUBE_API_KEY";
pub const DEFAULT_TOML_PATH: &str = "config/radar.toml";
pub const DEFAULT_JSON_PATH: &str = "config/radar.json";

fn default_count() -> usize {
    20
}
fn default_threshold() -> usize {
    2
}
fn default_window_days() -> i64 {
    30
}
fn default_platforms() -> Vec<String> {
    vec!["hackernews".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarConfig {
    #[serde(default = "default_platforms")]
    pub enabled_platforms: Vec<String>,
    #[serde(default = "default_count")]
    pub default_count: usize,
    /// Keyed by platform id (`reddit_ai`) or family (`reddit`). Id wins.
    #[serde(default)]
    pub counts: HashMap<String, usize>,
    #[serde(default = "default_threshold")]
    pub cross_platform_threshold: usize,
    #[serde(default = "default_window_days")]
    pub dedup_window_days: i64,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub youtube_api_key: Option<String>,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            enabled_platforms: default_platforms(),
            default_count: default_count(),
            counts: HashMap::new(),
            cross_platform_threshold: default_threshold(),
            dedup_window_days: default_window_days(),
            http: HttpConfig::default(),
            youtube_api_key: None,
        }
    }
}

impl RadarConfig {
    /// Requested count for a platform: exact id, then family, then default.
    pub fn count_for(&self, platform: PlatformId) -> usize {
        self.counts
            .get(platform.as_str())
            .or_else(|| self.counts.get(platform.family()))
            .copied()
            .unwrap_or(self.default_count)
    }

    /// API key from config, falling back to `$YOUTUBE_API_KEY`.
    pub fn resolved_youtube_key(&self) -> Option<String> {
        self.youtube_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(ENV_YOUTUBE_API_KEY).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "HttpConfig::default_attempts")]
    pub max_attempts: u32,
    /// Inclusive bounds of the uniform retry delay, in milliseconds.
    #[serde(default = "HttpConfig::default_jitter")]
    pub retry_jitter_ms: [u64; 2],
    /// Accept invalid certificates and legacy negotiation. Needed for a few
    /// misconfigured origins; traffic to those hosts is not authenticated.
    #[serde(default = "HttpConfig::default_relaxed")]
    pub relaxed_tls: bool,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

impl HttpConfig {
    fn default_timeout() -> u64 {
        15
    }
    fn default_attempts() -> u32 {
        3
    }
    fn default_jitter() -> [u64; 2] {
        [500, 1500]
    }
    fn default_relaxed() -> bool {
        true
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
            max_attempts: Self::default_attempts(),
            retry_jitter_ms: Self::default_jitter(),
            relaxed_tls: Self::default_relaxed(),
            proxy: None,
        }
    }
}

/// Forward proxy per scheme. Blank entries are ignored so a half-filled
/// section never breaks direct access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub http: Option<String>,
    #[serde(default)]
    pub https: Option<String>,
}

impl ProxyConfig {
    pub fn http_url(&self) -> Option<&str> {
        self.http.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
    pub fn https_url(&self) -> Option<&str> {
        self.https.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Load from an explicit path. TOML or JSON, picked by extension.
pub fn load_from(path: &Path) -> Result<RadarConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, &ext)
}

/// Resolve config location:
/// 1) $RADAR_CONFIG_PATH
/// 2) config/radar.toml
/// 3) config/radar.json
/// 4) built-in defaults
pub fn load_default() -> Result<RadarConfig, ConfigError> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(&p);
        if !pb.exists() {
            return Err(ConfigError::Parse(format!(
                "{ENV_CONFIG_PATH} points to non-existent path {p}"
            )));
        }
        return load_from(&pb);
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    Ok(RadarConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<RadarConfig, ConfigError> {
    if hint_ext == "json" {
        return serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()));
    }
    match toml::from_str::<RadarConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| ConfigError::Parse(toml_err.to_string())),
    }
}
