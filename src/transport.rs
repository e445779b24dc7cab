// src/transport.rs
//! Resilience client shared by every networked adapter.
//!
//! - identity rotation: one user-agent from a fixed pool, swapped on 401/403
//! - relaxed TLS for legacy origins (opt-out via config)
//! - optional forward proxy per scheme
//! - bounded retries with a uniform jittered delay
//! - JSON or markup decoding with charset detection

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use metrics::counter;
use once_cell::sync::OnceCell;
use rand::Rng;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::error::{ConfigError, FetchError};
use crate::telemetry::{HTTP_RETRIES, IDENTITY_ROTATIONS};

pub const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

const ACCEPT_JSON: &str = "application/json, text/plain, */*";
const ACCEPT_MARKUP: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANG: &str = "zh-CN,zh;q=0.9,en;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            jitter_min: Duration::from_millis(500),
            jitter_max: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &HttpConfig) -> Result<Self, ConfigError> {
        let [lo, hi] = cfg.retry_jitter_ms;
        if cfg.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        if lo > hi {
            return Err(ConfigError::InvalidRetryPolicy(format!(
                "retry_jitter_ms lower bound {lo} exceeds upper bound {hi}"
            )));
        }
        Ok(Self {
            max_attempts: cfg.max_attempts,
            jitter_min: Duration::from_millis(lo),
            jitter_max: Duration::from_millis(hi),
        })
    }

    /// Uniform sample from `[jitter_min, jitter_max]`.
    pub fn delay(&self) -> Duration {
        let lo = self.jitter_min.as_millis() as u64;
        let hi = self.jitter_max.as_millis() as u64;
        if hi <= lo {
            return self.jitter_min;
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

/// How the adapter wants the body handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Json,
    Markup,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Json(serde_json::Value),
    Markup(String),
}

impl Payload {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Markup(_) => None,
        }
    }

    pub fn as_markup(&self) -> Option<&str> {
        match self {
            Payload::Markup(s) => Some(s),
            Payload::Json(_) => None,
        }
    }
}

/// One upstream GET.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    pub referer: Option<String>,
    pub mode: BodyMode,
    pub headers: Vec<(&'static str, String)>,
}

impl UpstreamRequest {
    pub fn json(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: None,
            mode: BodyMode::Json,
            headers: Vec::new(),
        }
    }

    pub fn markup(url: impl Into<String>) -> Self {
        Self {
            mode: BodyMode::Markup,
            ..Self::json(url)
        }
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// HTTP client wrapper. Cheap to clone via `fork`; each fork carries its
/// own identity so one adapter's rotation does not affect another's.
#[derive(Debug)]
pub struct ResilientClient {
    http: reqwest::Client,
    policy: RetryPolicy,
    agent: AtomicUsize,
    rotations: AtomicUsize,
}

impl ResilientClient {
    pub fn new(cfg: &HttpConfig) -> Result<Self, ConfigError> {
        let policy = RetryPolicy::from_config(cfg)?;

        let mut builder = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .connect_timeout(cfg.timeout().min(Duration::from_secs(10)))
            .gzip(true)
            .brotli(true)
            .danger_accept_invalid_certs(cfg.relaxed_tls);

        if let Some(proxy) = &cfg.proxy {
            if let Some(url) = proxy.http_url() {
                let p = reqwest::Proxy::http(url).map_err(|e| ConfigError::InvalidProxy {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
                builder = builder.proxy(p);
            }
            if let Some(url) = proxy.https_url() {
                let p = reqwest::Proxy::https(url).map_err(|e| ConfigError::InvalidProxy {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
                builder = builder.proxy(p);
            }
        }

        let http = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self::from_parts(http, policy))
    }

    pub fn from_parts(http: reqwest::Client, policy: RetryPolicy) -> Self {
        Self {
            http,
            policy,
            agent: AtomicUsize::new(rand::rng().random_range(0..USER_AGENTS.len())),
            rotations: AtomicUsize::new(0),
        }
    }

    /// New handle on the same connection pool with a freshly picked identity.
    pub fn fork(&self) -> Self {
        Self::from_parts(self.http.clone(), self.policy)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn current_agent(&self) -> &'static str {
        USER_AGENTS[self.agent.load(Ordering::Relaxed) % USER_AGENTS.len()]
    }

    /// Number of identity rotations performed by this handle.
    pub fn rotations(&self) -> usize {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Switch to a different user-agent from the pool.
    fn rotate_identity(&self) {
        let current = self.agent.load(Ordering::Relaxed) % USER_AGENTS.len();
        let step = rand::rng().random_range(1..USER_AGENTS.len());
        self.agent
            .store((current + step) % USER_AGENTS.len(), Ordering::Relaxed);
        self.rotations.fetch_add(1, Ordering::Relaxed);
        counter!(IDENTITY_ROTATIONS).increment(1);
    }

    pub async fn get_json(&self, url: &str, referer: Option<&str>) -> Result<serde_json::Value, FetchError> {
        let mut req = UpstreamRequest::json(url);
        req.referer = referer.map(str::to_string);
        match self.execute(&req).await? {
            Payload::Json(v) => Ok(v),
            Payload::Markup(_) => Err(FetchError::Malformed {
                url: url.to_string(),
                reason: "expected a json body".into(),
            }),
        }
    }

    pub async fn get_markup(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        let mut req = UpstreamRequest::markup(url);
        req.referer = referer.map(str::to_string);
        match self.execute(&req).await? {
            Payload::Markup(s) => Ok(s),
            Payload::Json(v) => Ok(v.to_string()),
        }
    }

    /// Run one request under the retry policy.
    ///
    /// 401/403 rotates identity and retries; connection errors, timeouts, 429
    /// and 5xx retry after a jittered delay. The final attempt's failure is
    /// returned as-is. Other statuses and undecodable bodies fail immediately.
    pub async fn execute(&self, req: &UpstreamRequest) -> Result<Payload, FetchError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_err: Option<FetchError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.policy.delay();
                counter!(HTTP_RETRIES).increment(1);
                debug!(url = %req.url, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::time::sleep(delay).await;
            }
            let is_last = attempt + 1 == attempts;

            let mut rb = self
                .http
                .get(&req.url)
                .header(USER_AGENT, self.current_agent())
                .header(ACCEPT_LANGUAGE, ACCEPT_LANG)
                .header(
                    ACCEPT,
                    match req.mode {
                        BodyMode::Json => ACCEPT_JSON,
                        BodyMode::Markup => ACCEPT_MARKUP,
                    },
                );
            if let Some(referer) = &req.referer {
                rb = rb.header(REFERER, referer.as_str());
            }
            for (name, value) in &req.headers {
                rb = rb.header(*name, value.as_str());
            }

            let resp = match rb.send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(url = %req.url, attempt = attempt + 1, error = %e, "upstream request failed");
                    last_err = Some(FetchError::Transient {
                        url: req.url.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                warn!(url = %req.url, attempt = attempt + 1, status = status.as_u16(), "rejected upstream");
                self.rotate_identity();
                if is_last {
                    return Err(FetchError::AuthRejected {
                        url: req.url.clone(),
                        status: status.as_u16(),
                    });
                }
                continue;
            }
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                warn!(url = %req.url, attempt = attempt + 1, status = status.as_u16(), "transient upstream status");
                last_err = Some(FetchError::Transient {
                    url: req.url.clone(),
                    reason: format!("HTTP {}", status.as_u16()),
                });
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Http {
                    url: req.url.clone(),
                    status: status.as_u16(),
                });
            }

            match decode_response(resp, req).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_transient() => {
                    warn!(url = %req.url, attempt = attempt + 1, error = %e, "body read failed");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| FetchError::Transient {
            url: req.url.clone(),
            reason: "no attempt completed".into(),
        }))
    }
}

async fn decode_response(resp: reqwest::Response, req: &UpstreamRequest) -> Result<Payload, FetchError> {
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = resp.bytes().await.map_err(|e| FetchError::Transient {
        url: req.url.clone(),
        reason: e.to_string(),
    })?;
    let text = decode_text(&bytes, content_type.as_deref());

    match req.mode {
        BodyMode::Markup => Ok(Payload::Markup(text)),
        BodyMode::Json => serde_json::from_str(text.trim_start_matches('\u{feff}'))
            .map(Payload::Json)
            .map_err(|e| FetchError::Malformed {
                url: req.url.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Decode a body using, in order: BOM, `Content-Type` charset, a
/// `<meta charset>` declaration near the top, then UTF-8.
pub fn decode_text(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .or_else(|| sniff_meta_charset(bytes))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn charset_from_content_type(ct: &str) -> Option<String> {
    ct.split(';')
        .map(str::trim)
        .find_map(|part| {
            let (k, v) = part.split_once('=')?;
            k.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| v.trim().trim_matches('"').to_string())
        })
        .filter(|s| !s.is_empty())
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    static RE_META: OnceCell<Regex> = OnceCell::new();
    let re = RE_META.get_or_init(|| {
        Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-:]+)"#).unwrap()
    });
    let head = &bytes[..bytes.len().min(2048)];
    let head = String::from_utf8_lossy(head);
    re.captures(&head).map(|c| c[1].to_string())
}
