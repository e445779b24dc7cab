// src/adapters/mod.rs
//! Source adapters.
//!
//! Every platform is an ordered list of strategies (one upstream request plus
//! the parser for its body) driven by [`StrategyAdapter`]. The first strategy
//! that yields at least one usable record wins; the rest are never requested.
//! Nothing in here returns an error to the caller: total failure is an empty
//! [`FetchOutput`] carrying a diagnostic.

pub mod baidu;
pub mod bilibili;
pub mod category;
pub mod hackernews;
pub mod reddit;
pub mod toutiao;
pub mod twitter;
pub mod weibo;
pub mod youtube;
pub mod youtube_api;
pub mod zhihu;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RadarConfig;
use crate::error::ConfigError;
use crate::platform::PlatformId;
use crate::telemetry::{RECORDS_SKIPPED, STRATEGY_FALLBACKS};
use crate::topic::RawTopic;
use crate::transport::{Payload, ResilientClient, UpstreamRequest};

/// What one `fetch` produced. `diagnostic` is set whenever `topics` is empty.
#[derive(Debug, Clone, Default)]
pub struct FetchOutput {
    pub topics: Vec<RawTopic>,
    pub diagnostic: Option<String>,
}

impl FetchOutput {
    pub fn found(topics: Vec<RawTopic>) -> Self {
        Self {
            topics,
            diagnostic: None,
        }
    }

    pub fn empty(diagnostic: impl Into<String>) -> Self {
        Self {
            topics: Vec::new(),
            diagnostic: Some(diagnostic.into()),
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn platform(&self) -> PlatformId;

    /// At most `count` topics, all tagged with `self.platform()`. Never fails.
    async fn fetch(&self, count: usize) -> FetchOutput;
}

/// Per-invocation context handed to a parser.
#[derive(Debug, Clone, Copy)]
pub struct ParseCtx {
    pub platform: PlatformId,
    pub observed_at: DateTime<Utc>,
}

impl ParseCtx {
    /// Fresh topic stamped with this invocation's platform and time.
    pub fn topic(&self, title: impl Into<String>, url: impl Into<String>) -> RawTopic {
        RawTopic::new(self.platform, title, url).observed(self.observed_at)
    }

    pub fn skip(&self, reason: &str) {
        counter!(RECORDS_SKIPPED, "platform" => self.platform.as_str()).increment(1);
        debug!(platform = %self.platform, reason, "skipping upstream record");
    }
}

pub type ParseFn = fn(&Payload, &ParseCtx) -> Result<Vec<RawTopic>>;

/// One (endpoint, parser) pair.
#[derive(Clone)]
pub struct Strategy {
    pub label: &'static str,
    pub request: UpstreamRequest,
    pub parse: ParseFn,
}

impl Strategy {
    pub fn new(label: &'static str, request: UpstreamRequest, parse: ParseFn) -> Self {
        Self {
            label,
            request,
            parse,
        }
    }
}

enum StrategyState {
    Trying(usize),
    Succeeded(Vec<RawTopic>),
    Exhausted,
}

pub struct StrategyAdapter {
    platform: PlatformId,
    client: ResilientClient,
    strategies: Vec<Strategy>,
    /// Set when the adapter cannot run at all (missing credentials).
    unavailable: Option<String>,
}

impl StrategyAdapter {
    pub fn new(platform: PlatformId, client: ResilientClient, strategies: Vec<Strategy>) -> Self {
        Self {
            platform,
            client,
            strategies,
            unavailable: None,
        }
    }

    /// An adapter that answers every fetch with an empty result and `reason`,
    /// without touching the network.
    pub fn unavailable(platform: PlatformId, client: ResilientClient, reason: impl Into<String>) -> Self {
        Self {
            platform,
            client,
            strategies: Vec::new(),
            unavailable: Some(reason.into()),
        }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    async fn attempt(&self, strategy: &Strategy, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
        let payload = self
            .client
            .execute(&strategy.request)
            .await
            .with_context(|| format!("{} request", strategy.label))?;
        (strategy.parse)(&payload, ctx).with_context(|| format!("{} parse", strategy.label))
    }

    /// Drop empty titles, truncate, renumber ranks, classify.
    fn finish(&self, topics: Vec<RawTopic>, count: usize) -> Vec<RawTopic> {
        topics
            .into_iter()
            .filter(|t| !t.title.trim().is_empty())
            .take(count)
            .enumerate()
            .map(|(i, mut t)| {
                t.title = t.title.trim().to_string();
                t.platform = self.platform;
                t.rank = i as u32 + 1;
                if t.category.is_none() {
                    t.category = category::classify(self.platform, &t.title);
                }
                t
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for StrategyAdapter {
    fn platform(&self) -> PlatformId {
        self.platform
    }

    async fn fetch(&self, count: usize) -> FetchOutput {
        if let Some(reason) = &self.unavailable {
            warn!(platform = %self.platform, reason = %reason, "adapter unavailable");
            return FetchOutput::empty(reason.clone());
        }
        if count == 0 {
            return FetchOutput::empty("requested count is zero");
        }

        let ctx = ParseCtx {
            platform: self.platform,
            observed_at: Utc::now(),
        };
        let mut failures: Vec<String> = Vec::new();
        let mut state = StrategyState::Trying(0);

        loop {
            state = match state {
                StrategyState::Trying(i) => match self.strategies.get(i) {
                    None => StrategyState::Exhausted,
                    Some(strategy) => match self.attempt(strategy, &ctx).await {
                        Ok(raw) => {
                            let topics = self.finish(raw, count);
                            if topics.is_empty() {
                                failures.push(format!("{}: no usable records", strategy.label));
                                counter!(STRATEGY_FALLBACKS, "platform" => self.platform.as_str())
                                    .increment(1);
                                StrategyState::Trying(i + 1)
                            } else {
                                StrategyState::Succeeded(topics)
                            }
                        }
                        Err(e) => {
                            warn!(platform = %self.platform, strategy = strategy.label, error = %format!("{e:#}"), "strategy failed");
                            failures.push(format!("{e:#}"));
                            counter!(STRATEGY_FALLBACKS, "platform" => self.platform.as_str())
                                .increment(1);
                            StrategyState::Trying(i + 1)
                        }
                    },
                },
                StrategyState::Succeeded(topics) => {
                    info!(platform = %self.platform, count = topics.len(), "adapter fetched topics");
                    return FetchOutput::found(topics);
                }
                StrategyState::Exhausted => {
                    let diagnostic = if failures.is_empty() {
                        "no strategies configured".to_string()
                    } else {
                        format!("all strategies failed: {}", failures.join("; "))
                    };
                    warn!(platform = %self.platform, diagnostic = %diagnostic, "adapter exhausted");
                    return FetchOutput::empty(diagnostic);
                }
            };
        }
    }
}

/// Builds the adapter for a platform. The orchestrator asks for a fresh one
/// per batch and platform.
pub trait AdapterFactory: Send + Sync {
    fn build(&self, platform: PlatformId) -> Box<dyn SourceAdapter>;
}

/// Factory for the real networked adapters. All adapters share one
/// connection pool; each gets its own identity.
pub struct HttpAdapterFactory {
    client: ResilientClient,
    youtube_key: Option<String>,
}

impl HttpAdapterFactory {
    pub fn new(cfg: &RadarConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: ResilientClient::new(&cfg.http)?,
            youtube_key: cfg.resolved_youtube_key(),
        })
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn build(&self, platform: PlatformId) -> Box<dyn SourceAdapter> {
        Box::new(build_adapter(
            platform,
            self.client.fork(),
            self.youtube_key.as_deref(),
        ))
    }
}

/// Closed mapping from platform to its strategy list.
pub fn build_adapter(platform: PlatformId, client: ResilientClient, youtube_key: Option<&str>) -> StrategyAdapter {
    let strategies = match platform {
        PlatformId::Weibo => weibo::strategies(),
        PlatformId::Zhihu => zhihu::strategies(),
        PlatformId::Toutiao => toutiao::strategies(),
        PlatformId::Baidu => baidu::strategies(),
        PlatformId::Bilibili => bilibili::strategies(),
        PlatformId::HackerNews => hackernews::strategies(),
        PlatformId::RedditTech | PlatformId::RedditProgramming | PlatformId::RedditAi => {
            reddit::strategies(platform)
        }
        PlatformId::TwitterTech | PlatformId::TwitterEdu => twitter::strategies(),
        PlatformId::YoutubeTech | PlatformId::YoutubeEdu => youtube::strategies(),
        PlatformId::YoutubeTechApi | PlatformId::YoutubeEduApi => match youtube_key {
            Some(key) => youtube_api::strategies(platform, key),
            None => {
                return StrategyAdapter::unavailable(
                    platform,
                    client,
                    "youtube api key not configured (set youtube_api_key or YOUTUBE_API_KEY)",
                )
            }
        },
    };
    StrategyAdapter::new(platform, client, strategies)
}

pub(crate) fn expect_json<'a>(payload: &'a Payload) -> Result<&'a Value> {
    payload
        .as_json()
        .ok_or_else(|| anyhow!("expected a json payload"))
}

pub(crate) fn expect_markup<'a>(payload: &'a Payload) -> Result<&'a str> {
    payload
        .as_markup()
        .ok_or_else(|| anyhow!("expected a markup payload"))
}

/// Non-empty, trimmed string field.
pub(crate) fn text_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// String or number field rendered as text (ids come both ways).
pub(crate) fn id_field(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn array_at<'a>(v: &'a Value, pointer: &str) -> Result<&'a Vec<Value>> {
    v.pointer(pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("missing array at {pointer}"))
}

/// `base?key=value` with the value percent-encoded.
pub(crate) fn search_url(base: &str, key: &str, value: &str) -> String {
    reqwest::Url::parse_with_params(base, &[(key, value)])
        .map(|u| u.to_string())
        .unwrap_or_else(|_| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::transport::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;

    fn offline_client() -> ResilientClient {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        ResilientClient::from_parts(
            http,
            RetryPolicy {
                max_attempts: 1,
                jitter_min: Duration::ZERO,
                jitter_max: Duration::ZERO,
            },
        )
    }

    #[test]
    fn every_platform_has_a_plan() {
        let client = ResilientClient::new(&HttpConfig::default()).unwrap();
        for p in PlatformId::ALL {
            let adapter = build_adapter(p, client.fork(), Some("k"));
            assert_eq!(adapter.platform(), p);
            assert!(!adapter.strategies().is_empty(), "{p} has no strategies");
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_a_diagnostic_not_a_request() {
        let adapter = build_adapter(PlatformId::YoutubeTechApi, offline_client(), None);
        let out = adapter.fetch(10).await;
        assert!(out.topics.is_empty());
        assert!(out.diagnostic.unwrap().contains("api key"));
    }

    #[tokio::test]
    async fn unreachable_upstream_degrades_to_empty() {
        // Port 9 on loopback is the discard port; nothing listens there.
        let adapter = StrategyAdapter::new(
            PlatformId::Baidu,
            offline_client(),
            vec![
                Strategy::new("first", UpstreamRequest::json("http://127.0.0.1:9/a"), |_, _| Ok(vec![])),
                Strategy::new("second", UpstreamRequest::json("http://127.0.0.1:9/b"), |_, _| Ok(vec![])),
            ],
        );
        let out = adapter.fetch(5).await;
        assert!(out.topics.is_empty());
        let diag = out.diagnostic.unwrap();
        assert!(diag.contains("first") && diag.contains("second"), "{diag}");
    }

    #[test]
    fn finish_truncates_and_renumbers() {
        let adapter = StrategyAdapter::new(PlatformId::RedditAi, offline_client(), vec![]);
        let now = Utc::now();
        let ctx = ParseCtx {
            platform: PlatformId::RedditAi,
            observed_at: now,
        };
        let raw = vec![
            ctx.topic("  ", "u0").ranked(7),
            ctx.topic("New LLM benchmark", "u1").ranked(9),
            ctx.topic("University course on compilers", "u2"),
            ctx.topic("third", "u3"),
        ];
        let out = adapter.finish(raw, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].rank, 1);
        assert_eq!(out[1].rank, 2);
        assert_eq!(out[0].category, Some(crate::topic::Category::Tech));
        assert_eq!(out[1].category, Some(crate::topic::Category::Education));
    }

    #[test]
    fn search_urls_are_encoded() {
        let u = search_url("https://s.weibo.com/weibo", "q", "人工智能 教育");
        assert!(u.starts_with("https://s.weibo.com/weibo?q="));
        assert!(!u.contains(' '));
    }

    #[test]
    fn id_field_accepts_numbers_and_strings() {
        let v = json!({"a": 12, "b": " x1 ", "c": ""});
        assert_eq!(id_field(&v, "a").as_deref(), Some("12"));
        assert_eq!(id_field(&v, "b").as_deref(), Some("x1"));
        assert_eq!(id_field(&v, "c"), None);
    }
}
