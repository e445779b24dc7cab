use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;

use topic_radar::adapters::{hackernews, weibo, SourceAdapter, Strategy, StrategyAdapter};
use topic_radar::transport::{ResilientClient, RetryPolicy, UpstreamRequest};
use topic_radar::{Category, PlatformId};

const WEIBO_MOBILE: &str = include_str!("fixtures/weibo_mobile.json");
const HN_RSS: &str = include_str!("fixtures/hn_rss.xml");

type Counter = Arc<AtomicUsize>;

async fn forbidden(State(hits): State<Counter>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::FORBIDDEN
}

async fn not_ok(State(hits): State<Counter>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    axum::Json(json!({"ok": 0, "msg": "login required"})).into_response()
}

async fn weibo_mobile(State(hits): State<Counter>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "application/json; charset=utf-8")], WEIBO_MOBILE).into_response()
}

async fn hn_rss(State(hits): State<Counter>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")], HN_RSS).into_response()
}

async fn mock_upstream(hits: &Counter) -> String {
    let app = Router::new()
        .route("/forbidden", get(forbidden))
        .route("/weibo/desktop", get(not_ok))
        .route("/weibo/mobile", get(weibo_mobile))
        .route("/hn/rss", get(hn_rss))
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(attempts: u32) -> ResilientClient {
    let policy = RetryPolicy {
        max_attempts: attempts,
        jitter_min: Duration::from_millis(1),
        jitter_max: Duration::from_millis(3),
    };
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    ResilientClient::from_parts(http, policy)
}

#[tokio::test]
async fn every_strategy_blocked_yields_empty_with_diagnostic() {
    let hits = Counter::default();
    let base = mock_upstream(&hits).await;
    let adapter = StrategyAdapter::new(
        PlatformId::Weibo,
        client(2),
        vec![
            Strategy::new("desktop", UpstreamRequest::json(format!("{base}/forbidden")), weibo::parse_desktop),
            Strategy::new("mobile", UpstreamRequest::json(format!("{base}/forbidden")), weibo::parse_mobile),
        ],
    );

    let out = adapter.fetch(10).await;
    assert!(out.topics.is_empty());
    let diagnostic = out.diagnostic.expect("empty result carries a diagnostic");
    assert!(diagnostic.contains("desktop"), "{diagnostic}");
    assert!(diagnostic.contains("mobile"), "{diagnostic}");
    assert_eq!(hits.load(Ordering::SeqCst), 4, "two attempts per strategy");
    assert_eq!(adapter.client().rotations(), 4);
}

#[tokio::test]
async fn falls_through_to_the_next_strategy() {
    let hits = Counter::default();
    let base = mock_upstream(&hits).await;
    let adapter = StrategyAdapter::new(
        PlatformId::Weibo,
        client(1),
        vec![
            Strategy::new("desktop", UpstreamRequest::json(format!("{base}/weibo/desktop")), weibo::parse_desktop),
            Strategy::new("mobile", UpstreamRequest::json(format!("{base}/weibo/mobile")), weibo::parse_mobile),
        ],
    );

    let out = adapter.fetch(10).await;
    assert!(out.diagnostic.is_none());
    let titles: Vec<_> = out.topics.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["国产大模型发布", "春季招聘开启", "航天发射成功"]);
    let ranks: Vec<_> = out.topics.iter().map(|t| t.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(out.topics[0].hot_value, 125_000);
    assert_eq!(out.topics[1].hot_value, 3_200);
    assert_eq!(out.topics[2].hot_value, 100_000_000);
    assert!(out.topics.iter().all(|t| t.platform == PlatformId::Weibo));
    assert!(out.topics[2].url.contains("s.weibo.com"));
}

#[tokio::test]
async fn count_caps_the_result() {
    let hits = Counter::default();
    let base = mock_upstream(&hits).await;
    let adapter = StrategyAdapter::new(
        PlatformId::Weibo,
        client(1),
        vec![Strategy::new("mobile", UpstreamRequest::json(format!("{base}/weibo/mobile")), weibo::parse_mobile)],
    );

    let out = adapter.fetch(2).await;
    assert_eq!(out.topics.len(), 2);
    assert!(adapter.fetch(0).await.topics.is_empty());
}

#[tokio::test]
async fn hn_rss_fallback_keeps_only_tech_titles() {
    let hits = Counter::default();
    let base = mock_upstream(&hits).await;
    let adapter = StrategyAdapter::new(
        PlatformId::HackerNews,
        client(1),
        vec![
            Strategy::new("algolia", UpstreamRequest::json(format!("{base}/forbidden")), hackernews::parse_algolia),
            Strategy::new("rss", UpstreamRequest::markup(format!("{base}/hn/rss")), hackernews::parse_rss),
        ],
    );

    let out = adapter.fetch(10).await;
    let titles: Vec<_> = out.topics.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Writing a garbage collector in Rust",
            "Show HN: Postgres & SQLite side by side",
            "Ask HN: How do you review large diffs?",
        ]
    );
    assert_eq!(out.topics[2].url, "https://news.ycombinator.com/item?id=1004");
    assert!(out.topics.iter().all(|t| t.hot_value == 0));
    assert!(out.topics.iter().all(|t| t.category == Some(Category::Tech)));
}
