// src/adapters/youtube.rs
//! Trending feed scraped from the `ytInitialData` blob embedded in the page.

use anyhow::{Context, Result};
use serde_json::Value;

use super::{category, expect_markup, text_field, ParseCtx, Strategy};
use crate::topic::{hot_value_from_text, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

const TRENDING_URL: &str = "https://www.youtube.com/feed/trending?gl=US&hl=en";
const VIDEO_KEYS: [&str; 3] = ["videoRenderer", "gridVideoRenderer", "compactVideoRenderer"];
const MAX_DEPTH: usize = 48;

pub fn strategies() -> Vec<Strategy> {
    vec![Strategy::new(
        "youtube trending page",
        UpstreamRequest::markup(TRENDING_URL).referer("https://www.youtube.com"),
        parse_trending,
    )]
}

pub fn parse_trending(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let html = expect_markup(payload)?;
    let data = extract_initial_data(html).context("ytInitialData not found in page")?;

    let mut videos = Vec::new();
    collect_video_renderers(&data, 0, &mut videos);

    let mut out = Vec::new();
    for video in videos {
        let Some(title) = renderer_text(video.get("title")) else {
            ctx.skip("missing title");
            continue;
        };
        let Some(id) = text_field(video, "videoId") else {
            ctx.skip("missing videoId");
            continue;
        };
        if !category::admits(ctx.platform, &title) {
            continue;
        }
        let views = renderer_text(video.get("viewCountText"))
            .map(|t| hot_value_from_text(&t))
            .unwrap_or(0);
        out.push(ctx.topic(title, format!("https://www.youtube.com/watch?v={id}")).hot(views));
    }
    Ok(out)
}

/// Accepts `var ytInitialData = {...};` and `window["ytInitialData"] = {...};`.
fn extract_initial_data(html: &str) -> Option<Value> {
    const MARKER: &str = "ytInitialData";
    for (pos, _) in html.match_indices(MARKER) {
        let rest = &html[pos + MARKER.len()..];
        let Some(brace) = rest.find('{') else {
            continue;
        };
        let glue = &rest[..brace];
        if !glue.contains('=')
            || !glue
                .chars()
                .all(|c| c.is_whitespace() || matches!(c, '=' | '"' | '\'' | ']'))
        {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&rest[brace..]).into_iter::<Value>();
        if let Some(Ok(v @ Value::Object(_))) = stream.next() {
            return Some(v);
        }
    }
    None
}

fn collect_video_renderers<'a>(v: &'a Value, depth: usize, out: &mut Vec<&'a Value>) {
    if depth > MAX_DEPTH {
        return;
    }
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                if VIDEO_KEYS.contains(&k.as_str()) && child.is_object() {
                    out.push(child);
                } else {
                    collect_video_renderers(child, depth + 1, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_video_renderers(item, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// `{"simpleText": ".."}` or `{"runs": [{"text": ".."}, ..]}`.
fn renderer_text(v: Option<&Value>) -> Option<String> {
    let v = v?;
    if let Some(s) = text_field(v, "simpleText") {
        return Some(s.to_string());
    }
    let joined: String = v
        .get("runs")?
        .as_array()?
        .iter()
        .filter_map(|r| r.get("text").and_then(Value::as_str))
        .collect();
    let joined = joined.trim();
    (!joined.is_empty()).then(|| joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformId;
    use chrono::Utc;

    fn ctx() -> ParseCtx {
        ParseCtx {
            platform: PlatformId::YoutubeTech,
            observed_at: Utc::now(),
        }
    }

    const PAGE: &str = r#"<html><script nonce="x">var ytInitialData = {"contents":{"twoColumnBrowseResultsRenderer":{"tabs":[{"tabRenderer":{"content":{"sectionListRenderer":{"contents":[{"itemSectionRenderer":{"contents":[
{"videoRenderer":{"videoId":"a1","title":{"runs":[{"text":"Rust in 100 seconds "},{"text":"explained"}]},"viewCountText":{"simpleText":"1,234,567 views"}}},
{"videoRenderer":{"videoId":"a2","title":{"simpleText":"Official Music Video"},"viewCountText":{"simpleText":"9,999,999 views"}}},
{"gridVideoRenderer":{"title":{"simpleText":"Quantum computing tutorial"}}},
{"compactVideoRenderer":{"videoId":"a4","title":{"simpleText":"iPhone review"}}}
]}}]}}}}]}}};</script></html>"#;

    #[test]
    fn walks_renderers_and_filters() {
        let topics = parse_trending(&Payload::Markup(PAGE.into()), &ctx()).unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].title, "Rust in 100 seconds explained");
        assert_eq!(topics[0].hot_value, 1_234_567);
        assert_eq!(topics[0].url, "https://www.youtube.com/watch?v=a1");
        assert_eq!(topics[1].hot_value, 0);
    }

    #[test]
    fn window_assignment_form() {
        let html = r#"<script>window["ytInitialData"] = {"videoRenderer":{"videoId":"z","title":{"simpleText":"AI news"}}};</script>"#;
        let topics = parse_trending(&Payload::Markup(html.into()), &ctx()).unwrap();
        assert_eq!(topics.len(), 1);
    }

    #[test]
    fn consent_page_fails_the_strategy() {
        let html = "<html>Before you continue to YouTube</html>";
        assert!(parse_trending(&Payload::Markup(html.into()), &ctx()).is_err());
    }
}
