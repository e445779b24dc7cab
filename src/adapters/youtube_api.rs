// src/adapters/youtube_api.rs
//! YouTube Data API v3 `videos?chart=mostPopular`. The key travels in the
//! `x-goog-api-key` header so it never shows up in logged URLs.

use anyhow::{bail, Result};
use serde_json::Value;

use super::{array_at, category, expect_json, id_field, text_field, ParseCtx, Strategy};
use crate::platform::PlatformId;
use crate::topic::{hot_value_from_json, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
const SCIENCE_AND_TECHNOLOGY: u32 = 28;
const EDUCATION: u32 = 27;

fn chart_url(category_id: Option<u32>) -> String {
    let mut url = format!("{VIDEOS_URL}?part=snippet,statistics&chart=mostPopular&regionCode=US&maxResults=50");
    if let Some(id) = category_id {
        url.push_str(&format!("&videoCategoryId={id}"));
    }
    url
}

/// Category chart first, then the unfiltered chart run through the keyword filter.
pub fn strategies(platform: PlatformId, api_key: &str) -> Vec<Strategy> {
    let category_id = match platform {
        PlatformId::YoutubeEduApi => EDUCATION,
        _ => SCIENCE_AND_TECHNOLOGY,
    };
    vec![
        Strategy::new(
            "youtube api category chart",
            UpstreamRequest::json(chart_url(Some(category_id))).header("x-goog-api-key", api_key),
            parse_videos,
        ),
        Strategy::new(
            "youtube api most popular",
            UpstreamRequest::json(chart_url(None)).header("x-goog-api-key", api_key),
            parse_videos,
        ),
    ]
}

pub fn parse_videos(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    if let Some(err) = v.get("error") {
        let reason = err
            .pointer("/errors/0/reason")
            .and_then(Value::as_str)
            .or_else(|| err.get("message").and_then(Value::as_str))
            .unwrap_or("unknown");
        bail!("youtube api error: {reason}");
    }
    let items = array_at(v, "/items")?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(id) = id_field(item, "id") else {
            ctx.skip("missing id");
            continue;
        };
        let Some(snippet) = item.get("snippet") else {
            ctx.skip("missing snippet");
            continue;
        };
        let Some(title) = text_field(snippet, "title") else {
            ctx.skip("missing title");
            continue;
        };
        let description = text_field(snippet, "description").unwrap_or_default();
        if !category::admits(ctx.platform, &format!("{title} {description}")) {
            continue;
        }
        let views = item
            .pointer("/statistics/viewCount")
            .map(hot_value_from_json)
            .unwrap_or(0);
        out.push(ctx.topic(title, format!("https://www.youtube.com/watch?v={id}")).hot(views));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn ctx() -> ParseCtx {
        ParseCtx {
            platform: PlatformId::YoutubeEduApi,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn key_is_a_header_not_a_query_param() {
        let plan = strategies(PlatformId::YoutubeEduApi, "secret");
        assert!(plan[0].request.url.contains("videoCategoryId=27"));
        assert!(!plan[1].request.url.contains("videoCategoryId"));
        for s in &plan {
            assert!(!s.request.url.contains("secret"));
            assert!(s.request.headers.iter().any(|(k, v)| *k == "x-goog-api-key" && v == "secret"));
        }
    }

    #[test]
    fn videos_payload() {
        let body = Payload::Json(json!({"items": [
            {"id": "v1", "snippet": {"title": "Calculus explained", "description": "math course"}, "statistics": {"viewCount": "48213"}},
            {"id": "v2", "snippet": {"title": "Prank gone wrong", "description": ""}, "statistics": {"viewCount": "1"}},
            {"snippet": {"title": "no id"}}
        ]}));
        let topics = parse_videos(&body, &ctx()).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].hot_value, 48_213);
    }

    #[test]
    fn quota_error_fails_the_strategy() {
        let body = Payload::Json(json!({"error": {"code": 403, "errors": [{"reason": "quotaExceeded"}]}}));
        let err = parse_videos(&body, &ctx()).unwrap_err();
        assert!(err.to_string().contains("quotaExceeded"));
    }
}
