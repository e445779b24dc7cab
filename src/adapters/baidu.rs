// src/adapters/baidu.rs
use anyhow::Result;
use serde_json::Value;

use super::{array_at, expect_json, search_url, text_field, ParseCtx, Strategy};
use crate::topic::{hot_value_from_json, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

const BOARD_URL: &str = "https://top.baidu.com/api/board?platform=wise&tab=realtime";
const SEARCH_URL: &str = "https://www.baidu.com/s";

pub fn strategies() -> Vec<Strategy> {
    vec![Strategy::new(
        "baidu realtime board",
        UpstreamRequest::json(BOARD_URL).referer("https://top.baidu.com/board"),
        parse_board,
    )]
}

/// `data.cards[0].content[]`. The wise layout sometimes wraps the list one
/// level deeper (`content[0].content[]`).
pub fn parse_board(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    let mut items = array_at(v, "/data/cards/0/content")?;
    if let Some(inner) = items
        .first()
        .filter(|first| first.get("word").is_none())
        .and_then(|first| first.get("content"))
        .and_then(Value::as_array)
    {
        items = inner;
    }

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(word) = text_field(item, "word").or_else(|| text_field(item, "query")) else {
            ctx.skip("missing word");
            continue;
        };
        let hot = item.get("hotScore").map(hot_value_from_json).unwrap_or(0);
        let url = text_field(item, "url")
            .map(str::to_string)
            .unwrap_or_else(|| search_url(SEARCH_URL, "wd", word));
        out.push(ctx.topic(word, url).hot(hot));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformId;
    use chrono::Utc;
    use serde_json::json;

    fn ctx() -> ParseCtx {
        ParseCtx {
            platform: PlatformId::Baidu,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn flat_layout() {
        let body = Payload::Json(json!({"data": {"cards": [{"content": [
            {"word": "热搜一", "hotScore": "4955032"},
            {"word": "热搜二"}
        ]}]}}));
        let topics = parse_board(&body, &ctx()).unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].hot_value, 4_955_032);
        assert!(topics[1].url.starts_with("https://www.baidu.com/s?wd="));
    }

    #[test]
    fn nested_layout() {
        let body = Payload::Json(json!({"data": {"cards": [{"content": [
            {"content": [{"word": "内层", "hotScore": 7}]}
        ]}]}}));
        let topics = parse_board(&body, &ctx()).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].title, "内层");
    }
}
