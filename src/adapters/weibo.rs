// src/adapters/weibo.rs
use anyhow::{bail, Result};
use serde_json::Value;

use super::{array_at, expect_json, search_url, text_field, ParseCtx, Strategy};
use crate::topic::{hot_value_from_json, hot_value_from_text, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

const DESKTOP_URL: &str = "https://weibo.com/ajax/side/hotSearch";
const MOBILE_URL: &str = "https://m.weibo.cn/api/container/getIndex?containerid=106003type%3D25%26t%3D3%26disable_hot%3D1%26filter_type%3Drealtimehot";
const SEARCH_URL: &str = "https://s.weibo.com/weibo";

pub fn strategies() -> Vec<Strategy> {
    vec![
        Strategy::new(
            "weibo desktop hot search",
            UpstreamRequest::json(DESKTOP_URL).referer("https://weibo.com"),
            parse_desktop,
        ),
        Strategy::new(
            "weibo mobile container",
            UpstreamRequest::json(MOBILE_URL).referer("https://m.weibo.cn"),
            parse_mobile,
        ),
    ]
}

/// `{"ok":1,"data":{"realtime":[{"word","num"}]}}`; older payloads used `realpos`.
pub fn parse_desktop(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    if v.get("ok").and_then(Value::as_i64) != Some(1) {
        bail!("weibo desktop response not ok");
    }
    let items = array_at(v, "/data/realtime").or_else(|_| array_at(v, "/data/realpos"))?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(word) = text_field(item, "word") else {
            ctx.skip("missing word");
            continue;
        };
        let hot = item.get("num").map(hot_value_from_json).unwrap_or(0);
        out.push(ctx.topic(word, search_url(SEARCH_URL, "q", word)).hot(hot));
    }
    Ok(out)
}

pub fn parse_mobile(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    let group = array_at(v, "/data/cards/0/card_group")?;

    let mut out = Vec::with_capacity(group.len());
    for item in group {
        let Some(title) = text_field(item, "title_sub").or_else(|| text_field(item, "title")) else {
            ctx.skip("missing title");
            continue;
        };
        let hot = text_field(item, "desc").map(hot_value_from_text).unwrap_or(0);
        let url = text_field(item, "scheme")
            .map(str::to_string)
            .unwrap_or_else(|| search_url(SEARCH_URL, "q", title));
        out.push(ctx.topic(title, url).hot(hot));
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
            platform: PlatformId::Weibo,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn desktop_payload() {
        let body = Payload::Json(json!({
            "ok": 1,
            "data": {"realtime": [
                {"word": "人工智能", "num": 1203456},
                {"num": 5},
                {"word": "高考", "num": "-3"}
            ]}
        }));
        let topics = parse_desktop(&body, &ctx()).unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].hot_value, 1_203_456);
        assert!(topics[0].url.starts_with("https://s.weibo.com/weibo?q="));
        assert_eq!(topics[1].hot_value, 0, "negative heat clamps to zero");
    }

    #[test]
    fn desktop_not_ok_fails_the_strategy() {
        let body = Payload::Json(json!({"ok": -100, "url": "login"}));
        assert!(parse_desktop(&body, &ctx()).is_err());
    }

    #[test]
    fn mobile_payload() {
        let body = Payload::Json(json!({
            "data": {"cards": [{"card_group": [
                {"title_sub": "话题一", "desc": "热度 88万", "scheme": "sinaweibo://x"},
                {"desc": "无标题"}
            ]}]}
        }));
        let topics = parse_mobile(&body, &ctx()).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].hot_value, 880_000);
        assert_eq!(topics[0].url, "sinaweibo://x");
    }
}
