// src/adapters/zhihu.rs
use anyhow::Result;

use super::{array_at, expect_json, id_field, text_field, ParseCtx, Strategy};
use crate::topic::{hot_value_from_json, hot_value_from_text, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

const DESKTOP_URL: &str = "https://www.zhihu.com/api/v3/feed/topstory/hot-lists/total?limit=50";
const MOBILE_URL: &str = "https://m.zhihu.com/api/v4/questions/hot";

pub fn strategies() -> Vec<Strategy> {
    vec![
        Strategy::new(
            "zhihu desktop hot list",
            UpstreamRequest::json(DESKTOP_URL).referer("https://www.zhihu.com/hot"),
            parse_desktop,
        ),
        Strategy::new(
            "zhihu mobile hot questions",
            UpstreamRequest::json(MOBILE_URL).referer("https://m.zhihu.com"),
            parse_mobile,
        ),
    ]
}

fn question_url(id: Option<String>) -> String {
    match id {
        Some(id) => format!("https://www.zhihu.com/question/{id}"),
        None => "https://www.zhihu.com/hot".to_string(),
    }
}

/// `data[].target.{title,id}` with heat in `detail_text` ("382 万热度").
pub fn parse_desktop(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    let items = array_at(v, "/data")?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(target) = item.get("target") else {
            ctx.skip("missing target");
            continue;
        };
        let Some(title) = text_field(target, "title") else {
            ctx.skip("missing title");
            continue;
        };
        let hot = text_field(item, "detail_text").map(hot_value_from_text).unwrap_or(0);
        out.push(ctx.topic(title, question_url(id_field(target, "id"))).hot(hot));
    }
    Ok(out)
}

pub fn parse_mobile(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    let items = array_at(v, "/data")?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(title) = text_field(item, "title") else {
            ctx.skip("missing title");
            continue;
        };
        let hot = item.get("hotness").map(hot_value_from_json).unwrap_or(0);
        out.push(ctx.topic(title, question_url(id_field(item, "id"))).hot(hot));
    }
    Ok(out)
}
