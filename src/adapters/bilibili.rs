// src/adapters/bilibili.rs
use anyhow::{bail, Result};
use serde_json::Value;

use super::{array_at, expect_json, id_field, text_field, ParseCtx, Strategy};
use crate::topic::{hot_value_from_json, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

const POPULAR_URL: &str = "https://api.bilibili.com/x/web-interface/popular?ps=50";

pub fn strategies() -> Vec<Strategy> {
    vec![Strategy::new(
        "bilibili popular",
        UpstreamRequest::json(POPULAR_URL).referer("https://www.bilibili.com"),
        parse_popular,
    )]
}

/// `{"code":0,"data":{"list":[{"title","bvid","aid","stat":{"view"}}]}}`
pub fn parse_popular(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    match v.get("code").and_then(Value::as_i64) {
        Some(0) => {}
        other => bail!("bilibili returned code {other:?}"),
    }
    let items = array_at(v, "/data/list")?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(title) = text_field(item, "title") else {
            ctx.skip("missing title");
            continue;
        };
        let url = match (text_field(item, "bvid"), id_field(item, "aid")) {
            (Some(bvid), _) => format!("https://www.bilibili.com/video/{bvid}"),
            (None, Some(aid)) => format!("https://www.bilibili.com/video/av{aid}"),
            (None, None) => {
                ctx.skip("missing video id");
                continue;
            }
        };
        let hot = item.pointer("/stat/view").map(hot_value_from_json).unwrap_or(0);
        out.push(ctx.topic(title, url).hot(hot));
    }
    Ok(out)
}
