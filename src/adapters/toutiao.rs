// src/adapters/toutiao.rs
use anyhow::Result;

use super::{array_at, expect_json, text_field, ParseCtx, Strategy};
use crate::topic::{hot_value_from_json, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

const BOARD_URL: &str = "https://www.toutiao.com/hot-event/hot-board/?origin=toutiao_pc";

pub fn strategies() -> Vec<Strategy> {
    vec![Strategy::new(
        "toutiao hot board",
        UpstreamRequest::json(BOARD_URL).referer("https://www.toutiao.com"),
        parse_board,
    )]
}

/// `data[].{Title, HotValue, Url}`; `HotValue` arrives as a numeric string.
pub fn parse_board(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    let items = array_at(v, "/data")?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(title) = text_field(item, "Title") else {
            ctx.skip("missing Title");
            continue;
        };
        let hot = item.get("HotValue").map(hot_value_from_json).unwrap_or(0);
        let url = text_field(item, "Url").unwrap_or("https://www.toutiao.com");
        out.push(ctx.topic(title, url).hot(hot));
    }
    Ok(out)
}
