// src/adapters/reddit.rs
use anyhow::{anyhow, Result};

use super::{array_at, expect_json, text_field, ParseCtx, Strategy};
use crate::platform::PlatformId;
use crate::topic::{hot_value_from_json, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

/// Non-reddit platforms get an empty plan.
pub fn strategies(platform: PlatformId) -> Vec<Strategy> {
    let Some(sub) = platform.subreddit() else {
        return Vec::new();
    };
    vec![Strategy::new(
        "reddit hot listing",
        UpstreamRequest::json(format!(
            "https://www.reddit.com/r/{sub}/hot.json?limit=100&raw_json=1"
        ))
        .referer(format!("https://www.reddit.com/r/{sub}/"))
        .header("sec-fetch-mode", "cors"),
        parse_listing,
    )]
}

/// `data.children[].data.{title, permalink, score}`. Pinned posts are not
/// trending and are left out.
pub fn parse_listing(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    let children = array_at(v, "/data/children")
        .map_err(|_| anyhow!("not a reddit listing"))?;

    let mut out = Vec::with_capacity(children.len());
    for child in children {
        let Some(post) = child.get("data") else {
            ctx.skip("missing data");
            continue;
        };
        if post.get("stickied").and_then(|s| s.as_bool()).unwrap_or(false) {
            continue;
        }
        let Some(title) = text_field(post, "title") else {
            ctx.skip("missing title");
            continue;
        };
        let url = match text_field(post, "permalink") {
            Some(p) => format!("https://www.reddit.com{p}"),
            None => match text_field(post, "url") {
                Some(u) => u.to_string(),
                None => {
                    ctx.skip("missing permalink");
                    continue;
                }
            },
        };
        let hot = post.get("score").map(hot_value_from_json).unwrap_or(0);
        out.push(ctx.topic(title, url).hot(hot));
    }
    Ok(out)
}
