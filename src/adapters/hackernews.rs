// src/adapters/hackernews.rs
use anyhow::{Context, Result};
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{array_at, category, expect_json, expect_markup, id_field, text_field, ParseCtx, Strategy};
use crate::normalize::clean_markup_text;
use crate::topic::{hot_value_from_json, RawTopic};
use crate::transport::{Payload, UpstreamRequest};

const ALGOLIA_URL: &str = "https://hn.algolia.com/api/v1/search?tags=front_page&hitsPerPage=60";
const RSS_URL: &str = "https://news.ycombinator.com/rss";

pub fn strategies() -> Vec<Strategy> {
    vec![
        Strategy::new(
            "hn algolia front page",
            UpstreamRequest::json(ALGOLIA_URL),
            parse_algolia,
        ),
        Strategy::new(
            "hn rss",
            UpstreamRequest::markup(RSS_URL).referer("https://news.ycombinator.com"),
            parse_rss,
        ),
    ]
}

fn item_url(id: &str) -> String {
    format!("https://news.ycombinator.com/item?id={id}")
}

/// `hits[].{title, url, points, objectID}`; Ask/Show HN hits have no `url`.
pub fn parse_algolia(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let v = expect_json(payload)?;
    let hits = array_at(v, "/hits")?;

    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(title) = text_field(hit, "title") else {
            ctx.skip("missing title");
            continue;
        };
        if !category::admits(ctx.platform, title) {
            continue;
        }
        let url = match (text_field(hit, "url"), id_field(hit, "objectID")) {
            (Some(u), _) => u.to_string(),
            (None, Some(id)) => item_url(&id),
            (None, None) => {
                ctx.skip("missing url and id");
                continue;
            }
        };
        let hot = hit.get("points").map(hot_value_from_json).unwrap_or(0);
        out.push(ctx.topic(title, url).hot(hot));
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    comments: Option<String>,
}

/// The RSS feed carries no score, so every entry has hot value 0 and feed
/// order is the rank.
pub fn parse_rss(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let xml = expect_markup(payload)?;
    let rss: Rss = from_str(xml).context("parsing hn rss xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = it.title.as_deref().map(clean_markup_text).unwrap_or_default();
        if title.is_empty() {
            ctx.skip("missing title");
            continue;
        }
        if !category::admits(ctx.platform, &title) {
            continue;
        }
        let Some(url) = it.link.or(it.comments).filter(|u| !u.trim().is_empty()) else {
            ctx.skip("missing link");
            continue;
        };
        out.push(ctx.topic(title, url.trim()));
    }
    Ok(out)
}
