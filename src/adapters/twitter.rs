// src/adapters/twitter.rs
//! X trends scraped from public markup. The pages are mostly client-rendered,
//! so the parser first looks for embedded `"trends": [...]` JSON and only
//! then falls back to hashtag and name patterns, which need a junk filter.

use std::collections::HashSet;

use anyhow::Result;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use super::category::Vocabulary;
use super::{expect_markup, search_url, ParseCtx, Strategy};
use crate::normalize::clean_markup_text;
use crate::topic::RawTopic;
use crate::transport::{Payload, UpstreamRequest};

const SEARCH_URL: &str = "https://x.com/search";

const JUNK: Vocabulary = Vocabulary::new(&[
    "script", "error", "failure", "load", "loading", "undefined", "null", "function", "object",
    "return", "var", "div", "span", "class", "style", "width", "height", "错误", "失败", "加载",
    "脚本",
]);

pub fn strategies() -> Vec<Strategy> {
    [
        ("x trends page", "https://x.com/i/trends"),
        ("x home page", "https://x.com"),
        ("x explore page", "https://x.com/explore"),
    ]
    .into_iter()
    .map(|(label, url)| {
        Strategy::new(
            label,
            UpstreamRequest::markup(url).referer("https://x.com"),
            parse_markup,
        )
    })
    .collect()
}

pub fn parse_markup(payload: &Payload, ctx: &ParseCtx) -> Result<Vec<RawTopic>> {
    let html = expect_markup(payload)?;
    let mut names = trends_from_embedded_json(html);
    if names.is_empty() {
        names = trends_from_patterns(html);
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let name = clean_markup_text(&name);
        if !is_plausible_trend(&name) {
            ctx.skip("junk trend token");
            continue;
        }
        if !seen.insert(name.clone()) {
            continue;
        }
        let url = format!("{}&src=trend", search_url(SEARCH_URL, "q", &name));
        out.push(ctx.topic(name, url));
    }
    Ok(out)
}

/// Names from every `"trends": [...]` array found in the document.
fn trends_from_embedded_json(html: &str) -> Vec<String> {
    const KEY: &str = "\"trends\"";
    let mut names = Vec::new();
    for (pos, _) in html.match_indices(KEY) {
        let Some(rest) = html[pos + KEY.len()..].trim_start().strip_prefix(':') else {
            continue;
        };
        let mut stream = serde_json::Deserializer::from_str(rest.trim_start()).into_iter::<Value>();
        if let Some(Ok(Value::Array(items))) = stream.next() {
            for item in &items {
                let name = item
                    .get("name")
                    .or_else(|| item.pointer("/trend/name"))
                    .and_then(Value::as_str);
                if let Some(name) = name {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

fn trends_from_patterns(html: &str) -> Vec<String> {
    static RE_HASHTAG_LINK: OnceCell<Regex> = OnceCell::new();
    static RE_TREND_NAME: OnceCell<Regex> = OnceCell::new();
    static RE_NAME: OnceCell<Regex> = OnceCell::new();
    static RE_HASHTAG: OnceCell<Regex> = OnceCell::new();
    let re_link = RE_HASHTAG_LINK.get_or_init(|| {
        Regex::new(r#"(?i)<a[^>]*href="/hashtag/[^"]+"[^>]*>\s*<span[^>]*>([^<]+)</span>"#).unwrap()
    });
    let re_trend_name =
        RE_TREND_NAME.get_or_init(|| Regex::new(r#""trend_name"\s*:\s*"([^"]+)""#).unwrap());
    let re_name = RE_NAME.get_or_init(|| Regex::new(r#""name"\s*:\s*"([^"]{3,50})""#).unwrap());
    let re_hashtag = RE_HASHTAG.get_or_init(|| Regex::new(r"#(\w{3,})").unwrap());

    let mut names: Vec<String> = Vec::new();
    for re in [re_link, re_trend_name, re_name] {
        names.extend(re.captures_iter(html).map(|c| c[1].to_string()));
    }
    let text = strip_styles(html);
    for caps in re_hashtag.captures_iter(&text) {
        let Some(whole) = caps.get(0) else { continue };
        let before = text[..whole.start()].chars().next_back();
        // `&#x27;` and friends
        if before == Some('&') {
            continue;
        }
        let tag = &caps[1];
        if tag.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        // fill="#fff", url(#a1b2c3): attribute or css values, not hashtags
        if tag.chars().all(|c| c.is_ascii_hexdigit()) && matches!(before, Some('"' | '\'' | '=' | ':' | '(')) {
            continue;
        }
        names.push(format!("#{tag}"));
    }
    names
}

/// Remove `<style>` blocks and `style="..."` attributes.
fn strip_styles(html: &str) -> std::borrow::Cow<'_, str> {
    static RE_STYLE: OnceCell<Regex> = OnceCell::new();
    let re = RE_STYLE.get_or_init(|| {
        Regex::new(r#"(?is)<style\b.*?</style>|\bstyle\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap()
    });
    re.replace_all(html, " ")
}

fn is_plausible_trend(name: &str) -> bool {
    let len = name.chars().count();
    len > 2
        && len < 100
        && !name.starts_with("http")
        && !name.starts_with("//")
        && name.matches(' ').count() < 10
        && !JUNK.matches(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformId;
    use chrono::Utc;

    fn ctx() -> ParseCtx {
        ParseCtx {
            platform: PlatformId::TwitterTech,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn embedded_trends_json_wins() {
        let html = r##"<html><script>window.__STATE__={"x":{"trends":[{"name":"#RustConf"},{"name":"OpenAI"},{"name":"#RustConf"}],"y":1}};</script>
<a href="/hashtag/Ignored"><span>#Ignored</span></a></html>"##;
        let topics = parse_markup(&Payload::Markup(html.into()), &ctx()).unwrap();
        let titles: Vec<_> = topics.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["#RustConf", "OpenAI"]);
        assert!(topics[0].url.starts_with("https://x.com/search?q="));
        assert!(topics[0].url.ends_with("&src=trend"));
        assert!(topics.iter().all(|t| t.hot_value == 0));
    }

    #[test]
    fn falls_back_to_patterns_and_drops_junk() {
        let html = r##"<style>.a{color:#1da1f2}</style>
<a href="/hashtag/EdTech?src=trend" class="t"><span class="s">#EdTech</span></a>
<p>Don&#x27;t miss #MachineLearning and #123456</p>
<script>{"name":"undefined function"}</script>"##;
        let topics = parse_markup(&Payload::Markup(html.into()), &ctx()).unwrap();
        let titles: Vec<_> = topics.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["#EdTech", "#MachineLearning"]);
    }

    #[test]
    fn hex_looking_hashtags_survive_outside_styles() {
        let html = r##"<div style="border:1px solid #BBC"></div>
<svg><path fill="#fff"/></svg>
<p>Trending: #BBC #Cafe and #Decade</p>"##;
        let topics = parse_markup(&Payload::Markup(html.into()), &ctx()).unwrap();
        let titles: Vec<_> = topics.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["#BBC", "#Cafe", "#Decade"]);
    }

    #[test]
    fn login_wall_yields_nothing() {
        let html = "<html><body>Log in to X</body></html>";
        let topics = parse_markup(&Payload::Markup(html.into()), &ctx()).unwrap();
        assert!(topics.is_empty());
    }

    #[test]
    fn three_pages_are_tried_in_order() {
        let plan = strategies();
        assert_eq!(plan.len(), 3);
        assert!(plan[0].request.url.ends_with("/i/trends"));
        assert!(plan[2].request.url.ends_with("/explore"));
    }
}
