// src/normalize.rs
//! Title normalization used as the dedup and correlation key.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Case fold, strip punctuation, collapse whitespace.
///
/// Punctuation is any Unicode `P*` character except `#`, so CJK marks
/// (`。！？，、`) go the same way as ASCII ones while hashtags stay intact.
/// Symbols (`$`, `+`) are not punctuation and are kept. The result is idempotent:
/// `normalize_title(normalize_title(x)) == normalize_title(x)`.
pub fn normalize_title(title: &str) -> String {
    static RE_PUNCT: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_punct = RE_PUNCT.get_or_init(|| Regex::new(r"[\p{P}--#]+").unwrap());
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let lowered = title.to_lowercase();
    let stripped = re_punct.replace_all(&lowered, "");
    re_ws.replace_all(stripped.trim(), " ").trim().to_string()
}

/// Decode HTML entities and drop tags from text scraped out of markup.
pub fn clean_markup_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let decoded = html_escape::decode_html_entities(s).to_string();
    let no_tags = re_tags.replace_all(&decoded, "");
    re_ws.replace_all(no_tags.trim(), " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_whitespace_and_punctuation_insensitive() {
        assert_eq!(normalize_title("AI Learning!"), normalize_title("ai learning"));
        assert_eq!(normalize_title("  AI   Learning  "), "ai learning");
        assert_eq!(normalize_title("Rust, 2.0?"), "rust 20");
    }

    #[test]
    fn cjk_punctuation_and_fullwidth_space() {
        assert_eq!(normalize_title("人工智能　教育！"), "人工智能 教育");
        assert_eq!(normalize_title("你好，世界。"), "你好世界");
    }

    #[test]
    fn idempotent() {
        for s in ["Hello,  World!!", "  #RustLang  rocks ", "¿Qué pasa?", ""] {
            let once = normalize_title(s);
            assert_eq!(normalize_title(&once), once);
        }
    }

    #[test]
    fn hashtags_survive() {
        assert_eq!(normalize_title("#RustLang"), "#rustlang");
    }

    #[test]
    fn markup_text_is_decoded_and_untagged() {
        assert_eq!(
            clean_markup_text("<b>Hello&nbsp;&amp;</b>   world"),
            "Hello & world"
        );
    }
}
