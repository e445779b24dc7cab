// src/adapters/category.rs
//! Fixed keyword vocabularies for category tagging and per-platform
//! content filters.
//!
//! ASCII keywords match on word boundaries (`ai` does not hit `detail`,
//! `war` does not hit `software`); CJK keywords match as plain substrings.

use crate::platform::PlatformId;
use crate::topic::Category;

pub struct Vocabulary(&'static [&'static str]);

pub const EDUCATION: Vocabulary = Vocabulary(&[
    "education",
    "learning",
    "school",
    "university",
    "student",
    "students",
    "teacher",
    "course",
    "tutorial",
    "study",
    "教育",
    "学习",
    "大学",
    "课程",
    "教程",
]);

pub const AI: Vocabulary = Vocabulary(&[
    "ai",
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "neural",
    "gpt",
    "chatgpt",
    "llm",
    "llms",
    "model",
    "models",
    "人工智能",
    "大模型",
]);

/// Titles Hacker News reports that are not about technology.
pub const NON_TECH: Vocabulary = Vocabulary(&[
    "politics",
    "election",
    "war",
    "religion",
    "sports",
    "celebrity",
    "gossip",
    "fashion",
    "food",
]);

/// Inclusion list for the YouTube trending feeds.
pub const TECH_OR_EDUCATION: Vocabulary = Vocabulary(&[
    "ai",
    "artificial intelligence",
    "tech",
    "technology",
    "programming",
    "code",
    "coding",
    "software",
    "hardware",
    "gadget",
    "gadgets",
    "review",
    "iphone",
    "android",
    "mac",
    "pc",
    "robot",
    "robots",
    "space",
    "nasa",
    "quantum",
    "crypto",
    "blockchain",
    "machine learning",
    "data",
    "cyber",
    "hack",
    "security",
    "gpt",
    "chatgpt",
    "llm",
    "python",
    "javascript",
    "tutorial",
    "learn",
    "course",
    "explain",
    "explained",
    "how to",
    "science",
    "physics",
    "chemistry",
    "biology",
    "math",
    "study",
    "unboxing",
    "guide",
    "setup",
    "芯片",
    "人工智能",
    "科技",
    "编程",
    "代码",
    "软件",
    "硬件",
    "手机",
    "电脑",
    "机器人",
    "太空",
    "量子",
    "区块链",
]);

impl Vocabulary {
    pub const fn new(words: &'static [&'static str]) -> Self {
        Self(words)
    }

    pub fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.0.iter().any(|kw| keyword_hit(&lowered, kw))
    }
}

fn keyword_hit(haystack: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return haystack.contains(keyword);
    }
    haystack.match_indices(keyword).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + keyword.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Category for a surviving topic, or `None` for platforms without a
/// vocabulary (the general-purpose Chinese boards).
pub fn classify(platform: PlatformId, title: &str) -> Option<Category> {
    if let Some(fixed) = platform.fixed_category() {
        return Some(fixed);
    }
    match platform {
        PlatformId::RedditTech
        | PlatformId::RedditProgramming
        | PlatformId::RedditAi
        | PlatformId::YoutubeTechApi
        | PlatformId::YoutubeEduApi => Some(if EDUCATION.matches(title) {
            Category::Education
        } else if AI.matches(title) {
            Category::Tech
        } else {
            Category::General
        }),
        _ => None,
    }
}

/// Content filter applied by parsers before a record becomes a topic.
pub fn admits(platform: PlatformId, text: &str) -> bool {
    match platform {
        PlatformId::HackerNews => !NON_TECH.matches(text),
        PlatformId::YoutubeTech
        | PlatformId::YoutubeEdu
        | PlatformId::YoutubeTechApi
        | PlatformId::YoutubeEduApi => TECH_OR_EDUCATION.matches(text),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_keywords_respect_word_boundaries() {
        assert!(AI.matches("New AI chip"));
        assert!(AI.matches("ai: the hype"));
        assert!(!AI.matches("Said detail maintained"));
        assert!(!NON_TECH.matches("Software update"));
        assert!(NON_TECH.matches("Election night"));
    }

    #[test]
    fn cjk_keywords_match_as_substrings() {
        assert!(EDUCATION.matches("人工智能教育峰会"));
        assert!(AI.matches("国产大模型发布"));
    }

    #[test]
    fn education_wins_over_ai() {
        assert_eq!(
            classify(PlatformId::RedditAi, "Machine learning course for students"),
            Some(Category::Education)
        );
        assert_eq!(
            classify(PlatformId::RedditTech, "Chip fab opens"),
            Some(Category::General)
        );
    }

    #[test]
    fn fixed_categories_and_unclassified_boards() {
        assert_eq!(classify(PlatformId::TwitterEdu, "anything"), Some(Category::Education));
        assert_eq!(classify(PlatformId::HackerNews, "anything"), Some(Category::Tech));
        assert_eq!(classify(PlatformId::Weibo, "AI"), None);
    }

    #[test]
    fn filters() {
        assert!(!admits(PlatformId::HackerNews, "Sports league adopts Rust"));
        assert!(admits(PlatformId::HackerNews, "Show HN: a tiny database"));
        assert!(admits(PlatformId::YoutubeTech, "iPhone 17 review"));
        assert!(!admits(PlatformId::YoutubeTech, "Official music video"));
        assert!(admits(PlatformId::Baidu, "anything"));
    }
}
