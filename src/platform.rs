// src/platform.rs
//! Closed set of known upstream platforms.
//!
//! Configuration names a platform by its identifier string; parsing that
//! string is the only place an unknown name can show up, and it becomes a
//! `ConfigError` before any batch exists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::topic::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlatformId {
    Weibo,
    Zhihu,
    Toutiao,
    Baidu,
    Bilibili,
    HackerNews,
    RedditTech,
    RedditProgramming,
    RedditAi,
    TwitterTech,
    TwitterEdu,
    YoutubeTech,
    YoutubeEdu,
    YoutubeTechApi,
    YoutubeEduApi,
}

impl PlatformId {
    pub const ALL: [PlatformId; 15] = [
        PlatformId::Weibo,
        PlatformId::Zhihu,
        PlatformId::Toutiao,
        PlatformId::Baidu,
        PlatformId::Bilibili,
        PlatformId::HackerNews,
        PlatformId::RedditTech,
        PlatformId::RedditProgramming,
        PlatformId::RedditAi,
        PlatformId::TwitterTech,
        PlatformId::TwitterEdu,
        PlatformId::YoutubeTech,
        PlatformId::YoutubeEdu,
        PlatformId::YoutubeTechApi,
        PlatformId::YoutubeEduApi,
    ];

    /// Stable identifier used in configuration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformId::Weibo => "weibo",
            PlatformId::Zhihu => "zhihu",
            PlatformId::Toutiao => "toutiao",
            PlatformId::Baidu => "baidu",
            PlatformId::Bilibili => "bilibili",
            PlatformId::HackerNews => "hackernews",
            PlatformId::RedditTech => "reddit_tech",
            PlatformId::RedditProgramming => "reddit_programming",
            PlatformId::RedditAi => "reddit_ai",
            PlatformId::TwitterTech => "twitter_tech",
            PlatformId::TwitterEdu => "twitter_edu",
            PlatformId::YoutubeTech => "youtube_tech",
            PlatformId::YoutubeEdu => "youtube_edu",
            PlatformId::YoutubeTechApi => "youtube_tech_api",
            PlatformId::YoutubeEduApi => "youtube_edu_api",
        }
    }

    /// Family key used for per-platform count lookup (`reddit`, `youtube`, ...).
    pub fn family(self) -> &'static str {
        match self {
            PlatformId::RedditTech | PlatformId::RedditProgramming | PlatformId::RedditAi => {
                "reddit"
            }
            PlatformId::TwitterTech | PlatformId::TwitterEdu => "twitter",
            PlatformId::YoutubeTech
            | PlatformId::YoutubeEdu
            | PlatformId::YoutubeTechApi
            | PlatformId::YoutubeEduApi => "youtube",
            other => other.as_str(),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PlatformId::Weibo => "Weibo",
            PlatformId::Zhihu => "Zhihu",
            PlatformId::Toutiao => "Toutiao",
            PlatformId::Baidu => "Baidu",
            PlatformId::Bilibili => "Bilibili",
            PlatformId::HackerNews => "Hacker News",
            PlatformId::RedditTech => "Reddit (r/technology)",
            PlatformId::RedditProgramming => "Reddit (r/programming)",
            PlatformId::RedditAi => "Reddit (r/artificial)",
            PlatformId::TwitterTech => "X (tech)",
            PlatformId::TwitterEdu => "X (education)",
            PlatformId::YoutubeTech => "YouTube (tech)",
            PlatformId::YoutubeEdu => "YouTube (education)",
            PlatformId::YoutubeTechApi => "YouTube API (tech)",
            PlatformId::YoutubeEduApi => "YouTube API (education)",
        }
    }

    /// Category fixed by the platform variant itself, if any.
    pub fn fixed_category(self) -> Option<Category> {
        match self {
            PlatformId::HackerNews => Some(Category::Tech),
            PlatformId::TwitterTech | PlatformId::YoutubeTech => Some(Category::Tech),
            PlatformId::TwitterEdu | PlatformId::YoutubeEdu => Some(Category::Education),
            _ => None,
        }
    }

    pub fn subreddit(self) -> Option<&'static str> {
        match self {
            PlatformId::RedditTech => Some("technology"),
            PlatformId::RedditProgramming => Some("programming"),
            PlatformId::RedditAi => Some("artificial"),
            _ => None,
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        PlatformId::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| ConfigError::UnknownPlatform(s.trim().to_string()))
    }
}

impl TryFrom<String> for PlatformId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlatformId> for String {
    fn from(p: PlatformId) -> Self {
        p.as_str().to_string()
    }
}

/// Parse a configured list of identifiers, preserving order.
pub fn parse_platforms<S: AsRef<str>>(names: &[S]) -> Result<Vec<PlatformId>, ConfigError> {
    if names.is_empty() {
        return Err(ConfigError::NoPlatforms);
    }
    names.iter().map(|n| n.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_round_trip_and_are_case_insensitive() {
        for p in PlatformId::ALL {
            assert_eq!(p.as_str().parse::<PlatformId>().unwrap(), p);
        }
        assert_eq!(
            " HackerNews ".parse::<PlatformId>().unwrap(),
            PlatformId::HackerNews
        );
    }

    #[test]
    fn unknown_identifier_is_config_error() {
        let err = "myspace".parse::<PlatformId>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlatform(ref n) if n == "myspace"));
    }

    #[test]
    fn empty_list_is_rejected() {
        let none: Vec<String> = vec![];
        assert!(matches!(parse_platforms(&none), Err(ConfigError::NoPlatforms)));
    }

    #[test]
    fn families_group_variants() {
        assert_eq!(PlatformId::RedditAi.family(), "reddit");
        assert_eq!(PlatformId::YoutubeEduApi.family(), "youtube");
        assert_eq!(PlatformId::Baidu.family(), "baidu");
    }
}
