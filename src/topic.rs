// src/topic.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::PlatformId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tech,
    Education,
    General,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tech => "tech",
            Category::Education => "education",
            Category::General => "general",
        }
    }
}

/// One trending item as reported by a single adapter.
///
/// Created once per fetch and never mutated afterwards. `hot_value` is on the
/// source's own popularity scale and is 0 when the source does not expose one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTopic {
    pub title: String,
    /// 1-based position in the list the adapter emitted.
    pub rank: u32,
    pub hot_value: u64,
    pub url: String,
    pub platform: PlatformId,
    pub category: Option<Category>,
    pub observed_at: DateTime<Utc>,
}

impl RawTopic {
    pub fn new(platform: PlatformId, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rank: 0,
            hot_value: 0,
            url: url.into(),
            platform,
            category: None,
            observed_at: Utc::now(),
        }
    }

    pub fn hot(mut self, hot_value: u64) -> Self {
        self.hot_value = hot_value;
        self
    }

    pub fn ranked(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    pub fn category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn observed(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }
}

/// Resolve an upstream popularity field into a non-negative integer.
///
/// Accepts JSON numbers (negative and NaN clamp to 0), numeric strings with
/// thousands separators, and CJK magnitude suffixes (`万`, `亿`). Anything
/// unrecognised resolves to 0.
pub fn hot_value_from_json(v: &serde_json::Value) -> u64 {
    match v {
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(f) = n.as_f64() {
                clamp_f64(f)
            } else {
                0
            }
        }
        serde_json::Value::String(s) => hot_value_from_text(s),
        _ => 0,
    }
}

/// Extract the first number from free text such as `"1,234 views"` or
/// `"382万热度"`.
pub fn hot_value_from_text(s: &str) -> u64 {
    use once_cell::sync::OnceCell;
    static RE_NUM: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_NUM.get_or_init(|| {
        regex::Regex::new(r"(-)?(\d[\d,]*(?:\.\d+)?)\s*(万|亿|[kKmM](?-u:\b))?").unwrap()
    });

    let Some(caps) = re.captures(s) else {
        return 0;
    };
    // A hyphen glued to a word ("Top-10") is not a sign.
    let negative = caps.get(1).is_some_and(|m| {
        s[..m.start()]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    });
    let digits: String = caps[2].chars().filter(|c| *c != ',').collect();
    let Ok(base) = digits.parse::<f64>() else {
        return 0;
    };
    let base = if negative { -base } else { base };
    let scale = match caps.get(3).map(|m| m.as_str()) {
        Some("万") => 1e4,
        Some("亿") => 1e8,
        Some("k") | Some("K") => 1e3,
        Some("m") | Some("M") => 1e6,
        _ => 1.0,
    };
    clamp_f64(base * scale)
}

fn clamp_f64(f: f64) -> u64 {
    if f.is_finite() && f > 0.0 {
        f.min(u64::MAX as f64) as u64
    } else {
        0
    }
}
