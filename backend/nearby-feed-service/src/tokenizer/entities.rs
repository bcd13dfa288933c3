//! Write-time entity extraction.
//!
//! Populates `entities` on a post so that hashtag queries can be served by a
//! membership lookup instead of a content scan.

use crate::models::Entities;
use regex::Regex;
use std::sync::LazyLock;

static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]{1,50})").expect("Invalid hashtag regex"));

static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]{1,30})").expect("Invalid mention regex"));

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+").expect("Invalid url regex"));

const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Extract hashtags, mentions and links from post content.
///
/// Hashtags are case-folded, mentions keep their case. URLs keep their
/// first-occurrence order and lose trailing sentence punctuation.
pub fn extract(content: &str) -> Entities {
    let hashtags = HASHTAG_REGEX
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .collect();

    let mentions = MENTION_REGEX
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    let mut urls: Vec<String> = Vec::new();
    for found in URL_REGEX.find_iter(content) {
        let url = found.as_str().trim_end_matches(URL_TRAILING);
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }

    Entities {
        hashtags,
        mentions,
        urls,
    }
}
