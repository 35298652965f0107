//! Post text cleaning.
//!
//! Strips platform chrome (retransmission markers, reply/quote prefixes,
//! timestamps, engagement counters, mentions) from scraped post text so only
//! the author's own words are sent for translation. Emoji and non-Latin
//! scripts are left untouched; no Unicode normalization is applied.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("Invalid cleaner pattern")
}

/// `RT @user: remainder`, spanning the whole text.
static RETRANSMISSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^RT @(\w+):\s*(.*)$").expect("Invalid RETRANSMISSION"));

static INLINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("Invalid INLINE_WHITESPACE"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("Invalid BLANK_LINES"));

/// Platform chrome, removed in order.
static ARTIFACT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Quote prefix
        ci(r"^Quote Tweet\s*"),
        // Reply prefix, one or more handles
        ci(r"^Replying to @\w+(?:\s*,\s*@\w+)*(?:\s+and\s+@\w+)?\s*"),
        // Relative time suffix: "· 3h"
        ci(r"\s*·\s*\d+[hms]\s*$"),
        // Date suffix: "· Mar 5, 2024"
        ci(r"\s*·\s*\w+\s+\d+,?\s*\d*\s*$"),
        ci(r"^RT @\w+:\s*"),
        ci(r"\s*Show this thread\s*$"),
        ci(r"\s*Translate Tweet\s*$"),
        ci(r"\s*View Tweet activity\s*$"),
        // Engagement counters: "1.2K Likes"
        ci(r"\s*\d+(?:[.,]\d+)?[KMB]?\s+(?:Retweets?|Likes?|Replies?)\s*$"),
    ]
});

/// A handle at the start of the text or after whitespace.
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)@\w+").expect("Invalid MENTION"));

static WHOLE_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^".*"$"#).expect("Invalid WHOLE_QUOTE"));

/// Only whitespace and punctuation.
static DEGENERATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\W]*$").expect("Invalid DEGENERATE"));

static MINIMAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:RT @\w+:\s*|Quote Tweet\s*)").expect("Invalid MINIMAL_PREFIX")
});

static LEADING_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@\w+\s+").expect("Invalid LEADING_MENTION"));

static SPACE_BEFORE_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+#").expect("Invalid SPACE_BEFORE_HASHTAG"));

static LEADING_RT_OR_QT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:RT|QT)\s*@\w+:\s*").expect("Invalid LEADING_RT_OR_QT"));

static RELATIVE_TIME_TAIL: LazyLock<Regex> =
    LazyLock::new(|| ci(r"\s*\b(?:earlier today|ago|前|earlier)\b.*$"));

static ENGAGEMENT_TAIL: LazyLock<Regex> =
    LazyLock::new(|| ci(r"\s*\d+\s*(?:likes?|retweets?|replies?|個讚|次轉推|則回覆)\s*$"));

static VIA_TAIL: LazyLock<Regex> = LazyLock::new(|| ci(r"\s*\bvia\s+\w+.*$"));

/// Minimum length, in characters, for the minimal-clean fallback to be kept.
const MIN_FALLBACK_CHARS: usize = 2;

fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn is_degenerate(text: &str) -> bool {
    DEGENERATE.is_match(text)
}

/// Cleans raw post text down to the author's original content.
///
/// Returns an empty string when nothing original remains, e.g. for a pure
/// retransmission or a post that is one quoted span.
///
/// `tracked_accounts` only changes what gets logged: a pure retransmission
/// is dropped whether or not the retransmitted account is tracked.
pub fn clean_post(raw: &str, tracked_accounts: &[String]) -> String {
    if let Some(caps) = RETRANSMISSION.captures(raw.trim()) {
        let remainder = caps.get(2).map_or("", |m| m.as_str()).trim();
        if remainder.is_empty() {
            let user = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
            if tracked_accounts.iter().any(|t| t.to_lowercase() == user) {
                info!(user = %user, "Pure retransmission of a tracked account, skipping");
            } else {
                info!(user = %user, "Pure retransmission of an untracked account, skipping");
            }
            return String::new();
        }
    }

    let mut content = INLINE_WHITESPACE.replace_all(raw, " ").into_owned();
    content = BLANK_LINES.replace_all(&content, "\n").trim().to_string();

    for pattern in ARTIFACT_PATTERNS.iter() {
        content = pattern.replace_all(&content, "").into_owned();
    }

    content = MENTION.replace_all(&content, "$1").into_owned();
    content = INLINE_WHITESPACE
        .replace_all(&content, " ")
        .trim()
        .to_string();

    if WHOLE_QUOTE.is_match(&content) {
        debug!("Post is a single quoted span, dropping");
        return String::new();
    }

    if content.is_empty() || is_degenerate(&content) {
        warn!(original = %snippet(raw, 100), "Cleaning left no content");
        let minimal = MINIMAL_PREFIX.replace(raw, "").trim().to_string();
        if minimal.chars().count() > MIN_FALLBACK_CHARS {
            info!(minimal = %snippet(&minimal, 50), "Using minimally cleaned text");
            return minimal;
        }
        return String::new();
    }

    content
}

/// Second cleaning pass applied to [`clean_post`] output right before translation.
///
/// Returns an empty string if only whitespace or punctuation is left.
pub fn clean_for_translation(content: &str) -> String {
    let mut content = LEADING_MENTION.replace(content, "").into_owned();
    content = SPACE_BEFORE_HASHTAG
        .replace_all(&content, " #")
        .into_owned();
    content = LEADING_RT_OR_QT.replace(&content, "").into_owned();
    content = RELATIVE_TIME_TAIL.replace(&content, "").into_owned();
    content = ENGAGEMENT_TAIL.replace(&content, "").into_owned();
    content = VIA_TAIL.replace(&content, "").into_owned();

    if is_degenerate(&content) {
        return String::new();
    }

    content.trim().to_string()
}
