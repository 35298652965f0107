//! Posts delivered by the feed collaborator and new-post selection.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::cmp::Ordering;

/// A post as observed from the platform feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPost {
    /// Handle of the author, without the leading `@`.
    pub author: String,
    /// Creation timestamp, in whatever format the feed delivers.
    pub created_at: String,
    /// Post text, already reduced from markup to plain text.
    pub text: String,
}

impl RawPost {
    pub fn new(
        author: impl Into<String>,
        created_at: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            created_at: created_at.into(),
            text: text.into(),
        }
    }
}

/// Chronological comparison of feed timestamps.
///
/// Returns `None` when either side cannot be interpreted.
pub trait DateComparator: Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Option<Ordering>;
}

/// Accepted timestamp layouts, tried in order after RFC 3339.
const TIMESTAMP_FORMATS: &[&str] = &[
    // Twitter API v1: "Wed Oct 10 20:19:24 +0000 2018"
    "%a %b %d %H:%M:%S %z %Y",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
];

/// Compares RFC 3339, Twitter-style and `YYYY-MM-DD HH:MM:SS` timestamps.
///
/// Timestamps without an offset are read as UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampComparator;

impl TimestampComparator {
    fn parse(value: &str) -> Option<DateTime<FixedOffset>> {
        let value = value.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
            return Some(ts);
        }
        for format in TIMESTAMP_FORMATS {
            if let Ok(ts) = DateTime::parse_from_str(value, format) {
                return Some(ts);
            }
        }
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    }
}

impl DateComparator for TimestampComparator {
    fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        Some(Self::parse(a)?.cmp(&Self::parse(b)?))
    }
}

/// Selects the posts by `account` created after `last_seen_at`, oldest first.
///
/// Returns `None` when there is nothing new, so callers can tell "no update"
/// apart from an empty feed they still have to handle.
pub fn select_new(
    posts: &[RawPost],
    account: &str,
    last_seen_at: &str,
    comparator: &dyn DateComparator,
) -> Option<Vec<RawPost>> {
    let mut fresh: Vec<RawPost> = posts
        .iter()
        .filter(|p| p.author == account)
        .filter(|p| comparator.compare(&p.created_at, last_seen_at) == Some(Ordering::Greater))
        .cloned()
        .collect();

    if fresh.is_empty() {
        return None;
    }

    fresh.sort_by(|a, b| {
        comparator
            .compare(&a.created_at, &b.created_at)
            .unwrap_or(Ordering::Equal)
    });
    Some(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T1: &str = "2024-05-01T10:00:00Z";
    const T2: &str = "2024-05-01T11:00:00Z";
    const T3: &str = "2024-05-01T12:00:00Z";
    const T4: &str = "2024-05-01T13:00:00Z";

    #[test]
    fn test_selects_newer_posts_in_order() {
        let posts = vec![
            RawPost::new("x", T3, "third"),
            RawPost::new("y", T4, "other account"),
            RawPost::new("x", T1, "first"),
            RawPost::new("x", T2, "second"),
        ];

        let fresh = select_new(&posts, "x", T1, &TimestampComparator).unwrap();
        let texts: Vec<&str> = fresh.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "third"]);
    }

    #[test]
    fn test_nothing_new_is_none() {
        let posts = vec![RawPost::new("x", T1, "old"), RawPost::new("y", T4, "other")];
        assert!(select_new(&posts, "x", T1, &TimestampComparator).is_none());
        assert!(select_new(&[], "x", T1, &TimestampComparator).is_none());
    }

    #[test]
    fn test_author_must_match_exactly() {
        let posts = vec![RawPost::new("X", T2, "upper")];
        assert!(select_new(&posts, "x", T1, &TimestampComparator).is_none());
    }

    #[test]
    fn test_mixed_formats_and_offsets() {
        let cmp = TimestampComparator;
        assert_eq!(
            cmp.compare("Wed May 01 11:00:00 +0000 2024", "2024-05-01T18:30:00+08:00"),
            Some(Ordering::Greater)
        );
        assert_eq!(
            cmp.compare("2024-05-01 10:00:00", T1),
            Some(Ordering::Equal)
        );
        assert_eq!(cmp.compare("yesterday", T1), None);
    }

    #[test]
    fn test_unparseable_timestamps_are_skipped() {
        let posts = vec![
            RawPost::new("x", "garbage", "broken"),
            RawPost::new("x", T2, "fine"),
        ];
        let fresh = select_new(&posts, "x", T1, &TimestampComparator).unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].text, "fine");
    }
}
