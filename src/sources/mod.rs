//! Content sources that turn a post URL into plain post text.
//!
//! Sources hide how a post is retrieved and which markup it is pulled out
//! of; callers only see a text blob or a [`SourceError`].

mod fxtwitter;

pub use fxtwitter::FxTwitterSource;

use crate::config::FetchConfig;
use crate::error::SourceError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Post links on twitter.com or x.com. Group 1 is the author handle.
static POST_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.|mobile\.)?(?:twitter\.com|x\.com)/(\w+)/status/\d+")
        .expect("Invalid post URL regex")
});

/// Trait for post content sources.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Returns the human-readable name of this source.
    fn name(&self) -> &'static str;

    /// Checks if this source can retrieve the given URL.
    fn can_handle(&self, url: &str) -> bool;

    /// Fetches the text of the post at `post_url`.
    async fn fetch_text(&self, post_url: &str) -> Result<String, SourceError>;
}

/// Extracts every post URL in a chat message, in order of appearance.
pub fn find_post_urls(message: &str) -> Vec<String> {
    POST_URL_REGEX
        .find_iter(message)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Returns the author handle of a post URL.
pub fn username_from_url(url: &str) -> Option<String> {
    POST_URL_REGEX
        .captures(url.trim())
        .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Checks that `url` starts with a post link.
pub fn is_valid_post_url(url: &str) -> bool {
    username_from_url(url).is_some()
}

/// Common HTTP client configuration for sources.
pub fn create_http_client(config: &FetchConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(config.connect_timeout_sec))
        .timeout(Duration::from_secs(config.timeout_sec))
        .build()
}
