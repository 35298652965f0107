//! FxTwitter mirror source.
//!
//! The mirror serves post pages with embed metadata; the post text is the
//! `og:description` of that page.

use super::{ContentSource, create_http_client, is_valid_post_url};
use crate::config::FetchConfig;
use crate::error::SourceError;
use async_trait::async_trait;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

/// Source that reads posts through an FxTwitter-style mirror.
pub struct FxTwitterSource {
    client: reqwest::Client,
    mirror_host: String,
    description: Selector,
}

impl FxTwitterSource {
    /// Creates a new source with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: create_http_client(config)?,
            mirror_host: config.mirror_host.clone(),
            description: Selector::parse(r#"meta[property="og:description"]"#)
                .expect("Invalid og:description selector"),
        })
    }

    /// Rewrites a post URL to point at the mirror host.
    fn mirror_url(&self, post_url: &str) -> Result<String, SourceError> {
        if !is_valid_post_url(post_url) {
            return Err(SourceError::InvalidUrl(post_url.to_string()));
        }

        let mut url =
            Url::parse(post_url.trim()).map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
        url.set_host(Some(&self.mirror_host))
            .map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
        Ok(url.to_string())
    }

    /// Extracts the post text from a mirror page.
    fn extract_text(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        doc.select(&self.description)
            .filter_map(|elem| elem.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl ContentSource for FxTwitterSource {
    fn name(&self) -> &'static str {
        "FxTwitter"
    }

    fn can_handle(&self, url: &str) -> bool {
        is_valid_post_url(url)
    }

    async fn fetch_text(&self, post_url: &str) -> Result<String, SourceError> {
        let url = self.mirror_url(post_url)?;
        debug!(url = %url, "Fetching post from mirror");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        match status {
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound(post_url.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceError::RateLimited(format!(
                    "HTTP 429 Too Many Requests from {}",
                    self.mirror_host
                )));
            }
            s if !s.is_success() => {
                warn!(status = s.as_u16(), url = %url, "Mirror returned an error status");
                return Err(SourceError::Status {
                    status: s.as_u16(),
                    url,
                });
            }
            _ => {}
        }

        let html = response.text().await?;
        let text = self
            .extract_text(&html)
            .ok_or_else(|| SourceError::ExtractionFailed(post_url.to_string()))?;

        let preview: String = text.chars().take(50).collect();
        info!(preview = %preview, "Fetched post content");
        Ok(text)
    }
}
