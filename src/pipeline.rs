//! End-to-end translation workflow.
//!
//! A post goes through fetch, cleaning, translation and parsing. Every
//! failure is folded into the returned [`TranslationResult`]; nothing here
//! returns an error to the caller. The rate limiter guards both upstream
//! calls per account: requests for an account in full backoff are skipped,
//! rate-limit errors are recorded, and a completed round trip clears the
//! account's error streak.

use crate::cleaner::{clean_for_translation, clean_post};
use crate::config::Config;
use crate::error::{PipelineError, SourceError, TranslationError};
use crate::feed::{DateComparator, RawPost, select_new};
use crate::parser::{ParsedTranslation, ResponseParser};
use crate::rate_limit::RateLimiter;
use crate::sources::{ContentSource, find_post_urls, username_from_url};
use crate::translator::Translator;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Longest text accepted by [`Pipeline::translate_text`], in characters.
pub const MAX_MANUAL_TEXT_CHARS: usize = 2000;

/// Rate-limiter key for text submitted without a post.
pub const MANUAL_TEXT_ACCOUNT: &str = "manual";

/// Second-pass output shorter than this falls back to the first pass.
const MIN_SECOND_PASS_CHARS: usize = 2;

/// Outcome of one translation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub success: bool,
    /// Text as retrieved, before cleaning.
    pub original_text: String,
    /// Text that was sent for translation. Empty if cleaning removed everything.
    pub cleaned_text: String,
    /// Unparsed generated output.
    pub translated_text_raw: Option<String>,
    pub parsed: Option<ParsedTranslation>,
    /// Post author, if known.
    pub username: Option<String>,
    pub error: Option<PipelineError>,
}

impl TranslationResult {
    fn failure(username: Option<String>, original_text: String, error: PipelineError) -> Self {
        Self {
            success: false,
            original_text,
            cleaned_text: String::new(),
            translated_text_raw: None,
            parsed: None,
            username,
            error: Some(error),
        }
    }
}

/// Drives posts through fetch, cleaning, translation and parsing.
pub struct Pipeline {
    source: Arc<dyn ContentSource>,
    translator: Translator,
    limiter: Arc<RateLimiter>,
    parser: ResponseParser,
    tracked_accounts: Vec<String>,
    max_wait_hours: i64,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ContentSource>,
        translator: Translator,
        limiter: Arc<RateLimiter>,
        config: &Config,
    ) -> Self {
        Self {
            source,
            translator,
            limiter,
            parser: ResponseParser::new(config.translation.min_explanation_chars),
            tracked_accounts: config.tracked_accounts.clone(),
            max_wait_hours: config.rate_limit.max_wait_hours,
        }
    }

    /// Shared rate limiter, for status and reset.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Translates every post linked in a chat message, concurrently.
    ///
    /// Results are in the order the links appear.
    pub async fn translate_message(&self, message: &str, language: &str) -> Vec<TranslationResult> {
        let urls = find_post_urls(message);
        info!(count = urls.len(), "Translating linked posts");
        join_all(urls.iter().map(|url| self.translate_url(url, language))).await
    }

    /// Fetches the post at `url` and translates it.
    pub async fn translate_url(&self, url: &str, language: &str) -> TranslationResult {
        let Some(account) = username_from_url(url) else {
            return TranslationResult::failure(
                None,
                String::new(),
                PipelineError::FetchFailure(format!("not a post link: {}", url)),
            );
        };

        if let Some(error) = self.skip_error(&account) {
            return TranslationResult::failure(Some(account), String::new(), error);
        }

        let original = match self.source.fetch_text(url).await {
            Ok(text) => text,
            Err(e) => {
                let error = self.source_failure(&account, &e);
                return TranslationResult::failure(Some(account), String::new(), error);
            }
        };

        self.translate_content(account, original, language).await
    }

    /// Translates a post delivered by the feed.
    pub async fn translate_post(&self, post: &RawPost, language: &str) -> TranslationResult {
        if let Some(error) = self.skip_error(&post.author) {
            return TranslationResult::failure(Some(post.author.clone()), post.text.clone(), error);
        }

        self.translate_content(post.author.clone(), post.text.clone(), language)
            .await
    }

    /// Translates the posts by `account` newer than `last_seen_at`, oldest first.
    ///
    /// Returns `None` when the feed holds nothing new for the account.
    /// Posts are translated one after another so rate-limit bookkeeping
    /// for the account follows their order.
    pub async fn translate_new_posts(
        &self,
        posts: &[RawPost],
        account: &str,
        last_seen_at: &str,
        comparator: &dyn DateComparator,
        language: &str,
    ) -> Option<Vec<TranslationResult>> {
        let fresh = select_new(posts, account, last_seen_at, comparator)?;
        info!(account = %account, count = fresh.len(), "Translating new posts");

        let mut results = Vec::with_capacity(fresh.len());
        for post in &fresh {
            results.push(self.translate_post(post, language).await);
        }
        Some(results)
    }

    /// Translates free text as-is, without cleaning.
    pub async fn translate_text(&self, text: &str, language: &str) -> TranslationResult {
        let length = text.chars().count();
        if length > MAX_MANUAL_TEXT_CHARS {
            return TranslationResult::failure(
                None,
                text.to_string(),
                PipelineError::InputTooLong {
                    length,
                    limit: MAX_MANUAL_TEXT_CHARS,
                },
            );
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return TranslationResult::failure(None, text.to_string(), PipelineError::EmptyContent);
        }

        if let Some(error) = self.skip_error(MANUAL_TEXT_ACCOUNT) {
            return TranslationResult::failure(None, text.to_string(), error);
        }

        self.translate_cleaned(
            MANUAL_TEXT_ACCOUNT,
            None,
            text.to_string(),
            trimmed.to_string(),
            language,
        )
        .await
    }

    async fn translate_content(
        &self,
        account: String,
        original: String,
        language: &str,
    ) -> TranslationResult {
        let cleaned = clean_post(&original, &self.tracked_accounts);
        if cleaned.is_empty() {
            info!(account = %account, "No original content, skipping translation");
            self.limiter.record_success(&account);
            return TranslationResult::failure(Some(account), original, PipelineError::EmptyContent);
        }

        let second_pass = clean_for_translation(&cleaned);
        let text = if second_pass.chars().count() >= MIN_SECOND_PASS_CHARS {
            second_pass
        } else {
            cleaned
        };

        self.translate_cleaned(&account, Some(account.clone()), original, text, language)
            .await
    }

    async fn translate_cleaned(
        &self,
        account: &str,
        username: Option<String>,
        original_text: String,
        cleaned_text: String,
        language: &str,
    ) -> TranslationResult {
        match self.translator.invoke(&cleaned_text, language).await {
            Ok(raw) => {
                self.limiter.record_success(account);
                let parsed = self.parser.parse(&raw);
                TranslationResult {
                    success: true,
                    original_text,
                    cleaned_text,
                    translated_text_raw: Some(raw),
                    parsed: Some(parsed),
                    username,
                    error: None,
                }
            }
            Err(e) => {
                let error = self.generation_failure(account, &e);
                TranslationResult {
                    cleaned_text,
                    ..TranslationResult::failure(username, original_text, error)
                }
            }
        }
    }

    /// Error for an account whose backoff is exhausted, if it is.
    fn skip_error(&self, account: &str) -> Option<PipelineError> {
        if !self.limiter.should_skip_request(account, self.max_wait_hours) {
            return None;
        }
        warn!(account = %account, "Account in full backoff, skipping request");
        Some(self.rate_limited(account))
    }

    fn rate_limited(&self, account: &str) -> PipelineError {
        PipelineError::RateLimited {
            account: account.to_string(),
            retry_after_secs: self.limiter.get_backoff_delay_secs(account),
        }
    }

    fn source_failure(&self, account: &str, error: &SourceError) -> PipelineError {
        // Source messages carry the post URL, whose status ID can contain
        // "429"; only typed throttling responses count.
        let throttled = matches!(
            error,
            SourceError::RateLimited(_) | SourceError::Status { status: 429, .. }
        );
        if throttled {
            self.limiter.record_rate_limit(account, error);
            return self.rate_limited(account);
        }

        warn!(account = %account, error = %error, "Post retrieval failed");
        match error {
            SourceError::ExtractionFailed(url) => PipelineError::ExtractionFailure(url.clone()),
            _ => PipelineError::FetchFailure(error.to_string()),
        }
    }

    fn generation_failure(&self, account: &str, error: &TranslationError) -> PipelineError {
        if self.limiter.is_rate_limited_error(error) {
            self.limiter.record_rate_limit(account, error);
            return self.rate_limited(account);
        }

        match error {
            TranslationError::Truncated => {
                self.limiter.record_success(account);
                PipelineError::TruncatedResponse
            }
            TranslationError::EmptyResponse(_) => {
                self.limiter.record_success(account);
                PipelineError::GenerationFailure(error.to_string())
            }
            TranslationError::InvalidConfig(_) => PipelineError::UnknownFailure(error.to_string()),
            TranslationError::HttpError(_)
            | TranslationError::ApiError(_)
            | TranslationError::ParseError(_)
            | TranslationError::Timeout(_) => PipelineError::GenerationFailure(error.to_string()),
        }
    }
}
