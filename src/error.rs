//! Error types for the Fanyi application.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use thiserror::Error;

/// Error type for content retrieval from a post mirror.
#[derive(Error, Debug)]
pub enum SourceError {
    /// HTTP request failed (connect error, timeout, body read)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Server answered with an unexpected status code
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The post does not exist or is not public
    #[error("Not found: {0}")]
    NotFound(String),

    /// Page was retrieved but holds no post text
    #[error("No post text found: {0}")]
    ExtractionFailed(String),

    /// Server returned 429 or an equivalent throttling response
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// URL parsing or validation failed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Missing required configuration value
    #[error("Missing required config value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Error type for calls to the generation service.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// HTTP request to API failed
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error: {0}")]
    ApiError(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Output hit the token ceiling and was cut off
    #[error("Response truncated at the output token limit")]
    Truncated,

    /// The service answered without any usable text
    #[error("Empty response (finish reason: {0})")]
    EmptyResponse(String),

    /// No answer within the configured deadline
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Invalid API configuration
    #[error("Invalid API configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported to the presentation layer for one translation attempt.
///
/// The `Display` text is shown to users as-is, so every message names the
/// cause and what to try next.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error(
        "Could not fetch the post: {0}\nThe post may be deleted or private, or the mirror is unreachable. Check the link and try again later."
    )]
    FetchFailure(String),

    #[error(
        "The post page was retrieved but contains no text: {0}\nMedia-only posts cannot be translated."
    )]
    ExtractionFailure(String),

    #[error(
        "Nothing to translate: the post has no original content (pure retransmission, quote or mentions only)."
    )]
    EmptyContent,

    #[error(
        "Rate limited for account '{account}'. Requests are paused; retry in about {retry_after_secs} seconds."
    )]
    RateLimited {
        account: String,
        retry_after_secs: u64,
    },

    #[error(
        "The translation was cut off at the output token limit and was discarded. Try again, or translate a shorter text."
    )]
    TruncatedResponse,

    #[error(
        "Translation failed: {0}\nCheck that the API key is valid and the quota is not exhausted, then try again."
    )]
    GenerationFailure(String),

    #[error(
        "The text is {length} characters long; at most {limit} characters can be translated at once. Split it into shorter parts."
    )]
    InputTooLong { length: usize, limit: usize },

    #[error("Unexpected error while processing the request: {0}")]
    UnknownFailure(String),
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
