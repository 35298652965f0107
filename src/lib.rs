//! Fanyi - social media post translator.
//!
//! This library provides functionality for:
//! - Fetching post text through a mirror and cleaning off platform chrome
//! - Per-account rate-limit backoff for the upstream services
//! - Translating posts with an LLM and splitting the answer into fields

pub mod cleaner;
pub mod config;
pub mod console;
pub mod error;
pub mod feed;
pub mod parser;
pub mod pipeline;
pub mod rate_limit;
pub mod sources;
pub mod translator;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use console::Console;
pub use error::{ConfigError, PipelineError, SourceError, TranslationError};
pub use feed::{RawPost, TimestampComparator, select_new};
pub use parser::{ParsedTranslation, ResponseParser};
pub use pipeline::{Pipeline, TranslationResult};
pub use rate_limit::{AccountRateState, RateLimiter};
pub use sources::{ContentSource, FxTwitterSource};
pub use translator::{GeminiClient, GenerationService, Translator};
