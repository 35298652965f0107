//! Translation through an LLM generation service.
//!
//! The [`Translator`] owns the prompt and sampling settings and turns a
//! generation result into either the raw answer text or a
//! [`TranslationError`]. The service itself sits behind the
//! [`GenerationService`] trait so other backends and test fakes can be
//! swapped in.

mod gemini;

pub use gemini::GeminiClient;

use crate::config::{PromptsConfig, TranslationConfig};
use crate::error::TranslationError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Harm categories the generation service filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];

    /// Wire name of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            HarmCategory::Harassment => "HARM_CATEGORY_HARASSMENT",
            HarmCategory::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        }
    }
}

/// Blocking threshold for a harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmThreshold {
    BlockNone,
}

impl HarmThreshold {
    pub fn as_str(self) -> &'static str {
        match self {
            HarmThreshold::BlockNone => "BLOCK_NONE",
        }
    }
}

/// Sampling and safety settings sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub safety: Vec<(HarmCategory, HarmThreshold)>,
}

impl SamplingConfig {
    /// Sampling from config with every harm filter disabled.
    ///
    /// Fan posts routinely contain slang that trips the default filters.
    pub fn permissive(config: &TranslationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            top_p: config.top_p,
            top_k: config.top_k,
            safety: HarmCategory::ALL
                .iter()
                .map(|c| (*c, HarmThreshold::BlockNone))
                .collect(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::permissive(&TranslationConfig::default())
    }
}

/// Why the service stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Unspecified,
    Other(String),
}

impl FinishReason {
    /// Maps the service's finish reason string.
    pub fn from_api(value: &str) -> Self {
        match value {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::MaxTokens,
            "SAFETY" => FinishReason::Safety,
            "RECITATION" => FinishReason::Recitation,
            "" | "FINISH_REASON_UNSPECIFIED" => FinishReason::Unspecified,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => f.write_str("STOP"),
            FinishReason::MaxTokens => f.write_str("MAX_TOKENS"),
            FinishReason::Safety => f.write_str("SAFETY"),
            FinishReason::Recitation => f.write_str("RECITATION"),
            FinishReason::Unspecified => f.write_str("UNSPECIFIED"),
            FinishReason::Other(other) => f.write_str(other),
        }
    }
}

/// One generation result, resolved at the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Generated text, `None` if the service produced none.
    pub text: Option<String>,
    pub finish_reason: FinishReason,
}

/// A text-in, text-out generation backend.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Generates a completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<Generation, TranslationError>;
}

/// Translates cleaned post text with a fixed prompt template.
pub struct Translator {
    service: Arc<dyn GenerationService>,
    sampling: SamplingConfig,
    prompt_template: String,
    name_hints: Vec<String>,
    timeout: Duration,
}

impl Translator {
    /// Create a new Translator.
    pub fn new(
        service: Arc<dyn GenerationService>,
        translation_config: &TranslationConfig,
        prompts: &PromptsConfig,
    ) -> Self {
        Self {
            service,
            sampling: SamplingConfig::permissive(translation_config),
            prompt_template: prompts.translation.clone(),
            name_hints: prompts.name_hints.clone(),
            timeout: Duration::from_secs(translation_config.request_timeout_sec),
        }
    }

    /// Fills the prompt template for one text.
    pub fn build_prompt(&self, text: &str, target_language: &str) -> String {
        let mut prompt = self
            .prompt_template
            .replace("{language}", target_language)
            .replace("{text}", text);

        if !self.name_hints.is_empty() {
            prompt.push_str("\n- 人名識別：");
            prompt.push_str(&self.name_hints.join(", "));
        }
        prompt
    }

    /// Translates `text` and returns the raw generated answer.
    ///
    /// Truncated output is an error: a cut-off multi-section answer cannot
    /// be parsed safely and is never surfaced partially.
    pub async fn invoke(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        let prompt = self.build_prompt(text, target_language);
        debug!(
            backend = self.service.name(),
            prompt_chars = prompt.chars().count(),
            "Requesting translation"
        );

        let generation =
            match tokio::time::timeout(self.timeout, self.service.generate(&prompt, &self.sampling))
                .await
            {
                Ok(Ok(generation)) => generation,
                Ok(Err(e)) => {
                    error!(error = %e, "Translation request failed");
                    return Err(e);
                }
                Err(_) => {
                    error!(timeout_sec = self.timeout.as_secs(), "Translation request timed out");
                    return Err(TranslationError::Timeout(self.timeout.as_secs()));
                }
            };

        if generation.finish_reason == FinishReason::MaxTokens {
            error!("Response truncated (MAX_TOKENS), discarding");
            return Err(TranslationError::Truncated);
        }

        let translated = generation
            .text
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();

        if translated.is_empty() {
            return Err(TranslationError::EmptyResponse(
                generation.finish_reason.to_string(),
            ));
        }

        let preview: String = translated.chars().take(100).collect();
        info!(preview = %preview, "Translation succeeded");
        Ok(translated.to_string())
    }
}
