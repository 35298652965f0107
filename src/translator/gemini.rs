//! Gemini `generateContent` backend.

use super::{FinishReason, Generation, GenerationService, SamplingConfig};
use crate::config::ApiConfig;
use crate::error::TranslationError;
use crate::utils::check_response_status;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Request body for the generateContent API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// Response from the generateContent API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Collapses the response into text plus finish reason.
    ///
    /// Text is the concatenation of the first candidate's parts, falling
    /// back to its first non-empty part.
    fn resolve(self) -> Generation {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| FinishReason::Other(format!("BLOCKED_{}", r)))
                .unwrap_or(FinishReason::Unspecified);
            return Generation {
                text: None,
                finish_reason: reason,
            };
        };

        let finish_reason = candidate
            .finish_reason
            .as_deref()
            .map(FinishReason::from_api)
            .unwrap_or(FinishReason::Unspecified);

        let parts: Vec<String> = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let joined = parts.concat();
        let text = if !joined.trim().is_empty() {
            Some(joined)
        } else {
            parts.into_iter().find(|p| !p.trim().is_empty())
        };

        Generation {
            text,
            finish_reason,
        }
    }
}

/// Client for the Gemini REST API.
pub struct GeminiClient {
    client: Client,
    api_config: ApiConfig,
}

impl GeminiClient {
    pub fn new(api_config: ApiConfig) -> Result<Self, TranslationError> {
        if !api_config.is_configured() {
            return Err(TranslationError::InvalidConfig(
                "API key is not set".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            api_config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_config.base_url.trim_end_matches('/'),
            self.api_config.model
        )
    }
}

fn request_body<'a>(prompt: &'a str, sampling: &SamplingConfig) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: vec![RequestPart { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: sampling.temperature,
            max_output_tokens: sampling.max_output_tokens,
            top_p: sampling.top_p,
            top_k: sampling.top_k,
        },
        safety_settings: sampling
            .safety
            .iter()
            .map(|(category, threshold)| SafetySetting {
                category: category.as_str(),
                threshold: threshold.as_str(),
            })
            .collect(),
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<Generation, TranslationError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_config.key)
            .header("Content-Type", "application/json")
            .json(&request_body(prompt, sampling))
            .send()
            .await?;

        let response = check_response_status(response).await?;
        let body = response.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| TranslationError::ParseError(e.to_string()))?;

        Ok(parsed.resolve())
    }
}
