//! Configuration management for Fanyi.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::error::ConfigError;
use crate::parser::DEFAULT_MIN_EXPLANATION_CHARS;
use crate::rate_limit::{DEFAULT_BACKOFF_MINUTES, DEFAULT_MAX_WAIT_HOURS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "Fanyi";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Placeholder value for unconfigured API keys.
const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Environment variable that overrides `api.key`.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Longest accepted cool-down, in hours (30 days).
const MAX_WAIT_HOURS_LIMIT: i64 = 24 * 30;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accounts monitored by the notification side.
    pub tracked_accounts: Vec<String>,

    /// Generation service configuration.
    pub api: ApiConfig,

    /// Translation behavior settings.
    pub translation: TranslationConfig,

    /// Post retrieval settings.
    pub fetch: FetchConfig,

    /// Backoff settings for rate-limited accounts.
    pub rate_limit: RateLimitConfig,

    /// LLM prompts.
    pub prompts: PromptsConfig,
}

/// API configuration for the generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key (required).
    pub key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: API_KEY_PLACEHOLDER.to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-pro".to_string(),
        }
    }
}

impl ApiConfig {
    /// Checks if the API key is configured (not placeholder).
    pub fn is_configured(&self) -> bool {
        !self.key.is_empty() && self.key != API_KEY_PLACEHOLDER
    }
}

/// Translation behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Language the posts are translated into.
    pub target_language: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Output token ceiling. Kept high so multi-section answers are not cut off.
    pub max_output_tokens: u32,

    /// Nucleus sampling probability mass.
    pub top_p: f32,

    /// Top-k sampling cutoff.
    pub top_k: u32,

    /// Deadline for one generation request, in seconds.
    pub request_timeout_sec: u64,

    /// Explanation sections this short or shorter are dropped.
    pub min_explanation_chars: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_language: "繁體中文".to_string(),
            temperature: 0.5,
            max_output_tokens: 16384,
            top_p: 0.95,
            top_k: 40,
            request_timeout_sec: 120,
            min_explanation_chars: DEFAULT_MIN_EXPLANATION_CHARS,
        }
    }
}

/// Post retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Mirror host serving post pages with embed metadata.
    pub mirror_host: String,

    /// Connect timeout in seconds.
    pub connect_timeout_sec: u64,

    /// Total request timeout in seconds.
    pub timeout_sec: u64,

    /// User agent sent to the mirror. Keep it short; long headers get rejected.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mirror_host: "fxtwitter.com".to_string(),
            connect_timeout_sec: 10,
            timeout_sec: 30,
            user_agent: "Mozilla/5.0 (compatible; bot/1.0)".to_string(),
        }
    }
}

/// Rate-limit backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Backoff steps in minutes.
    pub backoff_minutes: Vec<u64>,

    /// Cool-down before a fully backed-off account is tried again.
    pub max_wait_hours: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backoff_minutes: DEFAULT_BACKOFF_MINUTES.to_vec(),
            max_wait_hours: DEFAULT_MAX_WAIT_HOURS,
        }
    }
}

/// LLM prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Translation prompt. `{language}` and `{text}` are substituted.
    pub translation: String,

    /// Names the model should keep as proper nouns.
    pub name_hints: Vec<String>,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            translation: r#"將以下社群媒體內容翻譯成{language}：

原文：
{text}
請按照以下格式輸出：

**語氣分析：**
[簡短描述原文的語氣、情感特色]

**整句話的意思：**
「[核心含義的直接翻譯]」

**翻成自然且符合台灣情境的{language}：**
「[最自然、口語化的翻譯]」

**逐字拆解原文：**
[對重要詞彙進行拼音標註和解釋，包含語氣詞、俚語等]

**文化背景說明：**
[如有特殊用法、文化背景或語言特色需要說明（人名、CP 名稱等不解釋）]

翻譯要求：
- 不要加上任何開場白，直接進入翻譯。
- 保留原文的語氣情感和 emoji
- 提供自然流暢的口語化翻譯
- 解釋語氣詞和俚語的含義
- 保留 Keyword 和 Hashtag 的原有格式，但不用解釋"#
                .to_string(),
            name_hints: Vec::new(),
        }
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            // Create default config
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Takes the API key from the environment when it is set.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api.key = key.trim().to_string();
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api.is_configured() {
            return Err(ConfigError::MissingValue(format!(
                "api.key (set it in the config file or via {})",
                API_KEY_ENV
            )));
        }

        if self.rate_limit.backoff_minutes.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "rate_limit.backoff_minutes".to_string(),
                message: "must contain at least one step".to_string(),
            });
        }

        let max_wait = self.rate_limit.max_wait_hours;
        if !(1..=MAX_WAIT_HOURS_LIMIT).contains(&max_wait) {
            return Err(ConfigError::InvalidValue {
                key: "rate_limit.max_wait_hours".to_string(),
                message: format!("must be between 1 and {}", MAX_WAIT_HOURS_LIMIT),
            });
        }

        if self.translation.request_timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "translation.request_timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.fetch.timeout_sec == 0 || self.fetch.connect_timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch".to_string(),
                message: "timeouts must be greater than 0".to_string(),
            });
        }

        let temperature = self.translation.temperature;
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "translation.temperature".to_string(),
                message: "must be a non-negative number".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    fn configured() -> Config {
        let mut config = Config::default();
        config.api.key = "real-key".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.api.is_configured());
        assert_eq!(config.translation.temperature, 0.5);
        assert_eq!(config.translation.max_output_tokens, 16384);
        assert_eq!(config.fetch.connect_timeout_sec, 10);
        assert_eq!(config.fetch.timeout_sec, 30);
        assert_eq!(config.rate_limit.backoff_minutes, vec![15, 30, 60, 120, 300]);
        assert_eq!(config.rate_limit.max_wait_hours, 6);
        assert!(config.prompts.translation.contains("{text}"));
        assert!(config.prompts.translation.contains("{language}"));
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = configured();
        config.tracked_accounts = vec!["alice".to_string()];
        let file = NamedTempFile::new().unwrap();

        config.save_to(file.path()).unwrap();

        let loaded = Config::load_from(file.path()).unwrap();
        assert_eq!(loaded.api.model, config.api.model);
        assert_eq!(loaded.tracked_accounts, vec!["alice".to_string()]);
        assert_eq!(
            loaded.translation.target_language,
            config.translation.target_language
        );
    }

    #[test]
    fn test_missing_file_creates_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.api.model, ApiConfig::default().model);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[translation]\ntarget_language = \"English\"\n").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.translation.target_language, "English");
        assert_eq!(config.translation.top_k, 40);
        assert_eq!(config.fetch.mirror_host, "fxtwitter.com");
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_err());
        assert!(configured().validate().is_ok());

        let mut config = configured();
        config.rate_limit.backoff_minutes.clear();
        assert!(config.validate().is_err());

        let mut config = configured();
        config.translation.request_timeout_sec = 0;
        assert!(config.validate().is_err());

        let mut config = configured();
        config.translation.temperature = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = configured();
        config.rate_limit.max_wait_hours = 0;
        assert!(config.validate().is_err());
        config.rate_limit.max_wait_hours = -3;
        assert!(config.validate().is_err());
        config.rate_limit.max_wait_hours = i64::MAX;
        assert!(config.validate().is_err());
        config.rate_limit.max_wait_hours = MAX_WAIT_HOURS_LIMIT;
        assert!(config.validate().is_ok());
    }
}
