//! Configuration for the ANIMA persona engine.
//!
//! Maps directly to `anima.toml`. Every field has a default, so an empty file
//! (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AnimaError, Result};

/// Top-level ANIMA configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimaConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Mood dynamics.
    #[serde(default)]
    pub mood: MoodConfig,
    /// Prompt assembly.
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Language-model integration settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Snapshot persistence.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl AnimaConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `AnimaError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| AnimaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    /// Returns `AnimaError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mood.decay_rate) {
            return Err(AnimaError::Config(format!(
                "mood.decay_rate must be within [0, 1], got {}",
                self.mood.decay_rate
            )));
        }
        if self.prompt.snippet_chars == 0 {
            return Err(AnimaError::Config("prompt.snippet_chars must be positive".into()));
        }
        if self.llm.request_timeout_ms == 0 {
            return Err(AnimaError::Config("llm.request_timeout_ms must be positive".into()));
        }
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(AnimaError::Config(format!(
                "general.log_format must be \"text\" or \"json\", got \"{}\"",
                self.general.log_format
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log line format: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

/// Mood dynamics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodConfig {
    /// Decay applied by each life-cycle tick.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self { decay_rate: 0.1 }
    }
}

/// Prompt assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// How much of the latest user input is quoted in the self-audit.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    /// Directory of TOML template overrides. Built-ins are used when unset.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            snippet_chars: 50,
            template_dir: None,
        }
    }
}

/// Language-model integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "openai", "ollama", "gemini", "none".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL for the provider API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key. Prefer `api_key_env` over putting secrets in the file.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Hard timeout for any collaborator call in milliseconds.
    #[serde(default = "default_30000")]
    pub request_timeout_ms: u64,
    /// Retries after the first failed HTTP attempt.
    #[serde(default = "default_2")]
    pub max_retries: u32,
    /// Sampling temperature for conversational turns.
    #[serde(default = "default_0_8")]
    pub temperature: f32,
    /// Maximum tokens to generate.
    #[serde(default = "default_1024")]
    pub max_tokens: u32,
}

impl LlmConfig {
    /// The configured key, falling back to the `api_key_env` variable.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            api_key_env: "ANIMA_LLM_API_KEY".to_string(),
            request_timeout_ms: 30_000,
            max_retries: 2,
            temperature: 0.8,
            max_tokens: 1024,
        }
    }
}

/// Persistence / snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite file holding persona snapshots.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect snapshot corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal_mode: true,
            checksum_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
fn default_provider() -> String { "openai".to_string() }
fn default_base_url() -> String { "https://api.openai.com".to_string() }
fn default_model() -> String { "gpt-4o".to_string() }
fn default_api_key_env() -> String { "ANIMA_LLM_API_KEY".to_string() }
fn default_db_path() -> PathBuf { PathBuf::from("anima.db") }
fn default_decay_rate() -> f32 { 0.1 }
fn default_0_8() -> f32 { 0.8 }
fn default_2() -> u32 { 2 }
fn default_1024() -> u32 { 1024 }
fn default_snippet_chars() -> usize { 50 }
fn default_30000() -> u64 { 30_000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = AnimaConfig::from_toml("").expect("empty config parses");
        assert_eq!(config.general.log_level, "info");
        assert!((config.mood.decay_rate - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.prompt.snippet_chars, 50);
        assert_eq!(config.llm.request_timeout_ms, 30_000);
        assert_eq!(config.llm.max_retries, 2);
        assert!(config.persistence.checksum_enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AnimaConfig::from_toml(
            r#"
            [llm]
            provider = "ollama"
            base_url = "http://localhost:11434"
            model = "qwen2.5:7b"

            [mood]
            decay_rate = 0.25
            "#,
        )
        .expect("parses");
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.max_tokens, 1024);
        assert!((config.mood.decay_rate - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.general.log_format, "text");
    }

    #[test]
    fn out_of_range_decay_rate_is_rejected() {
        let err = AnimaConfig::from_toml("[mood]\ndecay_rate = 1.5").expect_err("invalid");
        assert!(err.to_string().contains("decay_rate"));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(AnimaConfig::from_toml("[general]\nlog_format = \"xml\"").is_err());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = AnimaConfig::from_toml("[llm\nprovider=").expect_err("invalid");
        assert!(matches!(err, AnimaError::Config(_)));
    }

    #[test]
    fn explicit_api_key_wins() {
        let llm = LlmConfig {
            api_key: Some("sk-test".into()),
            api_key_env: "ANIMA_TEST_UNSET_VARIABLE_FOR_KEY".into(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.resolve_api_key().as_deref(), Some("sk-test"));

        let none = LlmConfig {
            api_key: None,
            api_key_env: "ANIMA_TEST_UNSET_VARIABLE_FOR_KEY".into(),
            ..LlmConfig::default()
        };
        assert_eq!(none.resolve_api_key(), None);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("anima.toml");
        std::fs::write(&path, "[prompt]\nsnippet_chars = 80\n").expect("write");
        let config = AnimaConfig::from_file(&path).expect("load");
        assert_eq!(config.prompt.snippet_chars, 80);
    }

    #[test]
    fn serialized_default_round_trips() {
        let text = toml::to_string(&AnimaConfig::default()).expect("serialize");
        let back = AnimaConfig::from_toml(&text).expect("parse back");
        assert_eq!(back.llm.model, "gpt-4o");
    }
}
