//! Shared runtime handed to every persona: the model, the configuration and
//! the prompt assembler.

use std::sync::Arc;

use anima_core::config::LlmConfig;
use anima_core::AnimaConfig;
use anima_llm::{LanguageModel, LlmClient, LlmError, LlmProvider};
use tracing::info;

use crate::assembler::PromptAssembler;
use crate::error::Result;

/// Cheaply clonable bundle of what personas share.
#[derive(Clone)]
pub struct PersonaRuntime {
    /// The language-model collaborator.
    pub model: Arc<dyn LanguageModel>,
    /// Validated configuration.
    pub config: Arc<AnimaConfig>,
    /// Prompt builder, including any template overrides.
    pub assembler: Arc<PromptAssembler>,
}

impl std::fmt::Debug for PersonaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaRuntime")
            .field("config", &self.config)
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}

impl PersonaRuntime {
    /// Build a runtime around an injected model.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the prompt
    /// template directory cannot be loaded.
    pub fn new(model: Arc<dyn LanguageModel>, config: AnimaConfig) -> Result<Self> {
        config.validate()?;
        let assembler = PromptAssembler::from_config(&config.prompt)?;
        let overrides: Vec<String> = assembler
            .engine()
            .versions()
            .into_iter()
            .filter(|(_, version)| version != "builtin")
            .map(|(id, version)| format!("{id}@{version}"))
            .collect();
        if !overrides.is_empty() {
            info!(templates = ?overrides, "Prompt overrides active");
        }
        Ok(Self {
            model,
            config: Arc::new(config),
            assembler: Arc::new(assembler),
        })
    }

    /// Build a runtime whose model is the HTTP client described by
    /// `config.llm`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider settings are unusable.
    pub fn from_config(config: AnimaConfig) -> Result<Self> {
        let client = client_from_config(&config.llm)?;
        Self::new(Arc::new(client), config)
    }
}

/// Construct an [`LlmClient`] from the `[llm]` section.
///
/// # Errors
///
/// Returns [`LlmError::ConfigError`] for an unknown provider or a hosted
/// provider without an API key.
pub fn client_from_config(config: &LlmConfig) -> Result<LlmClient> {
    let base_url = config.base_url.clone();
    let require_key = || {
        config.resolve_api_key().ok_or_else(|| {
            LlmError::ConfigError(format!(
                "provider '{}' needs an API key (llm.api_key or ${})",
                config.provider, config.api_key_env
            ))
        })
    };

    let provider = match config.provider.to_ascii_lowercase().as_str() {
        "openai" => LlmProvider::OpenAiCompatible { base_url, api_key: require_key()? },
        "gemini" => LlmProvider::Gemini { base_url, api_key: require_key()? },
        "ollama" => LlmProvider::Ollama { base_url },
        "none" => return Ok(LlmClient::none()),
        other => {
            return Err(LlmError::ConfigError(format!("unknown llm provider '{other}'")).into());
        }
    };

    info!(provider = provider.name(), model = %config.model, "LLM client configured");
    Ok(LlmClient::new(provider, config.model.clone(), config.max_retries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use anima_llm::{LlmRequest, ScriptedModel};

    fn llm(provider: &str, key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: provider.into(),
            api_key: key.map(str::to_string),
            api_key_env: "ANIMA_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn ollama_needs_no_key() {
        let client = client_from_config(&llm("ollama", None)).expect("ok");
        assert_eq!(client.provider().name(), "ollama");
    }

    #[test]
    fn hosted_providers_need_a_key() {
        for provider in ["openai", "gemini"] {
            let err = client_from_config(&llm(provider, None)).expect_err("no key");
            assert!(matches!(err, EngineError::Llm(LlmError::ConfigError(_))));
            assert!(client_from_config(&llm(provider, Some("k"))).is_ok());
        }
    }

    #[test]
    fn provider_name_is_case_insensitive() {
        let client = client_from_config(&llm("Gemini", Some("k"))).expect("ok");
        assert_eq!(client.provider().name(), "gemini");
    }

    #[test]
    fn none_and_unknown() {
        assert!(!client_from_config(&llm("none", None)).expect("ok").is_available());
        assert!(client_from_config(&llm("bard", None)).is_err());
    }

    #[test]
    fn runtime_rejects_invalid_config() {
        let mut config = AnimaConfig::default();
        config.mood.decay_rate = 2.0;
        let err = PersonaRuntime::new(Arc::new(ScriptedModel::new()), config).expect_err("invalid");
        assert!(matches!(err, EngineError::Core(_)));
    }

    #[tokio::test]
    async fn from_config_builds_the_configured_client() {
        let mut config = AnimaConfig::default();
        config.llm = llm("none", None);
        let runtime = PersonaRuntime::from_config(config).expect("runtime");
        let err = runtime.model.generate(&LlmRequest::new("hi")).await.expect_err("no provider");
        assert!(matches!(err, LlmError::Unavailable(_)));

        let mut config = AnimaConfig::default();
        config.llm = llm("openai", None);
        assert!(matches!(
            PersonaRuntime::from_config(config),
            Err(EngineError::Llm(LlmError::ConfigError(_)))
        ));
    }
}
