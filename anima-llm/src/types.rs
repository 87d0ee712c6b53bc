//! Core types for LLM requests and responses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Speaker of a conversation turn, in the provider-neutral vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The persona's earlier replies.
    Assistant,
    /// Out-of-band instructions.
    System,
}

impl Role {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Case-insensitive. `model` (Gemini's name for the assistant) maps to
    /// [`Role::Assistant`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" | "model" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown role: '{other}'")),
        }
    }
}

/// One prior turn of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl ChatMessage {
    /// A user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A request to the language model.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// The newest user message. Never duplicated into `history`.
    pub prompt: String,
    /// Earlier turns, oldest first.
    pub history: Vec<ChatMessage>,
    /// System instruction, if any.
    pub system: Option<String>,
    /// Ask the provider to ground its answer with web search.
    pub web_search: bool,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Per-attempt HTTP timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// A single-shot request with no history and no system instruction.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            system: None,
            web_search: false,
            max_tokens: 1024,
            temperature: 0.8,
            timeout_ms: 30_000,
        }
    }

    /// Set the system instruction.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the prior turns.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Enable or disable web-search grounding.
    #[must_use]
    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    /// Set sampling parameters.
    #[must_use]
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the language model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated (0 when the provider does not say).
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("USER".parse::<Role>(), Ok(Role::User));
        assert_eq!(" Assistant ".parse::<Role>(), Ok(Role::Assistant));
        assert_eq!("model".parse::<Role>(), Ok(Role::Assistant));
        assert_eq!("System".parse::<Role>(), Ok(Role::System));
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = ChatMessage::assistant("hi");
        let json = serde_json::to_string(&msg).expect("serialize");
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn request_builder() {
        let req = LlmRequest::new("hello")
            .with_system("be nice")
            .with_history(vec![ChatMessage::user("earlier")])
            .with_web_search(true)
            .with_sampling(64, 0.2)
            .with_timeout(500);
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.system.as_deref(), Some("be nice"));
        assert_eq!(req.history.len(), 1);
        assert!(req.web_search);
        assert_eq!(req.max_tokens, 64);
        assert_eq!(req.timeout_ms, 500);
    }
}
