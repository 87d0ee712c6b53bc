//! # anima-llm — Language-Model Collaborator for ANIMA
//!
//! Everything the persona engine needs to talk to a model:
//!   - **[`LanguageModel`]** — the async seam the engine depends on
//!   - **[`LlmClient`]** — HTTP implementation (OpenAI-compatible, Ollama,
//!     Gemini) with per-attempt timeouts and retries
//!   - **[`ScriptedModel`]** — deterministic stand-in for tests
//!   - **[`prompt`]** — versioned prompt templates with TOML overrides
//!
//! A call returns `Ok(Some(_))` with text, `Ok(None)` when the provider
//! answered with nothing, or a typed [`LlmError`].

pub mod client;
pub mod error;
pub mod mock;
pub mod prompt;
pub mod types;

pub use client::{LanguageModel, LlmClient, LlmProvider};
pub use error::LlmError;
pub use mock::ScriptedModel;
pub use prompt::{PromptEngine, PromptId};
pub use types::{ChatMessage, LlmRequest, LlmResponse, Role};
