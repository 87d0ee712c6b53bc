//! Prompt assembly — turns persona state into the instructions that
//! condition every conversational model call.
//!
//! A turn request carries:
//!
//! ```text
//! system  = identity anchor + trait block
//!           + "\n\n"
//!           + mood header + three-step self-audit (reinforcement)
//! history = caller history, normalized to user/assistant roles
//! prompt  = the latest user input, never duplicated into history
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use anima_core::config::{LlmConfig, PromptConfig};
use anima_core::{MoodState, PersonaIdentity, StyleCorpus, Trait, TraitProfile};
use anima_llm::{ChatMessage, LlmRequest, PromptEngine, PromptId, Role};

use crate::error::Result;

/// Appended to a truncated input snippet.
pub const ELLIPSIS: &str = "...";

/// One turn of caller-supplied history, with the role still as free text.
///
/// Hosts pass whatever role vocabulary their transport uses; the assembler
/// maps it onto [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Raw role, e.g. "user", "assistant", "model", "system".
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatTurn {
    /// Create a turn.
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Borrowed view of the persona state a prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct PersonaView<'a> {
    /// Name, gender, originality.
    pub identity: &'a PersonaIdentity,
    /// Static personality.
    pub profile: &'a TraitProfile,
    /// Current emotional state.
    pub mood: &'a MoodState,
    /// Tone exemplars.
    pub style: &'a StyleCorpus,
}

/// Builds system instructions, reinforcement blocks and turn requests.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    engine: PromptEngine,
    snippet_chars: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(PromptEngine::builtin(), 50)
    }
}

impl PromptAssembler {
    /// Create an assembler over `engine`, quoting at most `snippet_chars`
    /// characters of user input in the self-audit.
    #[must_use]
    pub fn new(engine: PromptEngine, snippet_chars: usize) -> Self {
        Self { engine, snippet_chars }
    }

    /// Built-in templates, or built-ins overlaid with `template_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template directory cannot be loaded.
    pub fn from_config(config: &PromptConfig) -> Result<Self> {
        let engine = match &config.template_dir {
            Some(dir) => PromptEngine::from_directory(dir)?,
            None => PromptEngine::builtin(),
        };
        Ok(Self::new(engine, config.snippet_chars))
    }

    /// The template engine, shared with elicitation.
    #[must_use]
    pub fn engine(&self) -> &PromptEngine {
        &self.engine
    }

    /// Identity anchor followed by the trait block.
    ///
    /// # Errors
    ///
    /// Returns an error if a template is missing from the engine.
    pub fn system_instruction(&self, identity: &PersonaIdentity, profile: &TraitProfile) -> Result<String> {
        let anchor = self.engine.render(
            PromptId::IdentityAnchor,
            &[("name", identity.name.as_str()), ("gender", identity.gender.as_str())],
        )?;

        let details = trait_details(profile);
        let scalars = trait_scalars(profile);
        let mut vars = as_vars(&scalars);
        vars.push(("trait_details", details.as_str()));
        let block = self.engine.render(PromptId::TraitBlock, &vars)?;

        Ok(format!("{anchor}\n\n{block}"))
    }

    /// Mood header above the self-audit, rebuilt every turn.
    ///
    /// # Errors
    ///
    /// Returns an error if a template is missing from the engine.
    pub fn reinforcement(&self, view: PersonaView<'_>, user_input: &str) -> Result<String> {
        let label = view.mood.classify();
        let readout = view.mood.readout();
        let header = self.engine.render(
            PromptId::MoodHeader,
            &[("mood_label", label.as_str()), ("mood_readout", readout.as_str())],
        )?;

        let snippet = truncate_snippet(user_input, self.snippet_chars);
        let corpus = view.style.joined();
        let scalars = trait_scalars(view.profile);
        let mut vars = as_vars(&scalars);
        vars.extend([
            ("name", view.identity.name.as_str()),
            ("snippet", snippet.as_str()),
            ("style_corpus", corpus.as_str()),
        ]);
        let audit = self.engine.render(PromptId::SelfAudit, &vars)?;

        Ok(format!("{header}\n{audit}"))
    }

    /// Full request for one conversational turn.
    ///
    /// # Errors
    ///
    /// Returns an error if a template is missing from the engine.
    pub fn assemble_turn(
        &self,
        view: PersonaView<'_>,
        user_input: &str,
        history: &[ChatTurn],
        llm: &LlmConfig,
    ) -> Result<LlmRequest> {
        let system = self.system_instruction(view.identity, view.profile)?;
        let reinforcement = self.reinforcement(view, user_input)?;
        let history = normalize_history(history);

        debug!(
            persona = %view.identity.name,
            system_chars = system.len() + reinforcement.len(),
            history = history.len(),
            "Assembled turn"
        );

        Ok(LlmRequest::new(user_input)
            .with_system(format!("{system}\n\n{reinforcement}"))
            .with_history(history)
            .with_web_search(false)
            .with_sampling(llm.max_tokens, llm.temperature)
            .with_timeout(llm.request_timeout_ms))
    }
}

/// First `max_chars` Unicode scalar values of `input`, plus [`ELLIPSIS`]
/// when anything was cut.
#[must_use]
pub fn truncate_snippet(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &input[..cut]),
        None => input.to_string(),
    }
}

/// Keep user and assistant turns in order, mapping `model` to assistant.
///
/// System turns are dropped: the persona's own system instruction is the
/// only one the model sees. Unknown roles are dropped too.
#[must_use]
pub fn normalize_history(history: &[ChatTurn]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter_map(|turn| match Role::from_str(&turn.role) {
            Ok(Role::System) => None,
            Ok(role) => Some(ChatMessage {
                role,
                content: turn.content.clone(),
            }),
            Err(_) => {
                debug!(role = %turn.role, "Dropping history turn with unknown role");
                None
            }
        })
        .collect()
}

/// The five scores formatted to two decimals, keyed by template name.
pub(crate) fn trait_scalars(profile: &TraitProfile) -> Vec<(&'static str, String)> {
    Trait::ALL
        .iter()
        .map(|&t| (t.key(), format!("{:.2}", profile.score(t))))
        .collect()
}

pub(crate) fn as_vars<'a>(owned: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    owned.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

fn trait_details(profile: &TraitProfile) -> String {
    let mut out = String::new();
    if !profile.labels.is_empty() {
        out.push_str("\nTraits: ");
        out.push_str(&profile.labels.join(", "));
    }
    out.push_str("\nSummary: ");
    out.push_str(&profile.describe());
    if !profile.provenance.source_work.is_empty() {
        out.push_str("\nKnown from: ");
        out.push_str(&profile.provenance.source_work.join(", "));
    }
    out
}
