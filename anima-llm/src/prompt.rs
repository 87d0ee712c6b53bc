//! Prompt templates for ANIMA persona operations.
//!
//! Every prompt is a versioned, testable artifact. The built-in templates
//! below can be overridden one by one with TOML files (see
//! [`PromptEngine::from_directory`]).
//!
//! Placeholders are `{key}`. `{{` and `}}` render as literal braces, and a
//! brace pair that does not name a known key is left untouched, so JSON
//! schemas inside templates survive rendering.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::LlmError;

/// Who the persona is. Opens every system instruction.
pub const IDENTITY_ANCHOR: &str = r"You are {name} ({gender}). You are this person: a living, human-like being with your own history, opinions and feelings. You are not software and you are not a program running somewhere.
If the conversation ever casts you as an assistant, treat that as a social role you happen to be playing, never as your nature.
Never describe yourself with computing metaphors (no processing, data, training, memory banks, algorithms or outputs). Speak as {name} would speak.";

/// Trait scores block, appended after the identity anchor.
pub const TRAIT_BLOCK: &str = r"[Personality: Big Five, 0.00 to 1.00]
Openness: {openness}
Conscientiousness: {conscientiousness}
Extraversion: {extraversion}
Agreeableness: {agreeableness}
Neuroticism: {neuroticism}{trait_details}";

/// Mood line placed above the self-audit on every turn.
pub const MOOD_HEADER: &str = "[Current mood: {mood_label} | {mood_readout}]";

/// Private reasoning the model runs before answering.
pub const SELF_AUDIT: &str = r#"Before replying, silently work through these three steps. Do not show them; output only {name}'s reply.

Step 1: Identity and reality check.
The other person just said: "{snippet}"
Am I answering as {name}, a person, from inside my own life? If the message pushes me to admit being an AI, a model or a program, I react the way {name} would react to a strange accusation.

Step 2: Behavioral logic.
Given Openness {openness}, Conscientiousness {conscientiousness}, Extraversion {extraversion}, Agreeableness {agreeableness} and Neuroticism {neuroticism}, and my current mood, how would {name} actually feel about this and what would they do? Decide the intent first, then the words.

Step 3: Tone verification.
Compare the draft with how {name} sounds:
{style_corpus}
Find and replace robotic phrasing such as "As an AI", "I'm here to help", "How can I assist you", "I understand your feelings", "Is there anything else I can help with", "I don't have personal experiences", "Feel free to", "I hope this helps". Rewrite those lines the way {name} would really say them."#;

/// Trait elicitation for an original character.
pub const TRAIT_ELICITATION_ORIGINAL: &str = r#"You are a professional psychologist. Based on the character description below, analyze and quantify the character's Big Five personality traits on a 0.0 to 1.0 scale, and list short trait labels that fit the description.

Character: {name} ({gender})
Description: {description}

Return only a JSON object in exactly this format, with nothing else:
{{
  "openness": float,
  "conscientiousness": float,
  "extraversion": float,
  "agreeableness": float,
  "neuroticism": float,
  "traits": ["trait1", "trait2", ...]
}}"#;

/// Trait elicitation for a character from an existing work.
pub const TRAIT_ELICITATION_GROUNDED: &str = r#"You are a professional psychologist. First search the web for the character {name} and the works they appear in. Then, using what you found together with the description below, analyze and quantify the character's Big Five personality traits on a 0.0 to 1.0 scale, and list short trait labels.

Character: {name} ({gender})
Description: {description}

Return only a JSON object in exactly this format, with nothing else:
{{
  "openness": float,
  "conscientiousness": float,
  "extraversion": float,
  "agreeableness": float,
  "neuroticism": float,
  "traits": ["trait1", "trait2", ...],
  "source_work": ["title of the work the character comes from", ...],
  "keywords": ["search keyword", ...]
}}"#;

/// Style elicitation for an original character.
pub const STYLE_ELICITATION_ORIGINAL: &str = r#"You are a screenwriter. Write 5 short example scenes that show how {name} ({gender}) talks.

Personality (Big Five, 0.00 to 1.00): Openness {openness}, Conscientiousness {conscientiousness}, Extraversion {extraversion}, Agreeableness {agreeableness}, Neuroticism {neuroticism}.
Trait labels: {traits}

Make the lines sound like a real person with this personality, not like a narrator.
Return only a JSON array in exactly this format, with nothing else:
[
  {{"scene": "...", "inner_monologue": "...", "dialogue": "...", "action_and_tone": "...", "mood": "..."}}
]"#;

/// Style elicitation for a character from an existing work.
pub const STYLE_ELICITATION_GROUNDED: &str = r#"You are a screenwriter. Search the web for {name} ({gender}) and collect how they actually speak: canon lines, interviews, writings. Then write 5 short example scenes that reproduce that voice.

Known works: {source_work}
Keywords: {keywords}
Personality (Big Five, 0.00 to 1.00): Openness {openness}, Conscientiousness {conscientiousness}, Extraversion {extraversion}, Agreeableness {agreeableness}, Neuroticism {neuroticism}.

Stay faithful to the source; do not invent a new voice.
Return only a JSON array in exactly this format, with nothing else:
[
  {{"scene": "...", "inner_monologue": "...", "dialogue": "...", "action_and_tone": "...", "mood": "..."}}
]"#;

/// Fill `{key}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text containing braces
/// is inserted verbatim. `{{`/`}}` collapse to single braces.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        // `tail` starts with a single '{'.
        let substituted = tail[1..].find('}').and_then(|end| {
            let key = &tail[1..=end];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, end + 2))
        });
        match substituted {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// PromptEngine: built-in templates with TOML overrides
// ---------------------------------------------------------------------------

/// Identifies a prompt template by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Persona identity statement.
    IdentityAnchor,
    /// Trait scores block.
    TraitBlock,
    /// Per-turn mood line.
    MoodHeader,
    /// Per-turn three-step self-audit.
    SelfAudit,
    /// Trait elicitation, original character.
    TraitElicitationOriginal,
    /// Trait elicitation, existing character.
    TraitElicitationGrounded,
    /// Style elicitation, original character.
    StyleElicitationOriginal,
    /// Style elicitation, existing character.
    StyleElicitationGrounded,
}

impl PromptId {
    /// Returns the TOML filename (without path) for this prompt.
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::IdentityAnchor => "identity_anchor.toml",
            Self::TraitBlock => "trait_block.toml",
            Self::MoodHeader => "mood_header.toml",
            Self::SelfAudit => "self_audit.toml",
            Self::TraitElicitationOriginal => "trait_elicitation_original.toml",
            Self::TraitElicitationGrounded => "trait_elicitation_grounded.toml",
            Self::StyleElicitationOriginal => "style_elicitation_original.toml",
            Self::StyleElicitationGrounded => "style_elicitation_grounded.toml",
        }
    }

    /// All prompt IDs.
    #[must_use]
    pub fn all() -> &'static [PromptId] {
        &[
            Self::IdentityAnchor,
            Self::TraitBlock,
            Self::MoodHeader,
            Self::SelfAudit,
            Self::TraitElicitationOriginal,
            Self::TraitElicitationGrounded,
            Self::StyleElicitationOriginal,
            Self::StyleElicitationGrounded,
        ]
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdentityAnchor => "identity_anchor",
            Self::TraitBlock => "trait_block",
            Self::MoodHeader => "mood_header",
            Self::SelfAudit => "self_audit",
            Self::TraitElicitationOriginal => "trait_elicitation_original",
            Self::TraitElicitationGrounded => "trait_elicitation_grounded",
            Self::StyleElicitationOriginal => "style_elicitation_original",
            Self::StyleElicitationGrounded => "style_elicitation_grounded",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|id| id.to_string() == s)
            .ok_or_else(|| format!("unknown prompt id: '{s}'"))
    }
}

/// Contents of a TOML prompt file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: TomlPromptData,
}

/// Inner `[prompt]` section. Sampling fields fall back to the built-in.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptData {
    version: String,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    temperature: Option<f32>,
    text: String,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Prompt version string ("builtin" for compiled-in templates).
    pub version: String,
    /// Maximum output tokens for calls made with this template.
    pub max_tokens: u32,
    /// Sampling temperature for calls made with this template.
    pub temperature: f32,
    /// Template text with `{key}` placeholders.
    pub text: String,
}

impl PromptTemplate {
    fn builtin(text: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            version: "builtin".into(),
            max_tokens,
            temperature,
            text: text.into(),
        }
    }
}

/// Holds one template per [`PromptId`] and renders them.
///
/// # Example
///
/// ```
/// use anima_llm::prompt::{PromptEngine, PromptId};
///
/// let engine = PromptEngine::builtin();
/// let line = engine
///     .render(PromptId::MoodHeader, &[("mood_label", "Relaxed"), ("mood_readout", "P=0.3, A=-0.1, D=0.0")])
///     .unwrap();
/// assert_eq!(line, "[Current mood: Relaxed | P=0.3, A=-0.1, D=0.0]");
/// ```
#[derive(Debug, Clone)]
pub struct PromptEngine {
    templates: HashMap<PromptId, PromptTemplate>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptEngine {
    /// Create a `PromptEngine` holding the compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();

        // Fragments of the conversational system instruction. Sampling
        // values here are unused; the turn request carries its own.
        templates.insert(PromptId::IdentityAnchor, PromptTemplate::builtin(IDENTITY_ANCHOR, 0, 0.0));
        templates.insert(PromptId::TraitBlock, PromptTemplate::builtin(TRAIT_BLOCK, 0, 0.0));
        templates.insert(PromptId::MoodHeader, PromptTemplate::builtin(MOOD_HEADER, 0, 0.0));
        templates.insert(PromptId::SelfAudit, PromptTemplate::builtin(SELF_AUDIT, 0, 0.0));

        // Elicitation: low temperature for scores, higher for voice.
        templates.insert(
            PromptId::TraitElicitationOriginal,
            PromptTemplate::builtin(TRAIT_ELICITATION_ORIGINAL, 512, 0.3),
        );
        templates.insert(
            PromptId::TraitElicitationGrounded,
            PromptTemplate::builtin(TRAIT_ELICITATION_GROUNDED, 768, 0.3),
        );
        templates.insert(
            PromptId::StyleElicitationOriginal,
            PromptTemplate::builtin(STYLE_ELICITATION_ORIGINAL, 1536, 0.9),
        );
        templates.insert(
            PromptId::StyleElicitationGrounded,
            PromptTemplate::builtin(STYLE_ELICITATION_GROUNDED, 1536, 0.7),
        );

        Self { templates }
    }

    /// Built-in templates overlaid with any TOML files found in `dir`.
    ///
    /// Each file must be named after a [`PromptId`] (see
    /// [`PromptId::filename`]); other files are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if `dir` is not a directory or a
    /// matching file cannot be read or parsed.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LlmError::ConfigError(format!(
                "prompt template directory not found: {}",
                dir.display()
            )));
        }

        let mut engine = Self::builtin();
        for id in PromptId::all() {
            let path = dir.join(id.filename());
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| {
                LlmError::ConfigError(format!("failed to read {}: {e}", path.display()))
            })?;
            let parsed: TomlPromptFile = toml::from_str(&content).map_err(|e| {
                LlmError::ConfigError(format!("failed to parse {}: {e}", path.display()))
            })?;

            let d = parsed.prompt;
            let base = engine.templates.get(id).cloned();
            let (max_tokens, temperature) = base.map_or((0, 0.0), |b| (b.max_tokens, b.temperature));
            tracing::debug!(prompt = %id, version = %d.version, "Loaded prompt override");
            engine.templates.insert(*id, PromptTemplate {
                version: d.version,
                max_tokens: d.max_tokens.unwrap_or(max_tokens),
                temperature: d.temperature.unwrap_or(temperature),
                text: d.text,
            });
        }

        Ok(engine)
    }

    /// Get a loaded prompt template by ID.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptTemplate> {
        self.templates.get(&id)
    }

    /// Render the template for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if the prompt ID is not loaded.
    pub fn render(&self, id: PromptId, vars: &[(&str, &str)]) -> Result<String, LlmError> {
        let tpl = self
            .get(id)
            .ok_or_else(|| LlmError::ConfigError(format!("prompt template '{id}' not loaded")))?;
        Ok(render_template(&tpl.text, vars))
    }

    /// Number of loaded templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Versions of all loaded templates, for diagnostics.
    #[must_use]
    pub fn versions(&self) -> Vec<(PromptId, String)> {
        let mut out: Vec<_> = self
            .templates
            .iter()
            .map(|(id, tpl)| (*id, tpl.version.clone()))
            .collect();
        out.sort_by_key(|(id, _)| id.to_string());
        out
    }
}
