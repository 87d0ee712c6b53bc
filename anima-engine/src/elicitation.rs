//! Elicitation — asking the model who a persona is and how they sound.
//!
//! Two derivations run through here: the Big Five trait profile (from a
//! free-text description) and the style corpus (from the profile). Each has
//! an original variant, which relies on the model's own knowledge, and a
//! grounded variant for existing characters, which asks for web search.

use anima_core::config::LlmConfig;
use anima_core::extract::extract_structured;
use anima_core::{AnimaError, PersonaIdentity, Provenance, StyleCorpus, TraitProfile};
use anima_llm::{LlmRequest, PromptEngine, PromptId};

use crate::assembler::{as_vars, trait_scalars};
use crate::error::Result;

/// Text used for a list nothing is known about.
const NONE_KNOWN: &str = "none known";

/// What is already known about an existing character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingContext {
    /// Works the character appears in.
    pub source_work: Vec<String>,
    /// Search keywords.
    pub keywords: Vec<String>,
}

impl From<&Provenance> for GroundingContext {
    fn from(p: &Provenance) -> Self {
        Self {
            source_work: p.source_work.clone(),
            keywords: p.keywords.clone(),
        }
    }
}

/// How a derivation consults the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElicitationMode {
    /// Invented character: model knowledge only, no web search.
    Original,
    /// Existing character: web-grounded, seeded with known provenance.
    Grounded(GroundingContext),
}

impl ElicitationMode {
    /// Mode for a persona, seeded from whatever provenance it already has.
    #[must_use]
    pub fn for_persona(identity: &PersonaIdentity, provenance: &Provenance) -> Self {
        if identity.originality.is_grounded() {
            Self::Grounded(GroundingContext::from(provenance))
        } else {
            Self::Original
        }
    }

    /// Whether calls in this mode request web search.
    #[must_use]
    pub fn web_search(&self) -> bool {
        matches!(self, Self::Grounded(_))
    }
}

/// Result of a derivation step. Failures never raise; they are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivationOutcome {
    /// New state was derived and stored.
    Derived,
    /// The model answered but nothing usable came back; the documented
    /// fallback (the style placeholder) was stored.
    Fallback {
        /// Why the answer was unusable.
        reason: String,
    },
    /// The call failed; prior state was kept.
    Retained {
        /// Why the call failed.
        reason: String,
    },
}

impl DerivationOutcome {
    /// Whether new state was derived from the model's answer.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Derived)
    }
}

/// Request asking for the five trait scores of a described character.
///
/// # Errors
///
/// Returns an error if the template is missing from `engine`.
pub fn trait_request(
    engine: &PromptEngine,
    identity: &PersonaIdentity,
    description: &str,
    mode: &ElicitationMode,
    llm: &LlmConfig,
) -> Result<LlmRequest> {
    let id = match mode {
        ElicitationMode::Original => PromptId::TraitElicitationOriginal,
        ElicitationMode::Grounded(_) => PromptId::TraitElicitationGrounded,
    };
    let vars = [
        ("name", identity.name.as_str()),
        ("gender", identity.gender.as_str()),
        ("description", description.trim()),
    ];
    request_for(engine, id, &vars, mode.web_search(), llm)
}

/// Request asking for example lines in the persona's voice.
///
/// # Errors
///
/// Returns an error if the template is missing from `engine`.
pub fn style_request(
    engine: &PromptEngine,
    identity: &PersonaIdentity,
    profile: &TraitProfile,
    mode: &ElicitationMode,
    llm: &LlmConfig,
) -> Result<LlmRequest> {
    let scalars = trait_scalars(profile);
    let traits = list_or_none(&profile.labels);
    let (source_work, keywords) = match mode {
        ElicitationMode::Original => (String::new(), String::new()),
        ElicitationMode::Grounded(ctx) => (list_or_none(&ctx.source_work), list_or_none(&ctx.keywords)),
    };

    let mut vars = as_vars(&scalars);
    vars.extend([
        ("name", identity.name.as_str()),
        ("gender", identity.gender.as_str()),
        ("traits", traits.as_str()),
        ("source_work", source_work.as_str()),
        ("keywords", keywords.as_str()),
    ]);

    let id = match mode {
        ElicitationMode::Original => PromptId::StyleElicitationOriginal,
        ElicitationMode::Grounded(_) => PromptId::StyleElicitationGrounded,
    };
    request_for(engine, id, &vars, mode.web_search(), llm)
}

/// Apply a trait elicitation answer to `profile`.
///
/// # Errors
///
/// Returns [`AnimaError::Extraction`] if no JSON object can be recovered;
/// `profile` is untouched in that case.
pub fn interpret_traits(text: &str, profile: &mut TraitProfile) -> std::result::Result<(), AnimaError> {
    let value = extract_structured(text)
        .ok_or_else(|| AnimaError::Extraction("no JSON found in trait elicitation answer".into()))?;
    profile.apply_elicited(&value)
}

/// Build a corpus from a style elicitation answer.
///
/// The second element is `None` when at least one exemplar was usable, or
/// the reason the placeholder was used instead.
#[must_use]
pub fn interpret_style(text: &str) -> (StyleCorpus, Option<String>) {
    match extract_structured(text) {
        Some(value) => {
            let corpus = StyleCorpus::from_elicited(&value);
            if corpus.is_placeholder() {
                (corpus, Some("no usable exemplars in style answer".into()))
            } else {
                (corpus, None)
            }
        }
        None => (StyleCorpus::placeholder(), Some("no JSON found in style answer".into())),
    }
}

fn request_for(
    engine: &PromptEngine,
    id: PromptId,
    vars: &[(&str, &str)],
    web_search: bool,
    llm: &LlmConfig,
) -> Result<LlmRequest> {
    let prompt = engine.render(id, vars)?;
    let (max_tokens, temperature) = engine
        .get(id)
        .map_or((llm.max_tokens, llm.temperature), |t| (t.max_tokens, t.temperature));
    Ok(LlmRequest::new(prompt)
        .with_web_search(web_search)
        .with_sampling(max_tokens, temperature)
        .with_timeout(llm.request_timeout_ms))
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE_KNOWN.to_string()
    } else {
        items.join(", ")
    }
}
