//! Identity and lifecycle types shared across the ANIMA crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::mood::MoodState;
use crate::personality::TraitProfile;
use crate::style::StyleCorpus;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for a persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonaId(pub Uuid);

impl PersonaId {
    /// Create a new random persona ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PersonaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a persona was invented for this system or already exists in some
/// body of work (novel, film, public figure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Originality {
    /// Invented character; derived from internal knowledge only.
    #[default]
    Original,
    /// Existing character; derivation may use web-grounded lookup.
    Existing,
}

impl Originality {
    /// Whether elicitation for this persona should be web-grounded.
    #[must_use]
    pub fn is_grounded(self) -> bool {
        matches!(self, Self::Existing)
    }
}

/// Who the persona is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaIdentity {
    /// Display name, used verbatim in prompts.
    pub name: String,
    /// Free-text gender, used verbatim in prompts.
    pub gender: String,
    /// Original or existing character.
    #[serde(default)]
    pub originality: Originality,
}

impl PersonaIdentity {
    /// Create a new identity.
    #[must_use]
    pub fn new(name: impl Into<String>, gender: impl Into<String>, originality: Originality) -> Self {
        Self {
            name: name.into(),
            gender: gender.into(),
            originality,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle phase of a persona.
///
/// Ordered: a later phase implies every capability of an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaPhase {
    /// Default profile and mood; no derivation has run.
    #[default]
    Uninitialized,
    /// The trait profile has been derived (or defaults retained).
    ProfileReady,
    /// A style corpus has been set.
    StyleReady,
}

impl fmt::Display for PersonaPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::ProfileReady => "profile_ready",
            Self::StyleReady => "style_ready",
        };
        write!(f, "{name}")
    }
}

/// Serializable copy of everything a persona owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSnapshot {
    /// Persona identifier.
    pub id: PersonaId,
    /// Name, gender, originality.
    pub identity: PersonaIdentity,
    /// Lifecycle phase at snapshot time.
    pub phase: PersonaPhase,
    /// Static personality.
    pub profile: TraitProfile,
    /// Dynamic emotional state.
    pub mood: MoodState,
    /// Tone exemplars.
    pub style: StyleCorpus,
    /// Wall-clock time the snapshot was taken.
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered() {
        assert!(PersonaPhase::Uninitialized < PersonaPhase::ProfileReady);
        assert!(PersonaPhase::ProfileReady < PersonaPhase::StyleReady);
    }

    #[test]
    fn only_existing_characters_are_grounded() {
        assert!(!Originality::Original.is_grounded());
        assert!(Originality::Existing.is_grounded());
    }

    #[test]
    fn identity_defaults_to_original_when_field_missing() {
        let identity: PersonaIdentity =
            serde_json::from_str(r#"{"name":"Mira","gender":"female"}"#).expect("parse");
        assert_eq!(identity.originality, Originality::Original);
    }
}
