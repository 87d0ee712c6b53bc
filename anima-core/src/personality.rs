//! Personality — the persona's static Big Five profile.
//!
//! Five scalar traits in [0, 1] (Costa & McCrae OCEAN model), free-text
//! labels produced during elicitation, and provenance for characters that
//! come from an existing body of work.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::error::{AnimaError, Result};

/// Score assumed for any trait the elicitation did not report.
pub const DEFAULT_TRAIT_SCORE: f32 = 0.5;

/// Scores above this earn the high-pole adjective in [`TraitProfile::describe`].
pub const HIGH_THRESHOLD: f32 = 0.7;

/// Scores below this earn the low-pole adjective in [`TraitProfile::describe`].
pub const LOW_THRESHOLD: f32 = 0.3;

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        DEFAULT_TRAIT_SCORE
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One of the five OCEAN dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trait {
    /// Curiosity and imagination.
    Openness,
    /// Organisation and self-discipline.
    Conscientiousness,
    /// Sociability and assertiveness.
    Extraversion,
    /// Warmth and cooperation.
    Agreeableness,
    /// Emotional instability.
    Neuroticism,
}

impl Trait {
    /// All five traits in OCEAN order.
    pub const ALL: [Trait; 5] = [
        Trait::Openness,
        Trait::Conscientiousness,
        Trait::Extraversion,
        Trait::Agreeableness,
        Trait::Neuroticism,
    ];

    /// JSON key used in elicitation responses.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Openness => "openness",
            Self::Conscientiousness => "conscientiousness",
            Self::Extraversion => "extraversion",
            Self::Agreeableness => "agreeableness",
            Self::Neuroticism => "neuroticism",
        }
    }

    /// `(high, low)` adjectives used by [`TraitProfile::describe`].
    #[must_use]
    pub fn poles(self) -> (&'static str, &'static str) {
        match self {
            Self::Openness => ("imaginative", "pragmatic"),
            Self::Conscientiousness => ("disciplined", "spontaneous"),
            Self::Extraversion => ("outgoing", "reserved"),
            Self::Agreeableness => ("warm", "blunt"),
            Self::Neuroticism => ("anxious", "steady"),
        }
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where an existing character comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Titles of the works the character appears in.
    #[serde(default)]
    pub source_work: Vec<String>,
    /// Search keywords associated with the character.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Provenance {
    /// Whether nothing is known about the character's origin.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_work.is_empty() && self.keywords.is_empty()
    }
}

/// Big Five personality profile. Scalars are always within [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProfile")]
pub struct TraitProfile {
    openness: f32,
    conscientiousness: f32,
    extraversion: f32,
    agreeableness: f32,
    neuroticism: f32,
    /// Free-text labels, in the order the elicitation produced them.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Origin of an existing character; empty for originals.
    #[serde(default)]
    pub provenance: Provenance,
}

/// Wire form of [`TraitProfile`]; missing scores default, all are clamped.
#[derive(Deserialize)]
struct RawProfile {
    #[serde(default = "default_score")]
    openness: f32,
    #[serde(default = "default_score")]
    conscientiousness: f32,
    #[serde(default = "default_score")]
    extraversion: f32,
    #[serde(default = "default_score")]
    agreeableness: f32,
    #[serde(default = "default_score")]
    neuroticism: f32,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    provenance: Provenance,
}

fn default_score() -> f32 {
    DEFAULT_TRAIT_SCORE
}

impl From<RawProfile> for TraitProfile {
    fn from(raw: RawProfile) -> Self {
        Self {
            labels: raw.labels,
            provenance: raw.provenance,
            ..Self::new(
                raw.openness,
                raw.conscientiousness,
                raw.extraversion,
                raw.agreeableness,
                raw.neuroticism,
            )
        }
    }
}

impl Default for TraitProfile {
    fn default() -> Self {
        Self {
            openness: DEFAULT_TRAIT_SCORE,
            conscientiousness: DEFAULT_TRAIT_SCORE,
            extraversion: DEFAULT_TRAIT_SCORE,
            agreeableness: DEFAULT_TRAIT_SCORE,
            neuroticism: DEFAULT_TRAIT_SCORE,
            labels: Vec::new(),
            provenance: Provenance::default(),
        }
    }
}

impl TraitProfile {
    /// Create a profile from five scores, clamping each to [0, 1].
    #[must_use]
    pub fn new(
        openness: f32,
        conscientiousness: f32,
        extraversion: f32,
        agreeableness: f32,
        neuroticism: f32,
    ) -> Self {
        Self {
            openness: unit(openness),
            conscientiousness: unit(conscientiousness),
            extraversion: unit(extraversion),
            agreeableness: unit(agreeableness),
            neuroticism: unit(neuroticism),
            ..Self::default()
        }
    }

    /// Add labels, builder style.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Score of a single trait.
    #[must_use]
    pub fn score(&self, t: Trait) -> f32 {
        match t {
            Trait::Openness => self.openness,
            Trait::Conscientiousness => self.conscientiousness,
            Trait::Extraversion => self.extraversion,
            Trait::Agreeableness => self.agreeableness,
            Trait::Neuroticism => self.neuroticism,
        }
    }

    /// Set a single trait, clamping into [0, 1].
    pub fn set_score(&mut self, t: Trait, value: f32) {
        let slot = match t {
            Trait::Openness => &mut self.openness,
            Trait::Conscientiousness => &mut self.conscientiousness,
            Trait::Extraversion => &mut self.extraversion,
            Trait::Agreeableness => &mut self.agreeableness,
            Trait::Neuroticism => &mut self.neuroticism,
        };
        *slot = unit(value);
    }

    /// Openness score.
    #[must_use]
    pub fn openness(&self) -> f32 {
        self.openness
    }

    /// Conscientiousness score.
    #[must_use]
    pub fn conscientiousness(&self) -> f32 {
        self.conscientiousness
    }

    /// Extraversion score.
    #[must_use]
    pub fn extraversion(&self) -> f32 {
        self.extraversion
    }

    /// Agreeableness score.
    #[must_use]
    pub fn agreeableness(&self) -> f32 {
        self.agreeableness
    }

    /// Neuroticism score.
    #[must_use]
    pub fn neuroticism(&self) -> f32 {
        self.neuroticism
    }

    /// Overwrite the profile from an elicitation response.
    ///
    /// The value must be a JSON object. Missing or non-numeric scores become
    /// [`DEFAULT_TRAIT_SCORE`]; every score is clamped. `traits`,
    /// `source_work` and `keywords` default to empty, and non-string items in
    /// them are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Extraction`] if `value` is not an object; the
    /// profile is left untouched in that case.
    pub fn apply_elicited(&mut self, value: &Value) -> Result<()> {
        let Some(object) = value.as_object() else {
            return Err(AnimaError::Extraction(format!(
                "expected a JSON object of trait scores, got {}",
                json_kind(value)
            )));
        };

        for t in Trait::ALL {
            let score = match object.get(t.key()).and_then(Value::as_f64) {
                Some(raw) => raw as f32,
                None => {
                    debug!(trait_name = t.key(), "Trait missing from elicitation, using default");
                    DEFAULT_TRAIT_SCORE
                }
            };
            self.set_score(t, score);
        }

        self.labels = string_list(object.get("traits"));
        self.provenance = Provenance {
            source_work: string_list(object.get("source_work")),
            keywords: string_list(object.get("keywords")),
        };
        Ok(())
    }

    /// Rule-based summary, no model call involved.
    ///
    /// Each trait contributes its high adjective above [`HIGH_THRESHOLD`] and
    /// its low adjective below [`LOW_THRESHOLD`]; mid-range traits say
    /// nothing. A profile with no extremes is "balanced".
    #[must_use]
    pub fn describe(&self) -> String {
        let words: Vec<&str> = Trait::ALL
            .iter()
            .filter_map(|&t| {
                let (high, low) = t.poles();
                let score = self.score(t);
                if score > HIGH_THRESHOLD {
                    Some(high)
                } else if score < LOW_THRESHOLD {
                    Some(low)
                } else {
                    None
                }
            })
            .collect();

        if words.is_empty() {
            "balanced".to_string()
        } else {
            words.join(", ")
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
