//! Style corpus — example utterances that anchor the persona's voice.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single entry of a corpus with no exemplars.
pub const STYLE_PLACEHOLDER: &str =
    "No style exemplars available; use the standard persona voice.";

/// One elicited exemplar, as returned by the style elicitation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleExample {
    /// Situation the line is spoken in.
    pub scene: String,
    /// What the persona thinks but does not say.
    pub inner_monologue: String,
    /// The spoken line.
    pub dialogue: String,
    /// Delivery: gestures, tone of voice.
    pub action_and_tone: String,
    /// Mood while speaking.
    pub mood: String,
}

impl StyleExample {
    /// Read an elicited object field by field. Missing, null or non-string
    /// fields become empty strings; `None` only if `value` is not an object.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Some(Self {
            scene: field("scene"),
            inner_monologue: field("inner_monologue"),
            dialogue: field("dialogue"),
            action_and_tone: field("action_and_tone"),
            mood: field("mood"),
        })
    }

    /// Compact `[mood] dialogue (tone)` form used in prompts.
    #[must_use]
    pub fn compact(&self) -> String {
        format!(
            "[{}] {} ({})",
            self.mood.trim(),
            self.dialogue.trim(),
            self.action_and_tone.trim()
        )
    }
}

/// Ordered exemplars. Never empty: an empty corpus holds [`STYLE_PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCorpus")]
pub struct StyleCorpus {
    entries: Vec<String>,
}

#[derive(Deserialize)]
struct RawCorpus {
    #[serde(default)]
    entries: Vec<String>,
}

impl From<RawCorpus> for StyleCorpus {
    fn from(raw: RawCorpus) -> Self {
        Self::from_examples(raw.entries)
    }
}

impl Default for StyleCorpus {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl StyleCorpus {
    /// The no-exemplar corpus.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            entries: vec![STYLE_PLACEHOLDER.to_string()],
        }
    }

    /// Use caller-supplied examples verbatim, in order.
    ///
    /// An empty list yields the placeholder corpus.
    #[must_use]
    pub fn from_examples<I, S>(examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = examples.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            Self::placeholder()
        } else {
            Self { entries }
        }
    }

    /// Build from an elicited JSON array of [`StyleExample`] objects.
    ///
    /// Entries that are not objects or have a blank `dialogue` are dropped;
    /// other fields may be missing or malformed. Anything that leaves no
    /// usable entry gives the placeholder corpus.
    #[must_use]
    pub fn from_elicited(value: &Value) -> Self {
        let Some(items) = value.as_array() else {
            return Self::placeholder();
        };

        let entries = items
            .iter()
            .filter_map(StyleExample::from_value)
            .filter(|example| !example.dialogue.trim().is_empty())
            .map(|example| example.compact());

        Self::from_examples(entries)
    }

    /// Entries in order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of entries (the placeholder counts as one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this corpus is the no-exemplar placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.entries.len() == 1 && self.entries[0] == STYLE_PLACEHOLDER
    }

    /// Entries joined with newlines, for prompt interpolation.
    #[must_use]
    pub fn joined(&self) -> String {
        self.entries.join("\n")
    }
}
