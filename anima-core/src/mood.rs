//! Mood — the persona's dynamic emotional state.
//!
//! Uses the PAD (Pleasure-Arousal-Dominance) model from Russell & Mehrabian
//! (1977). Each axis ranges from -1.0 to 1.0:
//! - **Pleasure**: unhappy (-1) → happy (+1)
//! - **Arousal**: calm / drowsy (-1) → excited / alert (+1)
//! - **Dominance**: submissive / afraid (-1) → in control (+1)
//!
//! Stimuli push the state around; periodic decay pulls it back toward calm.
//! Dominance is the most stable axis and decays at half speed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Clamp to a range, mapping NaN to zero so the range invariant always holds.
fn bounded(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(min, max)
    }
}

/// PAD emotional state plus an energy reserve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMood")]
pub struct MoodState {
    pleasure: f32,
    arousal: f32,
    dominance: f32,
    /// Reserved for fatigue modelling; nothing mutates it yet.
    energy: f32,
}

/// Wire form; every axis is re-clamped on the way in.
#[derive(Deserialize)]
struct RawMood {
    pleasure: f32,
    arousal: f32,
    dominance: f32,
    #[serde(default = "full_energy")]
    energy: f32,
}

fn full_energy() -> f32 {
    1.0
}

impl From<RawMood> for MoodState {
    fn from(raw: RawMood) -> Self {
        let mut mood = Self::new(raw.pleasure, raw.arousal, raw.dominance);
        mood.energy = if raw.energy.is_nan() { 1.0 } else { raw.energy.clamp(0.0, 1.0) };
        mood
    }
}

impl MoodState {
    /// Neutral, fully rested state.
    pub const NEUTRAL: Self = Self {
        pleasure: 0.0,
        arousal: 0.0,
        dominance: 0.0,
        energy: 1.0,
    };

    /// Create a mood, clamping each axis to [-1, 1]. Energy starts full.
    #[must_use]
    pub fn new(pleasure: f32, arousal: f32, dominance: f32) -> Self {
        Self {
            pleasure: bounded(pleasure, -1.0, 1.0),
            arousal: bounded(arousal, -1.0, 1.0),
            dominance: bounded(dominance, -1.0, 1.0),
            energy: 1.0,
        }
    }

    /// Unhappy (-1.0) to happy (+1.0).
    #[must_use]
    pub fn pleasure(&self) -> f32 {
        self.pleasure
    }

    /// Calm (-1.0) to excited (+1.0).
    #[must_use]
    pub fn arousal(&self) -> f32 {
        self.arousal
    }

    /// Submissive (-1.0) to dominant (+1.0).
    #[must_use]
    pub fn dominance(&self) -> f32 {
        self.dominance
    }

    /// Energy reserve in [0, 1].
    #[must_use]
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Shift the state by a stimulus. Overshoot saturates at the bounds.
    pub fn apply_stimulus(&mut self, d_pleasure: f32, d_arousal: f32, d_dominance: f32) {
        self.pleasure = bounded(self.pleasure + d_pleasure, -1.0, 1.0);
        self.arousal = bounded(self.arousal + d_arousal, -1.0, 1.0);
        self.dominance = bounded(self.dominance + d_dominance, -1.0, 1.0);
    }

    /// Pull the state toward neutral.
    ///
    /// Pleasure and arousal are scaled by `1 - rate`, dominance by
    /// `1 - rate / 2`. The rate is used as given; callers wanting validation
    /// go through the persona's `tick_with_rate`.
    pub fn decay(&mut self, rate: f32) {
        self.pleasure = bounded(self.pleasure * (1.0 - rate), -1.0, 1.0);
        self.arousal = bounded(self.arousal * (1.0 - rate), -1.0, 1.0);
        self.dominance = bounded(self.dominance * (1.0 - rate * 0.5), -1.0, 1.0);
    }

    /// Map the PAD triple to a discrete label. First matching rule wins.
    #[must_use]
    pub fn classify(&self) -> MoodLabel {
        let (p, a, d) = (self.pleasure, self.arousal, self.dominance);

        if a < 0.0 && p > 0.0 {
            return MoodLabel::Relaxed;
        }
        if a < 0.0 && p < 0.0 {
            return MoodLabel::BoredDepressed;
        }
        if a > 0.0 {
            if p > 0.5 && d > 0.0 {
                return MoodLabel::Joyful;
            }
            if p > 0.2 && d > 0.0 {
                return MoodLabel::Excited;
            }
            // Negative and in control: anger. Negative and cornered: fear.
            if p < -0.5 && d > 0.0 {
                return MoodLabel::Angry;
            }
            if p < -0.5 && d < 0.0 {
                return MoodLabel::Fearful;
            }
            if p < 0.0 {
                return MoodLabel::Anxious;
            }
        }
        MoodLabel::Neutral
    }

    /// Overall emotional intensity (magnitude of the PAD vector).
    #[must_use]
    pub fn intensity(&self) -> f32 {
        (self.pleasure * self.pleasure
            + self.arousal * self.arousal
            + self.dominance * self.dominance)
            .sqrt()
    }

    /// One-decimal readout, e.g. `P=0.3, A=-0.1, D=0.0`.
    #[must_use]
    pub fn readout(&self) -> String {
        format!(
            "P={:.1}, A={:.1}, D={:.1}",
            self.pleasure, self.arousal, self.dominance
        )
    }
}

impl Default for MoodState {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Discrete mood derived from a [`MoodState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoodLabel {
    /// Low arousal, positive pleasure.
    Relaxed,
    /// Low arousal, negative pleasure.
    BoredDepressed,
    /// Aroused, very pleased, in control.
    Joyful,
    /// Aroused, pleased, in control.
    Excited,
    /// Aroused, very displeased, in control.
    Angry,
    /// Aroused, very displeased, not in control.
    Fearful,
    /// Aroused, displeased.
    Anxious,
    /// Anything else.
    Neutral,
}

impl MoodLabel {
    /// Label text as injected into prompts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relaxed => "Relaxed",
            Self::BoredDepressed => "Bored/Depressed",
            Self::Joyful => "Joyful",
            Self::Excited => "Excited",
            Self::Angry => "Angry",
            Self::Fearful => "Fearful",
            Self::Anxious => "Anxious",
            Self::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
