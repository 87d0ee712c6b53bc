//! Persona — one character's state plus the operations that evolve it.
//!
//! ```text
//! Uninitialized ──initialize──▶ ProfileReady ──set_style──▶ StyleReady
//!                                    │  ▲                      │
//!                                    └──┴──── chat / tick ─────┘
//! ```
//!
//! Derivations (`initialize`, `set_style`) fail soft: a failed or timed-out
//! model call keeps the prior state and is reported as a
//! [`DerivationOutcome`], never as an error. `chat` surfaces failures as
//! errors because the caller needs to show something to the user.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use anima_core::{
    MoodLabel, MoodState, PersonaId, PersonaIdentity, PersonaPhase, PersonaSnapshot, StyleCorpus,
    TraitProfile,
};
use anima_llm::{LlmError, LlmRequest, LlmResponse};

use crate::assembler::{ChatTurn, PersonaView};
use crate::elicitation::{self, DerivationOutcome, ElicitationMode};
use crate::error::{EngineError, Result};
use crate::runtime::PersonaRuntime;

/// A simulated character.
#[derive(Debug)]
pub struct Persona {
    id: PersonaId,
    identity: PersonaIdentity,
    phase: PersonaPhase,
    profile: TraitProfile,
    mood: MoodState,
    style: StyleCorpus,
    runtime: PersonaRuntime,
}

impl Persona {
    /// A fresh persona: default profile, neutral mood, placeholder style.
    #[must_use]
    pub fn new(identity: PersonaIdentity, runtime: PersonaRuntime) -> Self {
        Self {
            id: PersonaId::new(),
            identity,
            phase: PersonaPhase::Uninitialized,
            profile: TraitProfile::default(),
            mood: MoodState::default(),
            style: StyleCorpus::default(),
            runtime,
        }
    }

    /// Rebuild a persona from a snapshot.
    #[must_use]
    pub fn restore(snapshot: PersonaSnapshot, runtime: PersonaRuntime) -> Self {
        debug!(persona = %snapshot.identity.name, phase = %snapshot.phase, "Restoring persona");
        Self {
            id: snapshot.id,
            identity: snapshot.identity,
            phase: snapshot.phase,
            profile: snapshot.profile,
            mood: snapshot.mood,
            style: snapshot.style,
            runtime,
        }
    }

    /// Copy of the persona's state.
    #[must_use]
    pub fn snapshot(&self) -> PersonaSnapshot {
        PersonaSnapshot {
            id: self.id,
            identity: self.identity.clone(),
            phase: self.phase,
            profile: self.profile.clone(),
            mood: self.mood,
            style: self.style.clone(),
            saved_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Persona identifier.
    #[must_use]
    pub fn id(&self) -> PersonaId {
        self.id
    }

    /// Name, gender, originality.
    #[must_use]
    pub fn identity(&self) -> &PersonaIdentity {
        &self.identity
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> PersonaPhase {
        self.phase
    }

    /// Big Five profile.
    #[must_use]
    pub fn profile(&self) -> &TraitProfile {
        &self.profile
    }

    /// Emotional state.
    #[must_use]
    pub fn mood(&self) -> &MoodState {
        &self.mood
    }

    /// Discrete label for the current mood.
    #[must_use]
    pub fn mood_label(&self) -> MoodLabel {
        self.mood.classify()
    }

    /// Style exemplars.
    #[must_use]
    pub fn style(&self) -> &StyleCorpus {
        &self.style
    }

    fn view(&self) -> PersonaView<'_> {
        PersonaView {
            identity: &self.identity,
            profile: &self.profile,
            mood: &self.mood,
            style: &self.style,
        }
    }

    // -----------------------------------------------------------------------
    // Derivation
    // -----------------------------------------------------------------------

    /// Derive the trait profile from a free-text description.
    ///
    /// Existing characters are elicited with web search. Whatever the model
    /// does, the persona ends up at least `ProfileReady`; on failure the
    /// previous profile is kept.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] for a blank description.
    pub async fn initialize(&mut self, description: &str) -> Result<DerivationOutcome> {
        if description.trim().is_empty() {
            return Err(EngineError::InvalidArgument("description must not be blank".into()));
        }

        let mode = ElicitationMode::for_persona(&self.identity, &self.profile.provenance);
        let request = elicitation::trait_request(
            self.runtime.assembler.engine(),
            &self.identity,
            description,
            &mode,
            &self.runtime.config.llm,
        )?;

        let outcome = match self.call(&request).await {
            Ok(Some(response)) => {
                match elicitation::interpret_traits(&response.text, &mut self.profile) {
                    Ok(()) => DerivationOutcome::Derived,
                    Err(e) => DerivationOutcome::Retained { reason: e.to_string() },
                }
            }
            Ok(None) => DerivationOutcome::Retained {
                reason: "empty response".into(),
            },
            Err(e) => DerivationOutcome::Retained { reason: e.to_string() },
        };

        match &outcome {
            DerivationOutcome::Derived => info!(
                persona = %self.identity.name,
                grounded = mode.web_search(),
                summary = %self.profile.describe(),
                "Trait profile derived"
            ),
            DerivationOutcome::Retained { reason } | DerivationOutcome::Fallback { reason } => warn!(
                persona = %self.identity.name,
                %reason,
                "Trait derivation failed; keeping prior profile"
            ),
        }

        self.phase = self.phase.max(PersonaPhase::ProfileReady);
        Ok(outcome)
    }

    /// Set the style corpus.
    ///
    /// Non-empty `examples` are used verbatim with no model call. Otherwise
    /// exemplars are elicited from the profile; an unusable answer yields
    /// the placeholder corpus, and a failed call keeps the current corpus.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidState`] before the profile is ready.
    pub async fn set_style(&mut self, examples: Vec<String>) -> Result<DerivationOutcome> {
        self.require_profile("set style")?;

        if !examples.is_empty() {
            self.style = StyleCorpus::from_examples(examples);
            self.phase = PersonaPhase::StyleReady;
            info!(persona = %self.identity.name, entries = self.style.len(), "Style set from examples");
            return Ok(DerivationOutcome::Derived);
        }

        let mode = ElicitationMode::for_persona(&self.identity, &self.profile.provenance);
        let request = elicitation::style_request(
            self.runtime.assembler.engine(),
            &self.identity,
            &self.profile,
            &mode,
            &self.runtime.config.llm,
        )?;

        let outcome = match self.call(&request).await {
            Ok(Some(response)) => {
                let (corpus, fallback) = elicitation::interpret_style(&response.text);
                self.style = corpus;
                match fallback {
                    None => DerivationOutcome::Derived,
                    Some(reason) => DerivationOutcome::Fallback { reason },
                }
            }
            Ok(None) => {
                self.style = StyleCorpus::placeholder();
                DerivationOutcome::Fallback {
                    reason: "empty response".into(),
                }
            }
            Err(e) => DerivationOutcome::Retained { reason: e.to_string() },
        };

        match &outcome {
            DerivationOutcome::Derived => info!(
                persona = %self.identity.name,
                entries = self.style.len(),
                "Style corpus derived"
            ),
            DerivationOutcome::Fallback { reason } => warn!(
                persona = %self.identity.name,
                %reason,
                "Style answer unusable; using placeholder"
            ),
            DerivationOutcome::Retained { reason } => warn!(
                persona = %self.identity.name,
                %reason,
                "Style derivation failed; keeping prior corpus"
            ),
        }

        self.phase = PersonaPhase::StyleReady;
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Conversation
    // -----------------------------------------------------------------------

    /// Produce the persona's reply to `input`.
    ///
    /// `history` holds earlier turns in any role vocabulary; it must not
    /// include `input` itself. Phase and mood are unchanged.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidState`] before the profile is ready
    /// - [`EngineError::InvalidArgument`] for blank input
    /// - [`EngineError::Llm`] if the model call fails or times out
    /// - [`EngineError::NoResponse`] if the model answers with nothing
    pub async fn chat(&mut self, input: &str, history: &[ChatTurn]) -> Result<String> {
        self.require_profile("chat")?;
        if input.trim().is_empty() {
            return Err(EngineError::InvalidArgument("input must not be blank".into()));
        }

        let request = self.runtime.assembler.assemble_turn(
            self.view(),
            input,
            history,
            &self.runtime.config.llm,
        )?;

        match self.call(&request).await? {
            Some(response) => Ok(response.text),
            None => Err(EngineError::NoResponse),
        }
    }

    // -----------------------------------------------------------------------
    // Mood dynamics
    // -----------------------------------------------------------------------

    /// Shift the mood. Allowed in every phase.
    pub fn apply_stimulus(&mut self, d_pleasure: f32, d_arousal: f32, d_dominance: f32) {
        self.mood.apply_stimulus(d_pleasure, d_arousal, d_dominance);
        debug!(
            persona = %self.identity.name,
            mood = %self.mood.classify(),
            readout = %self.mood.readout(),
            "Stimulus applied"
        );
    }

    /// Decay the mood by the configured `mood.decay_rate`.
    pub fn tick(&mut self) {
        self.mood.decay(self.runtime.config.mood.decay_rate);
    }

    /// Decay the mood by an explicit rate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] unless `rate` is a finite
    /// value in [0, 1].
    pub fn tick_with_rate(&mut self, rate: f32) -> Result<()> {
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            return Err(EngineError::InvalidArgument(format!(
                "decay rate must be within [0, 1], got {rate}"
            )));
        }
        self.mood.decay(rate);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require_profile(&self, operation: &'static str) -> Result<()> {
        if self.phase < PersonaPhase::ProfileReady {
            return Err(EngineError::InvalidState {
                operation,
                phase: self.phase,
            });
        }
        Ok(())
    }

    /// One model call under the configured hard timeout. Blank text counts
    /// as no answer whichever model produced it.
    async fn call(&self, request: &LlmRequest) -> std::result::Result<Option<LlmResponse>, LlmError> {
        let timeout_ms = self.runtime.config.llm.request_timeout_ms;
        let start = Instant::now();
        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.runtime.model.generate(request),
        )
        .await
        .unwrap_or(Err(LlmError::Timeout(timeout_ms)))
        .map(|reply| reply.filter(|response| !response.text.trim().is_empty()));

        debug!(
            persona = %self.identity.name,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            ok = result.is_ok(),
            "Model call finished"
        );
        result
    }
}
