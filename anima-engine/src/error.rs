//! Error types for persona orchestration.

use anima_core::{AnimaError, PersonaPhase};
use anima_llm::LlmError;
use thiserror::Error;

/// Errors surfaced by [`crate::Persona`] and its helpers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller input was malformed (blank description, bad decay rate...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation is not allowed in the persona's current phase.
    #[error("Cannot {operation} while persona is {phase}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// Phase the persona was in.
        phase: PersonaPhase,
    },

    /// The model answered with no text.
    #[error("Language model returned no response")]
    NoResponse,

    /// The model call failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Core state or persistence error.
    #[error(transparent)]
    Core(#[from] AnimaError),

    /// Logging could not be initialized.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;
