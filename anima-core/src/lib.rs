//! # ANIMA Core Library
//!
//! Persona state for in-character conversational agents.
//!
//! A persona combines three pieces of state, each grounded in a
//! psychological model:
//!
//! - **Personality** — "Who I am" (Big Five / OCEAN, Costa & McCrae 1992)
//! - **Mood** — "How I feel right now" (Russell & Mehrabian PAD model, 1977)
//! - **Style** — "How I sound" (example utterances anchoring tone)
//!
//! plus [`extract`], which recovers JSON from free-form model output, and
//! [`persistence`], an opt-in SQLite snapshot store.
//!
//! Nothing in this crate talks to a language model; see `anima-llm` and
//! `anima-engine`.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod extract;
pub mod mood;
pub mod persistence;
pub mod personality;
pub mod style;
pub mod types;

pub use config::AnimaConfig;
pub use error::AnimaError;
pub use mood::{MoodLabel, MoodState};
pub use personality::{Provenance, Trait, TraitProfile};
pub use style::{StyleCorpus, StyleExample, STYLE_PLACEHOLDER};
pub use types::*;
