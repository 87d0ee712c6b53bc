//! # anima-engine — Persona Orchestration for ANIMA
//!
//! Glues the pure state in `anima-core` to the model collaborator in
//! `anima-llm`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 host / transport              │
//! └───────────────────────┬──────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────┐
//! │  anima-engine                                 │
//! │  ┌────────────────┐   ┌────────────────────┐  │
//! │  │ PersonaRegistry│──▶│ Persona            │  │
//! │  └────────────────┘   │  initialize        │  │
//! │                       │  set_style         │  │
//! │  ┌────────────────┐   │  chat / tick       │  │
//! │  │ PromptAssembler│◀──┤                    │  │
//! │  └────────────────┘   └─────────┬──────────┘  │
//! └─────────────────────────────────┼─────────────┘
//!             ┌─────────────────────┴───────┐
//!             ▼                             ▼
//!      anima-core (state)          anima-llm (LanguageModel)
//! ```
//!
//! ## Modules
//!
//! - `persona` — the per-character state machine
//! - `elicitation` — trait and style derivation prompts and parsing
//! - `assembler` — system instruction, reinforcement block, turn requests
//! - `registry` — concurrent map of personas, one async mutex each
//! - `runtime` — shared model/config/assembler bundle, client construction
//! - `logging` — `tracing-subscriber` bootstrap

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assembler;
pub mod elicitation;
pub mod error;
pub mod logging;
pub mod persona;
pub mod registry;
pub mod runtime;

pub use assembler::{ChatTurn, PromptAssembler};
pub use elicitation::{DerivationOutcome, ElicitationMode, GroundingContext};
pub use error::EngineError;
pub use persona::Persona;
pub use registry::{PersonaHandle, PersonaRegistry};
pub use runtime::{client_from_config, PersonaRuntime};
