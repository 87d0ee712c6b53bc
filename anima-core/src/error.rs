//! Error types for the ANIMA core library.

use thiserror::Error;

/// Top-level error type for all ANIMA core operations.
#[derive(Error, Debug)]
pub enum AnimaError {
    /// A stored snapshot failed its integrity check.
    #[error("Corrupted snapshot: {0}")]
    Corrupted(String),

    /// No usable structure could be recovered from model output.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, AnimaError>;
