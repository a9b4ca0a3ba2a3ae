//! Error types for the calckit_core library.

use crate::validation::ValidationErrors;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for calckit_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed calculator declaration or configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Assignment to a name that is not a declared input
    #[error("Unknown input: {0}")]
    UnknownInput(String),

    /// Inputs failed validation
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Registry lookup for a slug that must exist
    #[error("Calculator not found: {0}")]
    NotFound(String),

    /// Calculator type has no computation step
    #[error("{0} must implement calculate")]
    NotImplemented(String),

    /// Computation step could not read an input
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors raised while declaring or registering calculator types
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// The per-field errors carried by a validation failure
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Error::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
