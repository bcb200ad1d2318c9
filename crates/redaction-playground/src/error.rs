//! Error types for the redaction playground.
//!
//! Component errors ([`LoadError`], [`DetectionError`]) are kept as their own
//! types and wrapped here. Remote assist errors are not: they never fail a run
//! and surface through the run result instead.

use thiserror::Error;

use crate::detector::DetectionError;
use crate::loader::LoadError;

/// The main error type for playground operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Pipeline Errors ===
    /// The pattern pack could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Local detection failed.
    #[error(transparent)]
    Detection(#[from] DetectionError),

    /// The input exceeds the configured length cap.
    #[error("input is {len} characters, the limit is {max}")]
    InputTooLarge {
        /// Input length in UTF-16 units.
        len: usize,
        /// Configured cap.
        max: usize,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system or stdin operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client setup failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for playground operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// A single human-readable message suitable for end users.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Load(_) => format!("Could not load detection patterns. {self}"),
            Self::Detection(_) => format!("Local detection failed. {self}"),
            Self::InputTooLarge { max, .. } => format!(
                "This text is too long. Keep it under {max} characters and try again."
            ),
            _ => self.to_string(),
        }
    }
}
