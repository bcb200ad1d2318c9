//! Remote assist error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body code the backend sends with `401` for a rejected key.
pub const CODE_INVALID_KEY: &str = "INVALID_KEY";
/// Body code the backend sends with `429` when the quota is exhausted.
pub const CODE_RATE_LIMIT: &str = "RATE_LIMIT";
/// Body code the backend sends with `400` for oversized input.
pub const CODE_TEXT_TOO_LONG: &str = "TEXT_TOO_LONG";

/// Errors from the remote assist endpoint.
///
/// The first three variants are terminal for the assist pass and need user
/// action. [`AssistError::Unavailable`] is not: the run continues with local
/// detections only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistError {
    /// The API key was rejected.
    #[error("assist API key rejected{}", detail(.message.as_ref()))]
    InvalidKey {
        /// Server-provided message, if any.
        message: Option<String>,
    },

    /// The request quota is exhausted.
    #[error("assist rate limit exceeded{}", detail(.message.as_ref()))]
    RateLimited {
        /// Server-provided message, if any.
        message: Option<String>,
    },

    /// The input exceeds the assist length cap.
    #[error("input too large for assist{}", detail(.message.as_ref()))]
    InputTooLarge {
        /// Server-provided or client-side message.
        message: Option<String>,
    },

    /// The endpoint could not be reached or answered unexpectedly.
    #[error("assist unavailable: {reason}")]
    Unavailable {
        /// Description of what went wrong.
        reason: String,
    },
}

fn detail(message: Option<&String>) -> String {
    message.map(|m| format!(": {m}")).unwrap_or_default()
}

/// Discriminant of [`AssistError`], for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistErrorKind {
    /// See [`AssistError::InvalidKey`].
    InvalidKey,
    /// See [`AssistError::RateLimited`].
    RateLimited,
    /// See [`AssistError::InputTooLarge`].
    InputTooLarge,
    /// See [`AssistError::Unavailable`].
    Unavailable,
}

impl AssistError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// The error's kind.
    #[must_use]
    pub fn kind(&self) -> AssistErrorKind {
        match self {
            Self::InvalidKey { .. } => AssistErrorKind::InvalidKey,
            Self::RateLimited { .. } => AssistErrorKind::RateLimited,
            Self::InputTooLarge { .. } => AssistErrorKind::InputTooLarge,
            Self::Unavailable { .. } => AssistErrorKind::Unavailable,
        }
    }

    /// Check if the error needs user action rather than a silent fallback.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }

    /// A single human-readable message suitable for end users.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidKey { .. } => "Your API key was not accepted. Check it for typos or \
                 create a new key, or leave it empty to use the free tier."
                .to_string(),
            Self::RateLimited { .. } => "You have used all free AI assist requests for now. \
                 Add an API key or upgrade your plan to keep using AI assist."
                .to_string(),
            Self::InputTooLarge { .. } => {
                "This text is too long for AI assist. Shorten it and try again.".to_string()
            }
            Self::Unavailable { .. } => {
                "AI assist is unavailable right now; showing local detections only.".to_string()
            }
        }
    }

    /// Classify a non-success response from its status and body.
    ///
    /// The backend reuses status codes, so both the status and the body `code`
    /// must match for a terminal classification.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed.message.clone().or_else(|| parsed.error.clone());

        match (status, parsed.code.as_deref()) {
            (401, Some(CODE_INVALID_KEY)) => Self::InvalidKey { message },
            (429, Some(CODE_RATE_LIMIT)) => Self::RateLimited { message },
            (400, Some(CODE_TEXT_TOO_LONG)) => Self::InputTooLarge { message },
            _ => Self::unavailable(message.map_or_else(
                || format!("HTTP {status}"),
                |m| format!("HTTP {status}: {m}"),
            )),
        }
    }
}

/// Error body returned by the assist endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    /// Short error label.
    pub error: Option<String>,
    /// Machine-readable code.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
}
