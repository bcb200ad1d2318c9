//! Core detection types.
//!
//! A [`Detection`] is a located, typed span of sensitive text produced by either
//! the local pattern detector or the remote assist endpoint. Detections are
//! created fresh for every run and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Which detector produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The in-process pattern detector.
    Local,
    /// The remote assist endpoint.
    Remote,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Half-open interval `[start, end)` in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of the span, zero for empty or reversed spans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if the span covers nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check the span is non-empty and ends within a text of `text_len` units.
    #[must_use]
    pub fn is_valid_within(&self, text_len: usize) -> bool {
        self.start < self.end && self.end <= text_len
    }

    /// Check if two spans share at least one offset.
    #[must_use]
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Bracketed tag used when a detector does not supply its own replacement.
#[must_use]
pub fn placeholder_for(kind: &str) -> String {
    format!("[{kind}]")
}

/// Normalize a detector-supplied label into a kind tag.
///
/// Labels are upper-cased and inner whitespace or dashes become underscores,
/// so `"credit card"` and `"CREDIT_CARD"` compare equal.
#[must_use]
pub fn normalize_kind(label: &str) -> String {
    let kind: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '-' {
                '_'
            } else {
                c.to_ascii_uppercase()
            }
        })
        .collect();
    if kind.is_empty() {
        "PII".to_string()
    } else {
        kind
    }
}

/// A located span of sensitive text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Categorical label, e.g. `EMAIL` or a custom assist label.
    pub kind: String,

    /// Position in the original text.
    pub span: Span,

    /// The substring covered by `span`, kept for display only.
    pub original_value: String,

    /// Literal text substituted for the span.
    pub replacement: String,

    /// Which detector produced this detection.
    pub origin: Origin,

    /// Detector confidence, display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Detector severity, display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl Detection {
    /// Create a detection with the default bracketed replacement.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        span: Span,
        original_value: impl Into<String>,
        origin: Origin,
    ) -> Self {
        let kind = kind.into();
        let replacement = placeholder_for(&kind);
        Self {
            kind,
            span,
            original_value: original_value.into(),
            replacement,
            origin,
            confidence: None,
            severity: None,
        }
    }

    /// Override the replacement text.
    #[must_use]
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = replacement.into();
        self
    }

    /// Exact-boundary dedup key.
    #[must_use]
    pub fn key(&self) -> (usize, usize) {
        (self.span.start, self.span.end)
    }
}
