//! Local detection.
//!
//! This module provides the local, network-free side of the pipeline:
//!
//! - **[`Detector`]**: the pluggable detection seam. Implementations return
//!   loosely-shaped [`EntityLike`] records.
//!
//! - **[`PatternDetector`]**: the regex implementation built from a pattern pack.
//!
//! - **[`LocalDetector`]**: the adapter that normalizes any detector's output
//!   into canonical [`Detection`]s tagged `origin = local`.
//!
//! # Example
//!
//! ```no_run
//! use redaction_playground::detector::{DetectorOptions, LocalDetector, Preset};
//! use redaction_playground::loader::{DetectorLoader, DetectorSource};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = DetectorLoader::new(DetectorSource::Builtin).load().await?;
//! let options = DetectorOptions::from_preset(Preset::Contact);
//! let local = LocalDetector::new(factory.configure(options));
//! let detections = local.detect("Email me at a@b.com").await?;
//! assert_eq!(detections[0].kind, "EMAIL");
//! # Ok(())
//! # }
//! ```

mod entity;
mod pattern_detector;
mod patterns;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub use entity::{EntityError, EntityLike};
pub use pattern_detector::PatternDetector;
pub use patterns::{
    builtin_pack, Category, CompiledPattern, PatternPack, PatternSpec, BUILTIN_PACK_NAME,
};

use crate::detection::{Detection, Origin};
use crate::text::{utf16_len, TextIndex};

/// Errors raised by local detection.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The underlying detector failed.
    #[error("detector '{detector}' failed: {message}")]
    Failed {
        /// Name of the detector.
        detector: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The detector emitted an entity the adapter cannot interpret.
    #[error("detector '{detector}' returned an unusable entity at index {index}: {source}")]
    Shape {
        /// Name of the detector.
        detector: String,
        /// Position of the entity in the detector output.
        index: usize,
        /// What was wrong with it.
        #[source]
        source: EntityError,
    },
}

/// Native output of a [`Detector`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectOutput {
    /// Entities found, in detector-specific shape.
    pub detections: Vec<EntityLike>,
}

/// A pluggable detection implementation.
///
/// Detectors run purely in-process over the supplied text and never touch the
/// network. Offsets are reported in UTF-16 code units.
#[async_trait]
pub trait Detector: Send + Sync + std::fmt::Debug {
    /// The name of this detector (for logging/debugging).
    fn name(&self) -> &str;

    /// Detect sensitive spans in `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if detection fails.
    async fn detect(&self, text: &str) -> Result<DetectOutput, DetectionError>;
}

/// How matched text is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    /// Replace with a bracketed kind tag such as `[EMAIL]`.
    #[default]
    Placeholder,

    /// Replace each UTF-16 unit of the original with `*`.
    Mask,
}

impl RedactionMode {
    /// Replacement text for a match of `kind` covering `original`.
    #[must_use]
    pub fn replacement(&self, kind: &str, original: &str) -> String {
        match self {
            Self::Placeholder => crate::detection::placeholder_for(kind),
            Self::Mask => "*".repeat(utf16_len(original)),
        }
    }
}

impl std::fmt::Display for RedactionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placeholder => write!(f, "placeholder"),
            Self::Mask => write!(f, "mask"),
        }
    }
}

/// Named option sets offered by the playground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Every category.
    #[default]
    All,
    /// Emails, phones and addresses.
    Contact,
    /// SSNs and card numbers.
    Financial,
    /// Names, emails and SSNs.
    Identity,
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Contact => write!(f, "contact"),
            Self::Financial => write!(f, "financial"),
            Self::Identity => write!(f, "identity"),
        }
    }
}

/// Options a detector is instantiated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct DetectorOptions {
    /// Detect person names.
    pub include_names: bool,
    /// Detect email addresses.
    pub include_emails: bool,
    /// Detect phone numbers.
    pub include_phones: bool,
    /// Detect postal addresses.
    pub include_addresses: bool,
    /// Detect Social Security Numbers.
    pub include_ssn: bool,
    /// Detect payment card numbers.
    pub include_credit_cards: bool,
    /// How matches are replaced.
    pub redaction_mode: RedactionMode,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self::from_preset(Preset::All)
    }
}

impl DetectorOptions {
    /// Options for a named preset, in placeholder mode.
    #[must_use]
    pub fn from_preset(preset: Preset) -> Self {
        let (names, emails, phones, addresses, ssn, cards) = match preset {
            Preset::All => (true, true, true, true, true, true),
            Preset::Contact => (false, true, true, true, false, false),
            Preset::Financial => (false, false, false, false, true, true),
            Preset::Identity => (true, true, false, false, true, false),
        };
        Self {
            include_names: names,
            include_emails: emails,
            include_phones: phones,
            include_addresses: addresses,
            include_ssn: ssn,
            include_credit_cards: cards,
            redaction_mode: RedactionMode::Placeholder,
        }
    }

    /// Replace the redaction mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RedactionMode) -> Self {
        self.redaction_mode = mode;
        self
    }

    /// Check if a category is enabled.
    #[must_use]
    pub fn includes(&self, category: Category) -> bool {
        match category {
            Category::Names => self.include_names,
            Category::Emails => self.include_emails,
            Category::Phones => self.include_phones,
            Category::Addresses => self.include_addresses,
            Category::Ssn => self.include_ssn,
            Category::CreditCards => self.include_credit_cards,
            Category::Secrets => true,
        }
    }
}

/// Uniform `detect(text) -> Vec<Detection>` over any [`Detector`].
///
/// Cheap to clone; clones share the underlying detector instance.
#[derive(Debug, Clone)]
pub struct LocalDetector {
    inner: Arc<dyn Detector>,
}

impl LocalDetector {
    /// Wrap a detector instance.
    #[must_use]
    pub fn new(inner: Arc<dyn Detector>) -> Self {
        Self { inner }
    }

    /// Name of the wrapped detector.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Run the wrapped detector and normalize its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the detector fails or emits an entity without a
    /// usable span.
    pub async fn detect(&self, text: &str) -> Result<Vec<Detection>, DetectionError> {
        let output = self.inner.detect(text).await?;
        let index = TextIndex::new(text);

        let mut detections = Vec::with_capacity(output.detections.len());
        for (i, entity) in output.detections.iter().enumerate() {
            let detection = entity
                .to_detection(Origin::Local, &index)
                .map_err(|source| DetectionError::Shape {
                    detector: self.name().to_string(),
                    index: i,
                    source,
                })?;
            trace!(kind = %detection.kind, span = %detection.span, "Local detection");
            detections.push(detection);
        }

        debug!(detector = %self.name(), count = detections.len(), "Local detection complete");
        Ok(detections)
    }
}
