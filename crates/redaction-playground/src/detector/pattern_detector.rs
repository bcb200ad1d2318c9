//! Regex detector built from a pattern pack.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use super::patterns::CompiledPattern;
use super::{DetectOutput, DetectionError, Detector, DetectorOptions, EntityLike};
use crate::text::TextIndex;

/// A match before overlap resolution, in byte offsets.
struct Candidate<'p> {
    start: usize,
    end: usize,
    pattern: &'p CompiledPattern,
}

/// Pattern-based detector for one pack and one option set.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    name: String,
    patterns: Arc<[CompiledPattern]>,
    options: DetectorOptions,
}

impl PatternDetector {
    /// Create a detector over compiled patterns.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        patterns: Arc<[CompiledPattern]>,
        options: DetectorOptions,
    ) -> Self {
        Self {
            name: name.into(),
            patterns,
            options,
        }
    }

    /// The options this detector was configured with.
    #[must_use]
    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }

    /// Patterns enabled by the current options.
    pub fn enabled_patterns(&self) -> impl Iterator<Item = &CompiledPattern> {
        self.patterns
            .iter()
            .filter(|p| self.options.includes(p.spec().category))
    }

    /// Collect matches and keep a non-overlapping subset.
    ///
    /// Earlier matches win; among matches starting at the same offset the
    /// longest wins.
    fn scan(&self, text: &str) -> Vec<Candidate<'_>> {
        let mut candidates: Vec<Candidate<'_>> = self
            .enabled_patterns()
            .flat_map(|pattern| {
                pattern.find_all(text).map(move |m| Candidate {
                    start: m.start(),
                    end: m.end(),
                    pattern,
                })
            })
            .filter(|c| c.start < c.end)
            .collect();

        candidates.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut kept: Vec<Candidate<'_>> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if kept.last().is_some_and(|last| candidate.start < last.end) {
                trace!(pattern = %candidate.pattern.spec().name, "Dropping overlapped match");
                continue;
            }
            kept.push(candidate);
        }
        kept
    }
}

#[async_trait]
impl Detector for PatternDetector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, text: &str) -> Result<DetectOutput, DetectionError> {
        let index = TextIndex::new(text);
        let mut detections = Vec::new();

        for candidate in self.scan(text) {
            // regex matches always fall on char boundaries
            let (Some(start), Some(end)) = (
                index.byte_to_utf16(candidate.start),
                index.byte_to_utf16(candidate.end),
            ) else {
                return Err(DetectionError::Failed {
                    detector: self.name.clone(),
                    message: format!(
                        "match {}..{} is not on a char boundary",
                        candidate.start, candidate.end
                    ),
                });
            };

            let spec = candidate.pattern.spec();
            let value = &text[candidate.start..candidate.end];
            let mode = &self.options.redaction_mode;
            let replacement = spec
                .replacement
                .clone()
                .unwrap_or_else(|| mode.replacement(&spec.kind, value));

            detections.push(
                EntityLike::with_pair(spec.kind.clone(), start, end)
                    .value(value)
                    .replacement(replacement),
            );
        }

        Ok(DetectOutput { detections })
    }
}
