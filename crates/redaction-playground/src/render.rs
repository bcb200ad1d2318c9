//! Replacing detected spans in the input text.

use tracing::warn;

use crate::detection::Detection;
use crate::text::TextIndex;

/// Produce the redacted text.
///
/// Spans are applied from the highest start down, so earlier offsets stay
/// valid while later ones are rewritten. The input is never modified. A span
/// that overlaps one already applied, or that does not land on character
/// boundaries, is skipped.
#[must_use]
pub fn render_redaction(text: &str, detections: &[Detection]) -> String {
    let index = TextIndex::new(text);

    let mut ordered: Vec<&Detection> = detections.iter().collect();
    ordered.sort_by(|a, b| {
        b.span
            .start
            .cmp(&a.span.start)
            .then_with(|| b.span.end.cmp(&a.span.end))
    });

    let mut output = text.to_string();
    // lowest start applied so far, in UTF-16 units
    let mut floor = usize::MAX;

    for detection in ordered {
        let span = detection.span;
        if span.end > floor {
            warn!(kind = %detection.kind, span = %span, "Skipping overlapping span during render");
            continue;
        }
        let Some(range) = index.byte_range(span.start, span.end) else {
            warn!(kind = %detection.kind, span = %span, "Skipping span outside the text");
            continue;
        };
        if range.is_empty() {
            continue;
        }
        output.replace_range(range, &detection.replacement);
        floor = span.start;
    }

    output
}
