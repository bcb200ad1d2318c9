//! Success body shapes of the assist endpoint.

use serde_json::Value;
use tracing::warn;

use crate::detection::{Detection, Origin};
use crate::detector::EntityLike;
use crate::text::TextIndex;

/// The entity list of a success body, tagged by the shape it arrived in.
///
/// Shapes are matched in a fixed order: `{"entities": [...]}`, then
/// `{"detections": [...]}`, then a bare array. The first non-null array wins.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPayload {
    /// `{"entities": [...]}`
    Entities(Vec<Value>),
    /// `{"detections": [...]}`
    Detections(Vec<Value>),
    /// `[...]`
    Bare(Vec<Value>),
    /// No known shape matched; treated as zero entities.
    Unrecognized,
}

impl EntityPayload {
    /// Match a parsed body against the known shapes.
    #[must_use]
    pub fn from_body(body: &Value) -> Self {
        match body {
            Value::Array(items) => Self::Bare(items.clone()),
            Value::Object(map) => match (map.get("entities"), map.get("detections")) {
                (Some(Value::Array(items)), _) => Self::Entities(items.clone()),
                (_, Some(Value::Array(items))) => Self::Detections(items.clone()),
                _ => Self::Unrecognized,
            },
            _ => Self::Unrecognized,
        }
    }

    /// Name of the matched shape, for logging.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Entities(_) => "entities",
            Self::Detections(_) => "detections",
            Self::Bare(_) => "bare",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// The raw entity records, empty when unrecognized.
    #[must_use]
    pub fn items(&self) -> &[Value] {
        match self {
            Self::Entities(items) | Self::Detections(items) | Self::Bare(items) => items,
            Self::Unrecognized => &[],
        }
    }

    /// Normalize the records into remote detections.
    ///
    /// Records that are not entity-shaped or lack a usable span are skipped and
    /// counted in the second element of the result.
    #[must_use]
    pub fn to_detections(&self, index: &TextIndex<'_>) -> (Vec<Detection>, usize) {
        let mut detections = Vec::with_capacity(self.items().len());
        let mut rejected = 0;

        for (i, item) in self.items().iter().enumerate() {
            let normalized = EntityLike::from_value(item)
                .and_then(|entity| entity.to_detection(Origin::Remote, index));
            match normalized {
                Ok(detection) => detections.push(detection),
                Err(error) => {
                    warn!(index = i, error = %error, "Skipping malformed assist entity");
                    rejected += 1;
                }
            }
        }

        (detections, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Span;
    use serde_json::json;

    #[test]
    fn test_entities_shape() {
        let body = json!({"entities": [{"type": "NAME", "start": 0, "end": 4}]});
        let payload = EntityPayload::from_body(&body);
        assert_eq!(payload.shape(), "entities");
        assert_eq!(payload.items().len(), 1);
    }

    #[test]
    fn test_detections_shape() {
        let payload = EntityPayload::from_body(&json!({"detections": []}));
        assert_eq!(payload, EntityPayload::Detections(vec![]));
    }

    #[test]
    fn test_bare_array_shape() {
        let payload = EntityPayload::from_body(&json!([{"type": "NAME", "start": 0, "end": 4}]));
        assert_eq!(payload.shape(), "bare");
    }

    #[test]
    fn test_entities_take_precedence() {
        let payload = EntityPayload::from_body(&json!({
            "entities": [{"type": "A", "start": 0, "end": 1}],
            "detections": [{"type": "B", "start": 1, "end": 2}, {"type": "C", "start": 2, "end": 3}]
        }));
        assert_eq!(payload.shape(), "entities");
        assert_eq!(payload.items().len(), 1);
    }

    #[test]
    fn test_null_entities_fall_through() {
        let payload = EntityPayload::from_body(&json!({
            "entities": null,
            "detections": [{"type": "B", "start": 1, "end": 2}]
        }));
        assert_eq!(payload.shape(), "detections");
    }

    #[test]
    fn test_unrecognized_shapes() {
        for body in [json!({"results": []}), json!("ok")] {
            assert_eq!(EntityPayload::from_body(&body), EntityPayload::Unrecognized);
        }
        assert!(EntityPayload::Unrecognized.items().is_empty());
    }

    #[test]
    fn test_to_detections_skips_malformed_records() {
        let index = TextIndex::new("Hello Jane Doe");
        let payload = EntityPayload::from_body(&json!({"entities": [
            {"type": "person", "start": 6, "end": 14, "confidence": 0.93},
            {"type": "person"},
            "not an object",
            {"label": "GREETING", "span": [0, 5]}
        ]}));

        let (detections, rejected) = payload.to_detections(&index);
        assert_eq!(rejected, 2);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].kind, "PERSON");
        assert_eq!(detections[0].span, Span::new(6, 14));
        assert_eq!(detections[0].original_value, "Jane Doe");
        assert_eq!(detections[0].confidence, Some(0.93));
        assert_eq!(detections[1].kind, "GREETING");
        assert!(detections.iter().all(|d| d.origin == Origin::Remote));
    }

    #[test]
    fn test_to_detections_tolerates_mixed_spellings() {
        let index = TextIndex::new("Hello Jane Doe");
        let payload = EntityPayload::from_body(&json!({"entities": [
            {"type": "PERSON", "label": "person", "start": 6, "end": 14},
            {"type": "NAME", "value": "Jane Doe", "text": "Jane", "start": 6, "end": 14},
            {"type": "NAME", "start": 6.0, "end": 14.0}
        ]}));

        let (detections, rejected) = payload.to_detections(&index);
        assert_eq!(rejected, 0);
        assert_eq!(detections.len(), 3);
        assert_eq!(detections[0].kind, "PERSON");
        assert!(detections.iter().all(|d| d.span == Span::new(6, 14)));
        assert!(detections.iter().all(|d| d.original_value == "Jane Doe"));
    }
}
