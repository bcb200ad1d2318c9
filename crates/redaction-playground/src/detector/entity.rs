//! Loosely-shaped entity records and their normalization.
//!
//! Detectors, local or remote, do not agree on field names. [`EntityLike`]
//! accepts the known variants and [`EntityLike::to_detection`] maps them onto the
//! canonical [`Detection`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::detection::{normalize_kind, placeholder_for, Detection, Origin, Span};
use crate::text::TextIndex;

const KIND_KEYS: &[&str] = &["kind", "type", "label"];
const VALUE_KEYS: &[&str] = &["value", "text", "entity"];
const PAIR_KEYS: &[&str] = &["span", "position"];
const REPLACEMENT_KEYS: &[&str] = &["replacement", "placeholder"];

// Largest magnitude at which every integer is exactly representable as f64.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Why an entity could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// The record is not a JSON object.
    #[error("entity is not an object")]
    NotAnObject,

    /// Neither a `[start, end]` pair nor `start`/`end` fields were present.
    #[error("entity has no span")]
    MissingSpan,

    /// An offset field is present but is not an integer.
    #[error("entity field '{field}' is not an integer offset")]
    InvalidOffset {
        /// Name of the offending field.
        field: String,
    },

    /// An offset was negative.
    #[error("entity has a negative offset ({start}, {end})")]
    NegativeOffset {
        /// Start as received.
        start: i64,
        /// End as received.
        end: i64,
    },
}

/// An entity as emitted by a detector, before normalization.
///
/// Spans may arrive as `span`/`position: [start, end]` or as separate
/// `start`/`end` fields. The covered value may be named `value`, `text` or
/// `entity`, and the label `kind`, `type` or `label`. When a record carries
/// more than one spelling, the first in that order wins. Offsets may be
/// integers or integral floats such as `12.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityLike {
    /// Label of the entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Span as a pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<[i64; 2]>,

    /// Span start as a separate field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    /// Span end as a separate field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,

    /// The covered text, as reported by the detector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Replacement supplied by the detector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,

    /// Detector confidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Detector severity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl<'de> Deserialize<'de> for EntityLike {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl EntityLike {
    /// Read an entity from a JSON record.
    ///
    /// Only the presence and type of offsets is checked here; a record with
    /// no span at all is accepted and rejected later by
    /// [`EntityLike::to_detection`]. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not an object or an offset field is not
    /// an integer.
    pub fn from_value(value: &Value) -> Result<Self, EntityError> {
        let map = value.as_object().ok_or(EntityError::NotAnObject)?;

        let span = first_entry(map, PAIR_KEYS)
            .map(|(key, pair)| offset_pair(key, pair))
            .transpose()?;
        let start = map.get("start").filter(|v| !v.is_null());
        let end = map.get("end").filter(|v| !v.is_null());

        Ok(Self {
            kind: first_str(map, KIND_KEYS),
            span,
            start: start.map(|v| offset("start", v)).transpose()?,
            end: end.map(|v| offset("end", v)).transpose()?,
            value: first_str(map, VALUE_KEYS),
            replacement: first_str(map, REPLACEMENT_KEYS),
            confidence: map.get("confidence").and_then(Value::as_f64),
            severity: map
                .get("severity")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Entity with a pair-shaped span.
    #[must_use]
    pub fn with_pair(kind: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind: Some(kind.into()),
            span: Some([to_i64(start), to_i64(end)]),
            ..Self::default()
        }
    }

    /// Entity with separate `start`/`end` fields.
    #[must_use]
    pub fn with_fields(kind: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind: Some(kind.into()),
            start: Some(to_i64(start)),
            end: Some(to_i64(end)),
            ..Self::default()
        }
    }

    /// Attach the covered value.
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach a replacement.
    #[must_use]
    pub fn replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    /// The raw span, preferring the pair form over separate fields.
    #[must_use]
    pub fn raw_span(&self) -> Option<(i64, i64)> {
        match (self.span, self.start, self.end) {
            (Some([start, end]), _, _) | (None, Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Normalize into a [`Detection`].
    ///
    /// The span is not bounds-checked here; the merger drops spans that are
    /// empty or exceed the text. The original value is the text the span
    /// covers; the detector-supplied value is used only when the span cannot
    /// be sliced from `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity has no span or a negative offset.
    pub fn to_detection(
        &self,
        origin: Origin,
        index: &TextIndex<'_>,
    ) -> Result<Detection, EntityError> {
        let (start, end) = self.raw_span().ok_or(EntityError::MissingSpan)?;
        let (Ok(start_u), Ok(end_u)) = (usize::try_from(start), usize::try_from(end)) else {
            return Err(EntityError::NegativeOffset { start, end });
        };
        let span = Span::new(start_u, end_u);

        let kind = normalize_kind(self.kind.as_deref().unwrap_or_default());
        let original_value = index
            .slice(span.start, span.end)
            .map(str::to_string)
            .or_else(|| self.value.clone())
            .unwrap_or_default();
        let replacement = self
            .replacement
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| placeholder_for(&kind));

        Ok(Detection {
            kind,
            span,
            original_value,
            replacement,
            origin,
            confidence: self.confidence,
            severity: self.severity.clone(),
        })
    }
}

fn to_i64(offset: usize) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

fn first_entry<'m>(
    map: &'m Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'m Value)> {
    keys.iter()
        .find_map(|&key| map.get(key).filter(|v| !v.is_null()).map(|v| (key, v)))
}

fn first_str(map: &Map<String, Value>, keys: &[&'static str]) -> Option<String> {
    keys.iter()
        .find_map(|&key| map.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn offset_pair(field: &str, value: &Value) -> Result<[i64; 2], EntityError> {
    match value.as_array().map(Vec::as_slice) {
        Some([start, end]) => Ok([offset(field, start)?, offset(field, end)?]),
        _ => Err(EntityError::InvalidOffset {
            field: field.to_string(),
        }),
    }
}

fn offset(field: &str, value: &Value) -> Result<i64, EntityError> {
    value
        .as_i64()
        .or_else(|| value.as_f64().and_then(integral))
        .ok_or_else(|| EntityError::InvalidOffset {
            field: field.to_string(),
        })
}

#[allow(clippy::cast_possible_truncation)]
fn integral(value: f64) -> Option<i64> {
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_FLOAT {
        Some(value as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: &Value) -> EntityLike {
        EntityLike::from_value(value).unwrap()
    }

    #[test]
    fn test_pair_span_shape() {
        let entity: EntityLike =
            serde_json::from_str(r#"{"type":"email","span":[12,19],"value":"a@b.com"}"#).unwrap();
        let index = TextIndex::new("Email me at a@b.com");
        let detection = entity.to_detection(Origin::Local, &index).unwrap();
        assert_eq!(detection.kind, "EMAIL");
        assert_eq!(detection.span, Span::new(12, 19));
        assert_eq!(detection.original_value, "a@b.com");
        assert_eq!(detection.replacement, "[EMAIL]");
    }

    #[test]
    fn test_separate_fields_shape_with_text_spelling() {
        let entity: EntityLike =
            serde_json::from_str(r#"{"label":"PERSON","start":0,"end":4,"text":"Jane"}"#).unwrap();
        let index = TextIndex::new("Jane went home");
        let detection = entity.to_detection(Origin::Remote, &index).unwrap();
        assert_eq!(detection.kind, "PERSON");
        assert_eq!(detection.original_value, "Jane");
        assert_eq!(detection.origin, Origin::Remote);
    }

    #[test]
    fn test_entity_spelling_for_value() {
        let entity = entity(&json!({"kind": "NAME", "position": [0, 4], "entity": "Jane"}));
        assert_eq!(entity.value.as_deref(), Some("Jane"));
        assert_eq!(entity.raw_span(), Some((0, 4)));
    }

    #[test]
    fn test_kind_spellings_resolve_in_order() {
        let both = entity(&json!({"type": "PERSON", "label": "person", "start": 6, "end": 14}));
        assert_eq!(both.kind.as_deref(), Some("PERSON"));

        let all = entity(&json!({"label": "c", "type": "b", "kind": "a", "start": 0, "end": 1}));
        assert_eq!(all.kind.as_deref(), Some("a"));

        let null_kind = entity(&json!({"kind": null, "label": "NAME", "start": 0, "end": 1}));
        assert_eq!(null_kind.kind.as_deref(), Some("NAME"));
    }

    #[test]
    fn test_value_spellings_resolve_in_order() {
        let entity = entity(&json!({
            "type": "NAME",
            "value": "Jane",
            "text": "Jane Doe",
            "entity": "J",
            "start": 0,
            "end": 4
        }));
        assert_eq!(entity.value.as_deref(), Some("Jane"));

        let index = TextIndex::new("Jane went home");
        let detection = entity.to_detection(Origin::Remote, &index).unwrap();
        assert_eq!(detection.original_value, "Jane");
    }

    #[test]
    fn test_span_spellings_resolve_in_order() {
        let entity = entity(&json!({
            "type": "NAME",
            "position": [5, 9],
            "span": [0, 4],
            "start": 1,
            "end": 2
        }));
        assert_eq!(entity.raw_span(), Some((0, 4)));

        let fallback = EntityLike::from_value(&json!({"span": null, "position": [5, 9]})).unwrap();
        assert_eq!(fallback.raw_span(), Some((5, 9)));
    }

    #[test]
    fn test_integral_float_offsets() {
        let index = TextIndex::new("Hello Jane Doe");
        let entity = entity(&json!({"type": "person", "start": 6.0, "end": 14.0}));
        let detection = entity.to_detection(Origin::Remote, &index).unwrap();
        assert_eq!(detection.span, Span::new(6, 14));
        assert_eq!(detection.original_value, "Jane Doe");

        let pair = EntityLike::from_value(&json!({"type": "person", "span": [6.0, 14]})).unwrap();
        assert_eq!(pair.raw_span(), Some((6, 14)));
    }

    #[test]
    fn test_non_integer_offsets_are_errors() {
        assert_eq!(
            EntityLike::from_value(&json!({"start": 6.5, "end": 14})),
            Err(EntityError::InvalidOffset {
                field: "start".to_string(),
            })
        );
        assert_eq!(
            EntityLike::from_value(&json!({"start": 0, "end": "4"})),
            Err(EntityError::InvalidOffset {
                field: "end".to_string(),
            })
        );
        assert_eq!(
            EntityLike::from_value(&json!({"position": [1, 2, 3]})),
            Err(EntityError::InvalidOffset {
                field: "position".to_string(),
            })
        );
    }

    #[test]
    fn test_non_object_is_an_error() {
        assert_eq!(
            EntityLike::from_value(&json!("not an object")),
            Err(EntityError::NotAnObject)
        );
        assert!(serde_json::from_str::<EntityLike>("[1, 2]").is_err());
    }

    #[test]
    fn test_original_value_comes_from_span() {
        let entity = entity(&json!({"type": "NAME", "start": 0, "end": 5, "value": "Bob"}));
        let index = TextIndex::new("Email me at a@b.com");
        let detection = entity.to_detection(Origin::Remote, &index).unwrap();
        assert_eq!(detection.span, Span::new(0, 5));
        assert_eq!(detection.original_value, "Email");
    }

    #[test]
    fn test_supplied_value_used_when_span_unaddressable() {
        let entity = EntityLike::with_fields("EMAIL", 2, 40).value("a@b.com");
        let index = TextIndex::new("short");
        let detection = entity.to_detection(Origin::Remote, &index).unwrap();
        assert_eq!(detection.original_value, "a@b.com");
    }

    #[test]
    fn test_value_sliced_from_text_when_absent() {
        let entity = EntityLike::with_fields("PHONE", 5, 13);
        let index = TextIndex::new("call 555-1234 now");
        let detection = entity.to_detection(Origin::Remote, &index).unwrap();
        assert_eq!(detection.original_value, "555-1234");
    }

    #[test]
    fn test_supplied_replacement_is_kept() {
        let entity = EntityLike::with_pair("EMAIL", 0, 3).replacement("***");
        let index = TextIndex::new("a@b");
        let detection = entity.to_detection(Origin::Local, &index).unwrap();
        assert_eq!(detection.replacement, "***");
    }

    #[test]
    fn test_placeholder_spelling_for_replacement() {
        let entity = entity(&json!({"type": "EMAIL", "span": [0, 3], "placeholder": "<mail>"}));
        assert_eq!(entity.replacement.as_deref(), Some("<mail>"));
    }

    #[test]
    fn test_missing_span_is_an_error() {
        let entity: EntityLike = serde_json::from_str(r#"{"type":"EMAIL","value":"x"}"#).unwrap();
        let index = TextIndex::new("x");
        assert_eq!(
            entity.to_detection(Origin::Remote, &index),
            Err(EntityError::MissingSpan)
        );
    }

    #[test]
    fn test_start_without_end_is_missing_span() {
        let entity: EntityLike = serde_json::from_str(r#"{"type":"EMAIL","start":3}"#).unwrap();
        assert_eq!(entity.raw_span(), None);
    }

    #[test]
    fn test_negative_offset_is_an_error() {
        let entity: EntityLike =
            serde_json::from_str(r#"{"type":"EMAIL","start":-1,"end":3}"#).unwrap();
        let index = TextIndex::new("abc");
        assert!(matches!(
            entity.to_detection(Origin::Remote, &index),
            Err(EntityError::NegativeOffset { .. })
        ));
    }

    #[test]
    fn test_out_of_range_span_is_passed_through() {
        let entity = EntityLike::with_fields("EMAIL", 2, 40);
        let index = TextIndex::new("short");
        let detection = entity.to_detection(Origin::Remote, &index).unwrap();
        assert_eq!(detection.span, Span::new(2, 40));
        assert!(detection.original_value.is_empty());
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        let json = serde_json::to_value(EntityLike::with_pair("EMAIL", 0, 3)).unwrap();
        assert_eq!(json, json!({"kind": "EMAIL", "span": [0, 3]}));
    }
}
