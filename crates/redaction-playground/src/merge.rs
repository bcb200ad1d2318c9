//! Merging local and remote detections.
//!
//! Local detections are deterministic and always win. Remote detections are
//! appended unless their exact `(start, end)` boundaries are already present.
//! Invalid spans are dropped, and the result is stably sorted by start.
//!
//! Exact-boundary dedup alone can leave overlapping spans. [`OverlapPolicy`]
//! decides what happens to them.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::detection::{Detection, Span};
use crate::text::TextIndex;

/// How overlapping, non-identical spans are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Dedup exact boundaries only; overlapping spans are all kept.
    ExactOnly,

    /// Keep the wider of two overlapping spans. On equal width the one merged
    /// first (local before remote, then arrival order) is kept.
    #[default]
    PreferWider,
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactOnly => write!(f, "exact_only"),
            Self::PreferWider => write!(f, "prefer_wider"),
        }
    }
}

/// Merge local and remote detections into one start-ordered list.
#[must_use]
pub fn merge_detections(
    local: Vec<Detection>,
    remote: Vec<Detection>,
    index: &TextIndex<'_>,
    policy: OverlapPolicy,
) -> Vec<Detection> {
    let addressable = |d: &Detection| {
        let ok = d.span.is_valid_within(index.len_utf16())
            && index.byte_range(d.span.start, d.span.end).is_some();
        if !ok {
            debug!(origin = %d.origin, kind = %d.kind, span = %d.span, "Dropping invalid span");
        }
        ok
    };

    let mut merged: Vec<Detection> = local.into_iter().filter(|d| addressable(d)).collect();
    let mut seen: HashSet<(usize, usize)> = merged.iter().map(Detection::key).collect();

    for detection in remote.into_iter().filter(|d| addressable(d)) {
        if seen.insert(detection.key()) {
            merged.push(detection);
        } else {
            trace!(span = %detection.span, "Remote detection confirms an existing span");
        }
    }

    if policy == OverlapPolicy::PreferWider {
        merged = resolve_overlaps(merged);
    }

    // stable: equal starts keep local-then-remote order
    merged.sort_by_key(|d| d.span.start);
    merged
}

/// Keep a non-overlapping subset, widest spans first.
///
/// `merged` is in insertion order; ties in width are broken by that order.
fn resolve_overlaps(merged: Vec<Detection>) -> Vec<Detection> {
    let mut ranked: Vec<usize> = (0..merged.len()).collect();
    ranked.sort_by(|&a, &b| merged[b].span.len().cmp(&merged[a].span.len()));

    // accepted spans, start -> end; never overlapping
    let mut accepted: BTreeMap<usize, usize> = BTreeMap::new();
    let mut keep = vec![false; merged.len()];

    for i in ranked {
        let span = merged[i].span;
        let blocked = accepted
            .range(..span.end)
            .next_back()
            .is_some_and(|(&start, &end)| Span::new(start, end).overlaps(&span));
        if blocked {
            trace!(origin = %merged[i].origin, span = %span, "Dropping overlapped span");
        } else {
            accepted.insert(span.start, span.end);
            keep[i] = true;
        }
    }

    merged
        .into_iter()
        .zip(keep)
        .filter_map(|(detection, kept)| kept.then_some(detection))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Origin, Span};

    fn local(start: usize, end: usize, kind: &str) -> Detection {
        Detection::new(kind, Span::new(start, end), "", Origin::Local)
    }

    fn remote(start: usize, end: usize, kind: &str) -> Detection {
        Detection::new(kind, Span::new(start, end), "", Origin::Remote)
    }

    fn spans(detections: &[Detection]) -> Vec<(usize, usize)> {
        detections.iter().map(Detection::key).collect()
    }

    const TEXT: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

    #[test]
    fn test_exact_duplicate_is_dropped() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(0, 4, "EMAIL")],
            vec![remote(0, 4, "EMAIL"), remote(10, 14, "NAME")],
            &index,
            OverlapPolicy::ExactOnly,
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].key(), (0, 4));
        assert_eq!(merged[0].origin, Origin::Local);
        assert_eq!(merged[1].key(), (10, 14));
        assert_eq!(merged[1].origin, Origin::Remote);
    }

    #[test]
    fn test_local_wins_on_duplicate_even_with_different_kind() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(0, 4, "EMAIL")],
            vec![remote(0, 4, "CONTACT")],
            &index,
            OverlapPolicy::PreferWider,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, "EMAIL");
    }

    #[test]
    fn test_duplicate_remote_entries_are_collapsed() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![],
            vec![remote(5, 8, "A"), remote(5, 8, "B")],
            &index,
            OverlapPolicy::ExactOnly,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, "A");
    }

    #[test]
    fn test_output_sorted_by_start() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(20, 24, "A"), local(2, 4, "B")],
            vec![remote(30, 33, "C"), remote(10, 12, "D"), remote(0, 1, "E")],
            &index,
            OverlapPolicy::PreferWider,
        );
        assert_eq!(
            spans(&merged),
            vec![(0, 1), (2, 4), (10, 12), (20, 24), (30, 33)]
        );
    }

    #[test]
    fn test_invalid_spans_are_dropped() {
        let index = TextIndex::new("short text");
        let merged = merge_detections(
            vec![local(3, 3, "EMPTY")],
            vec![remote(6, 2, "REVERSED"), remote(5, 99, "PAST_END"), remote(0, 5, "OK")],
            &index,
            OverlapPolicy::ExactOnly,
        );
        assert_eq!(spans(&merged), vec![(0, 5)]);
    }

    #[test]
    fn test_span_splitting_surrogate_pair_is_dropped() {
        let index = TextIndex::new("a\u{1F600}b");
        let merged = merge_detections(
            vec![],
            vec![remote(1, 2, "HALF"), remote(1, 3, "WHOLE")],
            &index,
            OverlapPolicy::ExactOnly,
        );
        assert_eq!(spans(&merged), vec![(1, 3)]);
    }

    #[test]
    fn test_exact_only_keeps_overlaps() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(0, 6, "A")],
            vec![remote(4, 10, "B"), remote(1, 3, "C")],
            &index,
            OverlapPolicy::ExactOnly,
        );
        assert_eq!(spans(&merged), vec![(0, 6), (1, 3), (4, 10)]);
    }

    #[test]
    fn test_prefer_wider_drops_contained_span() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(2, 5, "LAST_NAME")],
            vec![remote(0, 5, "PERSON")],
            &index,
            OverlapPolicy::PreferWider,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, "PERSON");
        assert_eq!(merged[0].origin, Origin::Remote);
    }

    #[test]
    fn test_prefer_wider_partial_overlap() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(0, 6, "A")],
            vec![remote(4, 12, "B")],
            &index,
            OverlapPolicy::PreferWider,
        );
        assert_eq!(spans(&merged), vec![(4, 12)]);
    }

    #[test]
    fn test_prefer_wider_tie_keeps_local() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(2, 6, "LOCAL")],
            vec![remote(4, 8, "REMOTE")],
            &index,
            OverlapPolicy::PreferWider,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, "LOCAL");
    }

    #[test]
    fn test_prefer_wider_tie_between_remotes_keeps_first() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![],
            vec![remote(4, 8, "FIRST"), remote(2, 6, "SECOND")],
            &index,
            OverlapPolicy::PreferWider,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, "FIRST");
    }

    #[test]
    fn test_prefer_wider_keeps_adjacent_spans() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(0, 4, "A")],
            vec![remote(4, 8, "B"), remote(8, 9, "C")],
            &index,
            OverlapPolicy::PreferWider,
        );
        assert_eq!(spans(&merged), vec![(0, 4), (4, 8), (8, 9)]);
    }

    #[test]
    fn test_prefer_wider_output_never_overlaps() {
        let index = TextIndex::new(TEXT);
        let merged = merge_detections(
            vec![local(0, 3, "A"), local(5, 9, "B"), local(12, 20, "C")],
            vec![
                remote(2, 6, "D"),
                remote(8, 13, "E"),
                remote(15, 16, "F"),
                remote(19, 30, "G"),
            ],
            &index,
            OverlapPolicy::PreferWider,
        );
        for pair in merged.windows(2) {
            assert!(
                pair[0].span.end <= pair[1].span.start,
                "{:?}",
                spans(&merged)
            );
        }
    }

    #[test]
    fn test_empty_inputs() {
        let index = TextIndex::new("");
        let merged = merge_detections(vec![], vec![], &index, OverlapPolicy::default());
        assert!(merged.is_empty());
    }

    #[test]
    fn test_policy_default_and_display() {
        assert_eq!(OverlapPolicy::default(), OverlapPolicy::PreferWider);
        assert_eq!(OverlapPolicy::ExactOnly.to_string(), "exact_only");
    }
}
