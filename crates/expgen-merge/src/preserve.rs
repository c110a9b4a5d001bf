//! Preserve stripping: decide whether a change subtree applies at all.

use expgen_types::{ChangeValue, Marker};
use indexmap::IndexMap;

/// Resolve `PRESERVE` markers in a change subtree.
///
/// Returns `None` when nothing should be applied to the corresponding base
/// value:
///
/// - a bare `PRESERVE` marker,
/// - a one-element sequence holding `PRESERVE` (keep the whole base list),
/// - a mapping whose every entry strips to nothing (including `{}`).
///
/// Otherwise returns the subtree with preserved mapping entries dropped.
/// Sequences are returned as-is: element-level markers are interpreted by
/// the positional list merge.
pub fn strip_preserved(x: &ChangeValue) -> Option<ChangeValue> {
    match x {
        ChangeValue::Marker(Marker::Preserve) => None,
        ChangeValue::Mapping(map) => {
            let kept: IndexMap<String, ChangeValue> = map
                .iter()
                .filter_map(|(k, v)| strip_preserved(v).map(|v| (k.clone(), v)))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(ChangeValue::Mapping(kept))
            }
        }
        ChangeValue::Sequence(items) if items.len() == 1 && items[0].is_preserved() => None,
        other => Some(other.clone()),
    }
}
