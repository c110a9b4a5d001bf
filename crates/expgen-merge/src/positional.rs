//! Positional list merge against a persisted baseline.
//!
//! Deleting element `i` of a list shifts every later index, so a change list
//! saying "remove slot 2" would remove a different element on the next run.
//! Every change-list index is therefore read against a frozen snapshot of the
//! base list, captured into the [`RemoveState`] the first time the path is
//! merged and reused on every later run.

use expgen_types::{base_state_key, index_segment, path_join, ChangeValue, Marker, RemoveState};
use serde_json::Value;
use tracing::{debug, trace};

use crate::clean::{clean_removes, is_empty_mapping};
use crate::engine::update_config_entries;
use crate::error::{MergeError, MergeResult};

/// Merge `change` into the list at `path`, slot by slot.
///
/// Returns `Ok(None)` when the whole list is deleted (every change element is
/// `REMOVE` and there is one per baseline slot); the caller must then drop
/// the key. Otherwise returns the merged list, which may be empty.
///
/// The length check reads the baseline, not the live list. An all-`REMOVE`
/// change shorter than the baseline removes those slots and keeps the rest,
/// even when an earlier run already shrank the live list to the same length.
///
/// Per slot `i` of `max(baseline, change)`:
///
/// - no change entry: the baseline element is kept;
/// - `PRESERVE`: the baseline element is kept;
/// - `REMOVE`: the slot is dropped and recorded under `path::REMOVE[i]`;
/// - mapping onto a baseline mapping: merged with [`update_config_entries`];
/// - sequence onto a baseline list: merged recursively;
/// - anything else: replaced by the cleaned change element.
///
/// A marker at an index with no baseline slot is a
/// [`MergeError::MarkerOutOfRange`].
pub fn merge_lists_positional(
    base: &[Value],
    change: &[ChangeValue],
    path: &str,
    state: &mut RemoveState,
    pop_key: bool,
) -> MergeResult<Option<Vec<Value>>> {
    let reference_len = match state.baseline(path) {
        Some(Value::Array(snapshot)) => snapshot.len(),
        Some(_) => {
            return Err(MergeError::CorruptBaseline {
                key: base_state_key(path),
            })
        }
        None => base.len(),
    };
    if !change.is_empty() && change.len() == reference_len && change.iter().all(ChangeValue::is_removed) {
        debug!(%path, len = change.len(), "every slot removed; dropping whole list");
        return Ok(None);
    }

    if state.baseline(path).is_none() {
        trace!(%path, len = base.len(), "capturing baseline snapshot");
    }
    let baseline = match state.capture_baseline(path, base) {
        Value::Array(snapshot) => snapshot.clone(),
        _ => {
            return Err(MergeError::CorruptBaseline {
                key: base_state_key(path),
            })
        }
    };

    let slots = baseline.len().max(change.len());
    let mut out = Vec::with_capacity(slots);

    for i in 0..slots {
        let slot = baseline.get(i);
        let Some(entry) = change.get(i) else {
            out.extend(slot.cloned());
            continue;
        };

        match (slot, entry) {
            (None, ChangeValue::Marker(marker)) => {
                return Err(MergeError::MarkerOutOfRange {
                    path: path.to_string(),
                    index: i,
                    marker: *marker,
                    baseline_len: baseline.len(),
                });
            }
            (Some(kept), ChangeValue::Marker(Marker::Preserve)) => out.push(kept.clone()),
            (Some(removed), ChangeValue::Marker(Marker::Remove)) => {
                state.record_removal(path, i, removed);
            }
            (Some(Value::Object(slot_map)), ChangeValue::Mapping(nested)) => {
                let mut merged = slot_map.clone();
                update_config_entries(&mut merged, nested, &slot_path(path, i), state, pop_key)?;
                if pop_key && merged.is_empty() {
                    continue;
                }
                out.push(Value::Object(merged));
            }
            (Some(Value::Array(slot_list)), ChangeValue::Sequence(nested)) => {
                match merge_lists_positional(slot_list, nested, &slot_path(path, i), state, pop_key)? {
                    Some(merged) if !(pop_key && merged.is_empty()) => out.push(Value::Array(merged)),
                    _ => {}
                }
            }
            (_, replacement) => match clean_removes(replacement, pop_key) {
                Some(cleaned) if pop_key && is_empty_mapping(&cleaned) => {}
                Some(cleaned) => out.push(cleaned),
                None => {}
            },
        }
    }

    Ok(Some(out))
}

fn slot_path(path: &str, i: usize) -> String {
    path_join(path, &index_segment(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq(v: Value) -> Vec<ChangeValue> {
        match ChangeValue::from_json(&v) {
            ChangeValue::Sequence(items) => items,
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    fn list(v: Value) -> Vec<Value> {
        match v {
            Value::Array(items) => items,
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn shrinking_list_is_stable_across_reruns() {
        let mut state = RemoveState::new();
        let change = seq(json!(["PRESERVE", "REMOVE", "PRESERVE", "PRESERVE"]));

        let first = merge_lists_positional(&list(json!(["a", "b", "c", "d"])), &change, "l", &mut state, true)
            .unwrap()
            .unwrap();
        assert_eq!(first, list(json!(["a", "c", "d"])));
        assert_eq!(state.baseline("l"), Some(&json!(["a", "b", "c", "d"])));
        assert_eq!(state.get("l::REMOVE[1]"), Some(&json!("b")));

        let second = merge_lists_positional(&first, &change, "l", &mut state, true)
            .unwrap()
            .unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn marker_past_baseline_is_an_error() {
        let mut state = RemoveState::new();
        let err = merge_lists_positional(
            &list(json!(["a", "b"])),
            &seq(json!(["PRESERVE", "PRESERVE", "PRESERVE"])),
            "l",
            &mut state,
            true,
        )
        .unwrap_err();

        match err {
            MergeError::MarkerOutOfRange { path, index, marker, baseline_len } => {
                assert_eq!(path, "l");
                assert_eq!(index, 2);
                assert_eq!(marker, Marker::Preserve);
                assert_eq!(baseline_len, 2);
            }
            other => panic!("expected MarkerOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn all_removes_delete_whole_list() {
        let mut state = RemoveState::new();
        let merged = merge_lists_positional(
            &list(json!(["a", "b"])),
            &seq(json!(["REMOVE", "REMOVE"])),
            "l",
            &mut state,
            true,
        )
        .unwrap();
        assert_eq!(merged, None);
        assert!(state.is_empty());
    }

    #[test]
    fn fewer_removes_than_slots_keep_the_tail() {
        let mut state = RemoveState::new();
        let change = seq(json!(["REMOVE", "REMOVE"]));
        let first = merge_lists_positional(&list(json!([1, 2, 3, 4])), &change, "l", &mut state, true)
            .unwrap()
            .unwrap();
        assert_eq!(first, list(json!([3, 4])));

        // The live list now has as many slots as there are markers; the
        // baseline, not the live list, decides whether this is a whole delete.
        let second = merge_lists_positional(&first, &change, "l", &mut state, true)
            .unwrap()
            .unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn mapping_slot_merges_recursively() {
        let mut state = RemoveState::new();
        let merged = merge_lists_positional(
            &list(json!([{"x": 1, "y": 2}])),
            &seq(json!([{"y": "REMOVE"}])),
            "l",
            &mut state,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(merged, list(json!([{"x": 1}])));
    }

    #[test]
    fn emptied_mapping_slot_is_dropped_with_pop_key() {
        let mut state = RemoveState::new();
        let base = list(json!([{"x": 1}, 2]));
        let change = seq(json!([{"x": "REMOVE"}]));

        let popped = merge_lists_positional(&base, &change, "l", &mut state, true).unwrap().unwrap();
        assert_eq!(popped, list(json!([2])));

        let mut state = RemoveState::new();
        let kept = merge_lists_positional(&base, &change, "l", &mut state, false).unwrap().unwrap();
        assert_eq!(kept, list(json!([{"x": null}, 2])));
    }

    #[test]
    fn nested_lists_merge_with_their_own_baseline() {
        let mut state = RemoveState::new();
        let merged = merge_lists_positional(
            &list(json!([[1, 2, 3], "s"])),
            &seq(json!([["PRESERVE", "REMOVE"]])),
            "l",
            &mut state,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(merged, list(json!([[1, 3], "s"])));
        assert_eq!(state.baseline("l[0]"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn longer_change_appends_cleaned_elements() {
        let mut state = RemoveState::new();
        let merged = merge_lists_positional(
            &list(json!([1])),
            &seq(json!(["PRESERVE", 2, {"a": "REMOVE", "b": 3}, {"c": "REMOVE"}])),
            "l",
            &mut state,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(merged, list(json!([1, 2, {"b": 3}])));
    }

    #[test]
    fn scalar_slot_replaced_by_change() {
        let mut state = RemoveState::new();
        let merged = merge_lists_positional(
            &list(json!([1, {"a": 1}, 3])),
            &seq(json!([10, 20])),
            "l",
            &mut state,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(merged, list(json!([10, 20, 3])));
    }

    #[test]
    fn explicit_empty_list_replaces_slot() {
        let mut state = RemoveState::new();
        let merged = merge_lists_positional(
            &list(json!([1, 2])),
            &seq(json!([[], 5])),
            "l",
            &mut state,
            true,
        )
        .unwrap();
        assert_eq!(merged, Some(list(json!([[], 5]))));
    }

    #[test]
    fn slots_read_from_baseline_not_live_list() {
        let mut state = RemoveState::new();
        state.capture_baseline("l", &list(json!(["a", "b", "c"])));

        // Live list has drifted; preserved slots still come from the snapshot.
        let merged = merge_lists_positional(
            &list(json!(["zzz"])),
            &seq(json!(["PRESERVE", "REMOVE", "PRESERVE"])),
            "l",
            &mut state,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(merged, list(json!(["a", "c"])));
    }

    #[test]
    fn corrupt_baseline_is_reported() {
        let mut state = RemoveState::new();
        state.insert("l::BASE", json!("not a list"));
        let err = merge_lists_positional(&list(json!([1])), &seq(json!([2])), "l", &mut state, true)
            .unwrap_err();
        assert!(matches!(err, MergeError::CorruptBaseline { key } if key == "l::BASE"));
    }
}
