//! The structural merge engine.

use expgen_types::{path_join, ChangeValue, RemoveState};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::clean::{clean_removes, is_empty_container};
use crate::error::{MergeError, MergeResult};
use crate::positional::merge_lists_positional;
use crate::preserve::strip_preserved;

/// What to do with one base key after its change has been resolved.
enum Apply {
    Keep,
    Remove,
    Replace(Value),
}

/// Merge `change` into `base` in place.
///
/// For each key of `change`:
///
/// 1. [`strip_preserved`] decides whether it applies at all; preserved keys
///    leave the base value untouched.
/// 2. Mapping onto mapping recurses (path extended by `.key`); an emptied
///    mapping is dropped when `pop_key` is set.
/// 3. Sequence onto list goes through [`merge_lists_positional`]; the result
///    is spliced into the existing list so its identity survives. A deleted
///    or (with `pop_key`) empty result drops the key.
/// 4. Anything else is cleaned with [`clean_removes`] and assigned; a
///    top-level `REMOVE`, or (with `pop_key`) an empty container, drops the
///    key.
///
/// On error, `base` and `state` may be partially updated; use [`merge`] for
/// an all-or-nothing call.
pub fn update_config_entries(
    base: &mut Map<String, Value>,
    change: &IndexMap<String, ChangeValue>,
    path: &str,
    state: &mut RemoveState,
    pop_key: bool,
) -> MergeResult<()> {
    for (key, raw) in change {
        let Some(value) = strip_preserved(raw) else {
            trace!(path = %path_join(path, key), "preserved");
            continue;
        };
        let key_path = path_join(path, key);

        let action = match (base.get_mut(key), &value) {
            (Some(Value::Object(inner)), ChangeValue::Mapping(nested)) => {
                update_config_entries(inner, nested, &key_path, state, pop_key)?;
                if pop_key && inner.is_empty() {
                    Apply::Remove
                } else {
                    Apply::Keep
                }
            }
            (Some(Value::Array(list)), ChangeValue::Sequence(items)) => {
                match merge_lists_positional(list, items, &key_path, state, pop_key)? {
                    None => Apply::Remove,
                    Some(merged) if pop_key && merged.is_empty() => Apply::Remove,
                    Some(merged) => {
                        splice_in_place(list, merged);
                        Apply::Keep
                    }
                }
            }
            _ => match clean_removes(&value, pop_key) {
                None => Apply::Remove,
                Some(cleaned) if pop_key && is_empty_container(&cleaned) => Apply::Remove,
                Some(cleaned) => Apply::Replace(cleaned),
            },
        };

        match action {
            Apply::Keep => {}
            Apply::Remove => {
                if base.shift_remove(key).is_some() {
                    trace!(path = %key_path, "removed");
                }
            }
            Apply::Replace(cleaned) => {
                base.insert(key.clone(), cleaned);
            }
        }
    }
    Ok(())
}

/// Overwrite `list` with `merged` without replacing the `Vec` itself:
/// overlapping slots are assigned, extra new slots appended, extra old slots
/// truncated. An unchanged list is not touched.
fn splice_in_place(list: &mut Vec<Value>, merged: Vec<Value>) {
    if *list == merged {
        return;
    }
    let new_len = merged.len();
    let mut incoming = merged.into_iter();
    for slot in list.iter_mut() {
        match incoming.next() {
            Some(value) => *slot = value,
            None => break,
        }
    }
    list.extend(incoming);
    list.truncate(new_len);
}

/// Merge `change` into `base`, all or nothing.
///
/// Both trees must be mappings at the top level. The merge runs on scratch
/// copies of `base` and `state`; they are written back only if the whole
/// merge succeeds, so a failed call leaves the caller's values untouched.
///
/// `path` is the root structural path (typically the file being merged) and
/// scopes the keys written to `state`.
pub fn merge(
    base: &mut Value,
    change: &ChangeValue,
    path: &str,
    state: &mut RemoveState,
    pop_key: bool,
) -> MergeResult<()> {
    let Value::Object(base_map) = base else {
        return Err(MergeError::TypeMismatch {
            path: path.to_string(),
            expected: "mapping",
            actual: value_kind(base),
        });
    };
    let ChangeValue::Mapping(change_map) = change else {
        return Err(MergeError::TypeMismatch {
            path: path.to_string(),
            expected: "mapping",
            actual: change.kind(),
        });
    };

    let mut scratch = base_map.clone();
    let mut scratch_state = state.clone();
    update_config_entries(&mut scratch, change_map, path, &mut scratch_state, pop_key)?;

    debug!(
        %path,
        keys = change_map.len(),
        state_entries = scratch_state.len(),
        "merged change tree"
    );
    *base_map = scratch;
    *state = scratch_state;
    Ok(())
}

pub(crate) fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
