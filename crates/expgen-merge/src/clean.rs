//! Remove cleaning: turn `REMOVE` markers into absence or null.

use expgen_types::{ChangeValue, Marker};
use serde_json::{Map, Value};

/// Resolve a change subtree into a plain value with no markers left.
///
/// - `REMOVE` resolves to absence (`pop_key`) or `null` (`!pop_key`). Inside
///   sequences it always resolves to absence.
/// - `PRESERVE` resolves to absence: with no base value to keep, there is
///   nothing to emit.
/// - Mappings and sequences are cleaned recursively. Sequence elements that
///   clean to an empty mapping are dropped. Any other empty value the change
///   spells out (`{}` under a key, `[]` anywhere) is kept.
/// - Scalars pass through unchanged.
///
/// Returns `None` when the value resolves to absence.
pub fn clean_removes(x: &ChangeValue, pop_key: bool) -> Option<Value> {
    match x {
        ChangeValue::Marker(Marker::Remove) => (!pop_key).then_some(Value::Null),
        ChangeValue::Marker(Marker::Preserve) => None,
        ChangeValue::Scalar(v) => Some(v.clone()),
        ChangeValue::Mapping(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                if let Some(cleaned) = clean_removes(value, pop_key) {
                    out.insert(key.clone(), cleaned);
                }
            }
            Some(Value::Object(out))
        }
        ChangeValue::Sequence(items) => Some(Value::Array(
            items
                .iter()
                .filter(|item| !item.is_removed())
                .filter_map(|item| clean_removes(item, pop_key))
                .filter(|cleaned| !is_empty_mapping(cleaned))
                .collect(),
        )),
    }
}

pub(crate) fn is_empty_mapping(v: &Value) -> bool {
    matches!(v, Value::Object(map) if map.is_empty())
}

/// `{}` or `[]`.
pub(crate) fn is_empty_container(v: &Value) -> bool {
    match v {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
