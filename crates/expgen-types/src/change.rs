//! Change trees and the control markers they may carry.
//!
//! A change tree is decoded from a human-authored YAML/JSON document. The
//! literal strings `REMOVE` and `PRESERVE` are turned into [`Marker`] values
//! at decode time; nowhere else in the system compares against them.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Control marker embedded in a change tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Delete the corresponding base key or element.
    Remove,
    /// Leave the corresponding base key or element untouched.
    Preserve,
}

impl Marker {
    /// Spelling used in configuration files.
    pub const REMOVE_LITERAL: &'static str = "REMOVE";
    /// Spelling used in configuration files.
    pub const PRESERVE_LITERAL: &'static str = "PRESERVE";

    /// Decode a literal. Matching is exact: no trimming, no case folding.
    pub fn from_literal(s: &str) -> Option<Self> {
        match s {
            Self::REMOVE_LITERAL => Some(Self::Remove),
            Self::PRESERVE_LITERAL => Some(Self::Preserve),
            _ => None,
        }
    }

    /// The file-encoding spelling of this marker.
    pub fn as_literal(&self) -> &'static str {
        match self {
            Self::Remove => Self::REMOVE_LITERAL,
            Self::Preserve => Self::PRESERVE_LITERAL,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_literal())
    }
}

/// A sparse change tree applied onto a configuration tree.
///
/// `Scalar` never holds an array or an object, and never holds a string
/// spelled like a marker; [`ChangeValue::from_json`] guarantees both.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeValue {
    /// A control marker.
    Marker(Marker),
    /// A string, number, boolean, or null.
    Scalar(Value),
    /// An ordered sequence; merged positionally against base lists.
    Sequence(Vec<ChangeValue>),
    /// A mapping; merged key by key against base mappings.
    Mapping(IndexMap<String, ChangeValue>),
}

impl ChangeValue {
    /// Shorthand for `ChangeValue::Marker(Marker::Remove)`.
    pub const REMOVE: Self = Self::Marker(Marker::Remove);
    /// Shorthand for `ChangeValue::Marker(Marker::Preserve)`.
    pub const PRESERVE: Self = Self::Marker(Marker::Preserve);

    /// Decode a parsed document into a change tree.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => match Marker::from_literal(s) {
                Some(marker) => Self::Marker(marker),
                None => Self::Scalar(value.clone()),
            },
            Value::Array(items) => Self::Sequence(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
            scalar => Self::Scalar(scalar.clone()),
        }
    }

    /// Encode back into a document, spelling markers literally.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Marker(marker) => Value::String(marker.as_literal().to_string()),
            Self::Scalar(v) => v.clone(),
            Self::Sequence(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Empty mapping.
    pub fn mapping() -> Self {
        Self::Mapping(IndexMap::new())
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Marker(Marker::Remove))
    }

    pub fn is_preserved(&self) -> bool {
        matches!(self, Self::Marker(Marker::Preserve))
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Marker(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, ChangeValue>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ChangeValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Short variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Marker(Marker::Remove) => "REMOVE marker",
            Self::Marker(Marker::Preserve) => "PRESERVE marker",
            Self::Scalar(_) => "scalar",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }
}

impl From<Value> for ChangeValue {
    fn from(value: Value) -> Self {
        Self::from_json(&value)
    }
}

impl From<&Value> for ChangeValue {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

impl Serialize for ChangeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChangeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

/// True iff `x` is the `REMOVE` marker.
pub fn is_removed(x: &ChangeValue) -> bool {
    x.is_removed()
}

/// True iff `x` is the `PRESERVE` marker.
pub fn is_preserved(x: &ChangeValue) -> bool {
    x.is_preserved()
}

/// True iff `x` is an ordered sequence. Strings are always scalars.
pub fn is_sequence(x: &ChangeValue) -> bool {
    x.is_sequence()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_literals_decode_to_markers() {
        assert!(is_removed(&ChangeValue::from_json(&json!("REMOVE"))));
        assert!(is_preserved(&ChangeValue::from_json(&json!("PRESERVE"))));
    }

    #[test]
    fn near_miss_literals_stay_scalars() {
        for raw in [json!("REMOVE "), json!("remove"), json!(" "), json!(null), json!(1)] {
            let decoded = ChangeValue::from_json(&raw);
            assert!(!is_removed(&decoded), "{raw} decoded as REMOVE");
            assert!(!is_preserved(&decoded), "{raw} decoded as PRESERVE");
            assert_eq!(decoded, ChangeValue::Scalar(raw));
        }
    }

    #[test]
    fn marker_inside_list_is_not_itself_a_marker() {
        let decoded = ChangeValue::from_json(&json!(["REMOVE"]));
        assert!(!is_removed(&decoded));
        assert!(is_sequence(&decoded));
        assert!(decoded.as_sequence().unwrap()[0].is_removed());
    }

    #[test]
    fn strings_are_never_sequences() {
        assert!(!is_sequence(&ChangeValue::from_json(&json!("abc"))));
        assert!(!is_sequence(&ChangeValue::from_json(&json!(""))));
        assert!(!is_sequence(&ChangeValue::from_json(&json!({"a": 1}))));
        assert!(is_sequence(&ChangeValue::from_json(&json!([]))));
        assert!(is_sequence(&ChangeValue::from_json(&json!([1, 2, 3]))));
    }

    #[test]
    fn nested_decode_keeps_key_order() {
        let decoded = ChangeValue::from_json(&json!({"z": 1, "a": {"y": "PRESERVE", "b": [1, "REMOVE"]}}));
        let map = decoded.as_mapping().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        let inner = map["a"].as_mapping().unwrap();
        assert!(inner["y"].is_preserved());
        assert!(inner["b"].as_sequence().unwrap()[1].is_removed());
    }

    #[test]
    fn to_json_spells_markers() {
        let raw = json!({"a": "REMOVE", "b": ["PRESERVE", 2], "c": {"d": null}});
        assert_eq!(ChangeValue::from_json(&raw).to_json(), raw);
    }

    #[test]
    fn deserialize_from_yaml_like_json() {
        let decoded: ChangeValue = serde_json::from_str(r#"{"queue": "REMOVE"}"#).unwrap();
        assert!(decoded.as_mapping().unwrap()["queue"].is_removed());
    }

    #[test]
    fn marker_display() {
        assert_eq!(Marker::Remove.to_string(), "REMOVE");
        assert_eq!(Marker::Preserve.to_string(), "PRESERVE");
        assert_eq!(Marker::from_literal("PRESERVE"), Some(Marker::Preserve));
        assert_eq!(Marker::from_literal("RESERVE"), None);
    }
}
