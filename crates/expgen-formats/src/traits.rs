//! The [`ConfigFormat`] trait implemented by every file adapter.

use serde_json::Value;

use crate::error::{FormatError, FormatResult};

/// A configuration file format.
///
/// `parse` always yields a mapping. `render` receives the text the tree was
/// parsed from so formats that keep layout (comments, ordering) can patch it
/// rather than write from scratch.
pub trait ConfigFormat: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn parse(&self, text: &str) -> FormatResult<Value>;

    fn render(&self, original: &str, tree: &Value) -> FormatResult<String>;
}

/// Short kind name of a parsed value, for error messages.
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Accept a parsed document as a top-level tree. An empty document is an
/// empty mapping.
pub(crate) fn require_mapping(format: &'static str, value: Value) -> FormatResult<Value> {
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Default::default())),
        other => Err(FormatError::NotAMapping {
            format,
            found: kind_name(&other),
        }),
    }
}
