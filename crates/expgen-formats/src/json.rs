//! JSON documents, written with two-space indentation and a trailing
//! newline.

use serde_json::Value;

use crate::error::FormatResult;
use crate::traits::{require_mapping, ConfigFormat};

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonFormat;

impl ConfigFormat for JsonFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn parse(&self, text: &str) -> FormatResult<Value> {
        if text.trim().is_empty() {
            return require_mapping(self.name(), Value::Null);
        }
        let value: Value = serde_json::from_str(text)?;
        require_mapping(self.name(), value)
    }

    fn render(&self, _original: &str, tree: &Value) -> FormatResult<String> {
        let mut out = serde_json::to_string_pretty(tree)?;
        out.push('\n');
        Ok(out)
    }
}
