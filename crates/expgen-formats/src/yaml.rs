//! YAML documents.
//!
//! Comments and anchors are not kept across a parse/render cycle; key order
//! is.

use serde_json::Value;

use crate::error::FormatResult;
use crate::traits::{require_mapping, ConfigFormat};

#[derive(Clone, Copy, Debug, Default)]
pub struct YamlFormat;

impl ConfigFormat for YamlFormat {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn parse(&self, text: &str) -> FormatResult<Value> {
        let value: Value = serde_yaml::from_str(text)?;
        require_mapping(self.name(), value)
    }

    fn render(&self, _original: &str, tree: &Value) -> FormatResult<String> {
        Ok(serde_yaml::to_string(tree)?)
    }
}
