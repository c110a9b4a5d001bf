//! MOM `field_table` files.
//!
//! Each entry starts with a three-string header `"type","model","name"`,
//! lists methods one per line, and ends with a `/`:
//!
//! ```text
//! "TRACER", "atmos_mod", "sphum"
//!     "longname", "specific humidity"
//!     "profile_type", "fixed", "surface_value=3.e-6" /
//! ```
//!
//! The tree shape is `{name: {model: {type: {"methods": [method, ...]}}}}`
//! where a method is `{"key", "value"}` plus an optional `"params"` mapping
//! parsed from the third string. Unquoted `key = value` lines are accepted
//! on read. Output is always the strict quoted form, so rendering ignores the
//! original text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::{FormatError, FormatResult};
use crate::traits::{kind_name, ConfigFormat};

static THREE_STRINGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"([^"]*)"\s*,\s*"([^"]*)"\s*,\s*"([^"]*)"\s*$"#)
        .expect("failed to compile three-string regex")
});

static TWO_STRINGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"([^"]*)"\s*,\s*"([^"]*)"\s*$"#).expect("failed to compile two-string regex")
});

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_.-]+(?:/[A-Za-z0-9_.-]+)*)\s*=\s*(.*?)\s*$")
        .expect("failed to compile assignment regex")
});

#[derive(Clone, Copy, Debug, Default)]
pub struct FieldTableFormat;

impl ConfigFormat for FieldTableFormat {
    fn name(&self) -> &'static str {
        "field_table"
    }

    fn parse(&self, text: &str) -> FormatResult<Value> {
        parse_field_table(text)
    }

    fn render(&self, _original: &str, tree: &Value) -> FormatResult<String> {
        write_field_table(tree)
    }
}

fn syntax(line: usize, message: impl Into<String>) -> FormatError {
    FormatError::FieldTable {
        line: line + 1,
        message: message.into(),
    }
}

/// Split a trailing `/` terminator off a line.
fn split_end(line: &str) -> (&str, bool) {
    let trimmed = line.trim_end();
    match trimmed.strip_suffix('/') {
        Some(body) => (body.trim_end(), true),
        None => (trimmed, false),
    }
}

/// Parse `k=v, k2=v2` into an ordered mapping. `None` if any part is not a
/// `key=value` pair.
fn parse_params(blob: &str) -> Option<Map<String, Value>> {
    let mut params = Map::new();
    for part in blob.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        params.insert(key.to_string(), Value::String(value.trim().to_string()));
    }
    Some(params)
}

fn parse_method(body: &str, line: usize) -> FormatResult<Option<Value>> {
    if let Some(caps) = THREE_STRINGS.captures(body) {
        let blob = &caps[3];
        let mut method = json!({"key": &caps[1], "value": &caps[2]});
        if !blob.trim().is_empty() {
            let params = parse_params(blob)
                .ok_or_else(|| syntax(line, format!("malformed parameter list {blob:?}")))?;
            method["params"] = Value::Object(params);
        }
        return Ok(Some(method));
    }
    if let Some(caps) = TWO_STRINGS.captures(body) {
        return Ok(Some(json!({"key": &caps[1], "value": &caps[2]})));
    }
    if let Some(caps) = ASSIGNMENT.captures(body) {
        return Ok(Some(json!({"key": &caps[1], "value": &caps[2]})));
    }
    Ok(None)
}

fn store_field(tree: &mut Map<String, Value>, header: &[String; 3], methods: Vec<Value>) {
    let [field_type, model, name] = header;
    let block = tree
        .entry(name.clone())
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .and_then(|models| {
            models
                .entry(model.clone())
                .or_insert_with(|| json!({}))
                .as_object_mut()
        })
        .map(|types| {
            types
                .entry(field_type.clone())
                .or_insert_with(|| json!({"methods": []}))
        });
    if let Some(Value::Array(existing)) = block.and_then(|b| b.get_mut("methods")) {
        existing.extend(methods);
    }
}

/// Parse field table text into its tree.
pub fn parse_field_table(text: &str) -> FormatResult<Value> {
    let mut tree = Map::new();
    let mut current: Option<([String; 3], Vec<Value>, usize)> = None;

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let (body, is_end) = split_end(line);

        match current.as_mut() {
            None => {
                let caps = THREE_STRINGS.captures(body).ok_or_else(|| {
                    syntax(line_no, format!("expected a header of three quoted strings, got {:?}", line.trim()))
                })?;
                let header = [caps[1].to_string(), caps[2].to_string(), caps[3].to_string()];
                if is_end {
                    store_field(&mut tree, &header, Vec::new());
                } else {
                    current = Some((header, Vec::new(), line_no));
                }
            }
            Some((header, methods, _)) => {
                if !body.trim().is_empty() {
                    match parse_method(body, line_no)? {
                        Some(method) => methods.push(method),
                        None => warn!(line = line_no + 1, text = %body.trim(), "skipping unrecognised field table line"),
                    }
                }
                if is_end {
                    store_field(&mut tree, header, std::mem::take(methods));
                    current = None;
                }
            }
        }
    }

    if let Some((header, _, start)) = current {
        return Err(syntax(
            start,
            format!("entry {header:?} is missing its trailing '/' terminator"),
        ));
    }
    Ok(Value::Object(tree))
}

fn text_of(value: Option<&Value>, path: &str) -> FormatResult<String> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
        Some(other) => Err(unrepresentable(path, format!("expected a scalar, found {}", kind_name(other)))),
        None => Err(unrepresentable(path, "missing")),
    }
}

fn unrepresentable(path: &str, message: impl Into<String>) -> FormatError {
    FormatError::Unrepresentable {
        format: "field_table",
        path: path.to_string(),
        message: message.into(),
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> FormatResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| unrepresentable(path, format!("expected a mapping, found {}", kind_name(value))))
}

fn render_method(method: &Value, path: &str) -> FormatResult<String> {
    let method = as_object(method, path)?;
    let key = text_of(method.get("key"), &format!("{path}.key"))?;
    let value = text_of(method.get("value"), &format!("{path}.value"))?;

    let params = match method.get("params") {
        None | Some(Value::Null) => Vec::new(),
        Some(params) => {
            let params = as_object(params, &format!("{path}.params"))?;
            let mut keys: Vec<&String> = params.keys().collect();
            keys.sort();
            keys.into_iter()
                .map(|k| Ok(format!("{k}={}", text_of(params.get(k), &format!("{path}.params.{k}"))?)))
                .collect::<FormatResult<Vec<_>>>()?
        }
    };

    if params.is_empty() {
        Ok(format!("\"{key}\", \"{value}\""))
    } else {
        Ok(format!("\"{key}\", \"{value}\", \"{}\"", params.join(", ")))
    }
}

/// Write a field table tree in the strict quoted form.
pub fn write_field_table(tree: &Value) -> FormatResult<String> {
    let mut out = String::new();
    for (name, models) in as_object(tree, "")? {
        for (model, types) in as_object(models, name)? {
            let model_path = format!("{name}.{model}");
            for (field_type, block) in as_object(types, &model_path)? {
                let path = format!("{model_path}.{field_type}");
                let methods = match block {
                    Value::Null => Vec::new(),
                    block => match as_object(block, &path)?.get("methods") {
                        None | Some(Value::Null) => Vec::new(),
                        Some(Value::Array(methods)) => methods.clone(),
                        Some(other) => {
                            return Err(unrepresentable(
                                &format!("{path}.methods"),
                                format!("expected a sequence, found {}", kind_name(other)),
                            ))
                        }
                    },
                };

                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&format!("\"{field_type}\", \"{model}\", \"{name}\"\n"));
                if methods.is_empty() {
                    out.push_str(" /\n");
                    continue;
                }
                let last = methods.len() - 1;
                for (i, method) in methods.iter().enumerate() {
                    out.push_str(&render_method(method, &format!("{path}.methods[{i}]"))?);
                    out.push_str(if i == last { "\n/\n" } else { "\n" });
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
"prog_tracers","ocean_mod","temp"
horizontal-advection-scheme = mdppm
vertical-advection-scheme = mdppm
restart_file  = ocean_temp_salt.res.nc
ppm_hlimiter = 3
ppm_vlimiter = 3
/
# added by FRE: sphum must be present in atmos
# specific humidity for moist runs
 "TRACER", "atmos_mod", "sphum"
           "longname",     "specific humidity"
           "units",        "kg/kg"
       "profile_type", "fixed", "surface_value=3.e-6" /

"rayleigh_damp_table","ocean_mod","rayleigh_damp_table"
"rayleigh","Lombok","itable=36,jtable=112,ktable_1=1,ktable_2=50,rayleigh_damp_table=5400"
"rayleigh","Ombai","itable=44,jtable=111,ktable_1=1,ktable_2=50,rayleigh_damp_table=5400"/
"#;

    #[test]
    fn parses_all_line_forms() {
        let tree = parse_field_table(SAMPLE).unwrap();
        let temp = &tree["temp"]["ocean_mod"]["prog_tracers"]["methods"];
        assert_eq!(temp.as_array().unwrap().len(), 5);
        assert_eq!(temp[0], json!({"key": "horizontal-advection-scheme", "value": "mdppm"}));
        assert_eq!(temp[2], json!({"key": "restart_file", "value": "ocean_temp_salt.res.nc"}));

        let sphum = &tree["sphum"]["atmos_mod"]["TRACER"]["methods"];
        assert_eq!(sphum[1], json!({"key": "units", "value": "kg/kg"}));
        assert_eq!(
            sphum[2],
            json!({"key": "profile_type", "value": "fixed", "params": {"surface_value": "3.e-6"}})
        );

        let rayleigh = &tree["rayleigh_damp_table"]["ocean_mod"]["rayleigh_damp_table"]["methods"];
        assert_eq!(rayleigh[1]["value"], "Ombai");
        assert_eq!(rayleigh[1]["params"]["jtable"], "111");
    }

    #[test]
    fn header_only_entry() {
        let tree = parse_field_table("\"tracer\", \"mod\", \"age\" /\n").unwrap();
        assert_eq!(tree, json!({"age": {"mod": {"tracer": {"methods": []}}}}));
    }

    #[test]
    fn write_is_canonical_and_rereadable() {
        let tree = parse_field_table(SAMPLE).unwrap();
        let text = write_field_table(&tree).unwrap();

        assert!(text.starts_with(
            "\"prog_tracers\", \"ocean_mod\", \"temp\"\n\"horizontal-advection-scheme\", \"mdppm\"\n"
        ));
        assert!(text.contains(
            "\"rayleigh\", \"Lombok\", \"itable=36, jtable=112, ktable_1=1, ktable_2=50, rayleigh_damp_table=5400\"\n"
        ));
        assert!(text.contains("\"profile_type\", \"fixed\", \"surface_value=3.e-6\"\n/\n"));
        assert_eq!(parse_field_table(&text).unwrap(), tree);
    }

    #[test]
    fn empty_entry_written_with_inline_terminator() {
        let text = write_field_table(&json!({"age": {"mod": {"tracer": {"methods": []}}}})).unwrap();
        assert_eq!(text, "\"tracer\", \"mod\", \"age\"\n /\n");
    }

    #[test]
    fn params_sorted_on_write() {
        let tree = json!({"f": {"m": {"t": {"methods": [
            {"key": "k", "value": "v", "params": {"zeta": "1", "alpha": 2}}
        ]}}}});
        assert_eq!(
            write_field_table(&tree).unwrap(),
            "\"t\", \"m\", \"f\"\n\"k\", \"v\", \"alpha=2, zeta=1\"\n/\n"
        );
    }

    #[test]
    fn missing_terminator_is_error() {
        let err = parse_field_table("\"a\",\"b\",\"c\"\n\"k\",\"v\"\n").unwrap_err();
        assert!(err.to_string().contains("line 1"), "{err}");
        assert!(err.to_string().contains("terminator"));
    }

    #[test]
    fn bad_header_and_bad_params_are_errors() {
        assert!(parse_field_table("\"only\", \"two\"\n/\n").is_err());
        assert!(parse_field_table("\"a\",\"b\",\"c\"\n\"k\",\"v\",\"no_equals\"\n/\n").is_err());
    }

    #[test]
    fn method_without_key_cannot_be_written() {
        let tree = json!({"f": {"m": {"t": {"methods": [{"value": "v"}]}}}});
        let err = write_field_table(&tree).unwrap_err();
        assert!(err.to_string().contains("f.m.t.methods[0].key"), "{err}");
    }
}
