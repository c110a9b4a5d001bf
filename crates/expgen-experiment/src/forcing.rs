//! Validation of `forcing.json` change trees.
//!
//! Each top-level key of the change names the `fieldname` of one element of
//! the file's `inputs` list, and its value is merged into that element.

use serde_json::{Map, Value};

use crate::error::{ExperimentError, ExperimentResult};

const PERTURBATION_FIELDS: &[&str] = &["type", "dimension", "value", "calendar", "comment"];
const PERTURBATION_TYPES: &[&str] = &["scaling", "offset", "separable"];
const DIMENSIONS: &[&str] = &["spatial", "temporal", "constant", "spatiotemporal"];
const CALENDARS: &[&str] = &["forcing", "experiment"];

fn invalid(file: &str, message: String) -> ExperimentError {
    ExperimentError::InvalidChange {
        file: file.to_string(),
        message,
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Check a forcing change and normalise it: a single `perturbations`
/// mapping becomes a one-element list.
///
/// Returns `(fieldname, updates)` pairs in change order.
pub fn prepare_forcing_change(file: &str, change: &Value) -> ExperimentResult<Vec<(String, Value)>> {
    let Value::Object(fields) = change else {
        return Err(invalid(file, "forcing changes must be a mapping of fieldname to updates".into()));
    };

    let mut prepared = Vec::with_capacity(fields.len());
    for (fieldname, updates) in fields {
        let Value::Object(updates) = updates else {
            return Err(invalid(file, format!("the input {fieldname} must be a mapping")));
        };
        for required in ["filename", "cname"] {
            if is_blank(updates.get(required)) {
                return Err(invalid(
                    file,
                    format!("the input {fieldname} must have a non-empty '{required}' key"),
                ));
            }
        }

        let mut updates = updates.clone();
        if let Some(perturbations) = updates.get_mut("perturbations") {
            normalise_perturbations(file, fieldname, perturbations)?;
        }
        prepared.push((fieldname.clone(), Value::Object(updates)));
    }
    Ok(prepared)
}

fn normalise_perturbations(file: &str, fieldname: &str, perturbations: &mut Value) -> ExperimentResult<()> {
    if perturbations.is_object() {
        *perturbations = Value::Array(vec![perturbations.take()]);
    }
    let Value::Array(list) = perturbations else {
        return Err(invalid(
            file,
            format!("the input {fieldname} must have 'perturbations' as a mapping or a list of mappings"),
        ));
    };
    for perturbation in list.iter() {
        let Value::Object(perturbation) = perturbation else {
            return Err(invalid(file, format!("{fieldname}: each perturbation must be a mapping")));
        };
        validate_perturbation(perturbation).map_err(|message| invalid(file, format!("{fieldname}: {message}")))?;
    }
    Ok(())
}

fn validate_perturbation(pert: &Map<String, Value>) -> Result<(), String> {
    let missing: Vec<&str> = PERTURBATION_FIELDS
        .iter()
        .copied()
        .filter(|f| !pert.contains_key(*f))
        .collect();
    if !missing.is_empty() {
        return Err(format!("perturbation is missing required fields: {}", missing.join(", ")));
    }

    let one_of = |key: &str, allowed: &[&str]| match pert.get(key).and_then(Value::as_str) {
        Some(v) if allowed.contains(&v) => Ok(()),
        _ => Err(format!("invalid perturbation {key}: {}", pert[key])),
    };
    one_of("type", PERTURBATION_TYPES)?;
    one_of("calendar", CALENDARS)?;

    let dimension_ok = match &pert["dimension"] {
        Value::String(d) => DIMENSIONS.contains(&d.as_str()),
        Value::Array(dims) => {
            let dims: Vec<Option<&str>> = dims.iter().map(Value::as_str).collect();
            dims == [Some("spatial"), Some("temporal")] || dims == [Some("temporal"), Some("spatial")]
        }
        _ => false,
    };
    if !dimension_ok {
        return Err(format!("invalid perturbation dimension: {}", pert["dimension"]));
    }
    Ok(())
}
