//! Expansion of perturbation blocks into one definition per run.
//!
//! A block lists its run names under `<block>_dirs`; every other key is a
//! file path mapped to a parameter tree in which lists hold one value per
//! run:
//!
//! ```yaml
//! Parameter_block1:
//!   Parameter_block1_dirs: [visc_low, visc_high]
//!   ocean/input.nml:
//!     ocean_model_nml:
//!       dt_ocean: [900.0, 1200.0]   # one per run
//!       layout: [[16, 32], [12, 24]] # column per run: [16, 12] / [32, 24]
//!       verbose: .true.             # same for every run
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ExperimentError, ExperimentResult};

/// One perturbation run: the branch it lives on and the change tree for
/// each file it touches.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExperimentDefinition {
    pub block_name: String,
    pub run_name: String,
    /// `<block_name>/<run_name>`.
    pub branch_name: String,
    pub file_params: IndexMap<String, Value>,
}

/// Expand every block into its runs, in block order then run order.
///
/// A block without a `<block>_dirs` key is skipped with a warning.
pub fn collect_experiment_definitions(
    blocks: &IndexMap<String, Value>,
) -> ExperimentResult<Vec<ExperimentDefinition>> {
    let mut definitions = Vec::new();

    for (block_name, contents) in blocks {
        let Value::Object(contents) = contents else {
            return Err(ExperimentError::InvalidConfig(format!(
                "perturbation block {block_name:?} must be a mapping"
            )));
        };
        let dir_key = format!("{block_name}_dirs");
        let Some(run_names) = contents.get(&dir_key) else {
            warn!(block = %block_name, "no {dir_key} provided; skipping block");
            continue;
        };
        let run_names = run_names_of(block_name, run_names)?;

        for (index, run_name) in run_names.into_iter().enumerate() {
            let mut file_params = IndexMap::new();
            for (file, params) in contents.iter().filter(|(k, _)| **k != dir_key) {
                let path = format!("{block_name}.{file}");
                file_params.insert(file.clone(), extract_at(params, index, &path)?);
            }
            definitions.push(ExperimentDefinition {
                block_name: block_name.clone(),
                branch_name: format!("{block_name}/{run_name}"),
                run_name,
                file_params,
            });
        }
    }

    Ok(definitions)
}

fn run_names_of(block_name: &str, value: &Value) -> ExperimentResult<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(ExperimentError::InvalidConfig(format!(
            "{block_name}_dirs must be a list of run names"
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(ExperimentError::InvalidConfig(format!(
                "{block_name}_dirs: run name {other} is not a string"
            ))),
        })
        .collect()
}

/// Values of `tree` for run `index`.
///
/// Mappings recurse. A list of lists yields column `index` of every row; any
/// other list yields its element `index`. A one-element list or row applies
/// to every run, and scalars are kept as they are.
pub fn extract_run_specific_params(tree: &Value, index: usize) -> ExperimentResult<Value> {
    extract_at(tree, index, "")
}

fn extract_at(tree: &Value, index: usize, path: &str) -> ExperimentResult<Value> {
    match tree {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                out.insert(key.clone(), extract_at(value, index, &child)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(rows) if !rows.is_empty() && rows.iter().all(Value::is_array) => {
            let mut column = Vec::with_capacity(rows.len());
            for (r, row) in rows.iter().enumerate() {
                if let Value::Array(row) = row {
                    column.push(pick(row, index, &format!("{path}[{r}]"))?);
                }
            }
            Ok(Value::Array(column))
        }
        Value::Array(items) => pick(items, index, path),
        scalar => Ok(scalar.clone()),
    }
}

fn pick(items: &[Value], index: usize, path: &str) -> ExperimentResult<Value> {
    match items {
        [only] => Ok(only.clone()),
        _ => items
            .get(index)
            .cloned()
            .ok_or_else(|| ExperimentError::RunIndexOutOfRange {
                path: path.to_string(),
                index,
                len: items.len(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blocks(v: Value) -> IndexMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn plain_list_picks_element() {
        let tree = json!({"g": {"dt": [900, 1200, 1800], "name": "x"}});
        assert_eq!(extract_run_specific_params(&tree, 1).unwrap(), json!({"g": {"dt": 1200, "name": "x"}}));
    }

    #[test]
    fn list_of_lists_picks_column() {
        let tree = json!({"layout": [["a0", "a1"], ["b0", "b1"]]});
        assert_eq!(extract_run_specific_params(&tree, 0).unwrap(), json!({"layout": ["a0", "b0"]}));
        assert_eq!(extract_run_specific_params(&tree, 1).unwrap(), json!({"layout": ["a1", "b1"]}));
    }

    #[test]
    fn single_element_lists_broadcast() {
        let tree = json!({"a": ["REMOVE"], "b": [["x"], ["y0", "y1"]]});
        assert_eq!(extract_run_specific_params(&tree, 1).unwrap(), json!({"a": "REMOVE", "b": ["x", "y1"]}));
    }

    #[test]
    fn short_list_is_an_error() {
        let tree = json!({"g": {"dt": [900, 1200]}});
        let err = extract_run_specific_params(&tree, 2).unwrap_err();
        match err {
            ExperimentError::RunIndexOutOfRange { path, index, len } => {
                assert_eq!(path, "g.dt");
                assert_eq!(index, 2);
                assert_eq!(len, 2);
            }
            other => panic!("expected RunIndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn collects_runs_per_block() {
        let defs = collect_experiment_definitions(&blocks(json!({
            "Parameter_block1": {
                "Parameter_block1_dirs": ["visc_low", "visc_high"],
                "ocean/input.nml": {"ocean_model_nml": {"dt_ocean": [900.0, 1200.0]}},
                "config.yaml": {"queue": "express"},
            },
            "Parameter_block2": {
                "Parameter_block2_dirs": ["only"],
                "ice/cice_in.nml": {"thermo_nml": {"ktherm": [2]}},
            },
        })))
        .unwrap();

        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].branch_name, "Parameter_block1/visc_low");
        assert_eq!(defs[1].run_name, "visc_high");
        assert_eq!(
            defs[1].file_params["ocean/input.nml"],
            json!({"ocean_model_nml": {"dt_ocean": 1200.0}})
        );
        assert_eq!(defs[1].file_params["config.yaml"], json!({"queue": "express"}));
        assert!(!defs[0].file_params.contains_key("Parameter_block1_dirs"));
        assert_eq!(defs[2].block_name, "Parameter_block2");
        assert_eq!(defs[2].file_params["ice/cice_in.nml"], json!({"thermo_nml": {"ktherm": 2}}));
    }

    #[test]
    fn block_without_dirs_is_skipped() {
        let defs = collect_experiment_definitions(&blocks(json!({
            "block": {"config.yaml": {"queue": "express"}},
        })))
        .unwrap();
        assert!(defs.is_empty());
    }

    #[test]
    fn error_path_names_block_and_file() {
        let err = collect_experiment_definitions(&blocks(json!({
            "b": {"b_dirs": ["r1", "r2", "r3"], "f.nml": {"g": {"x": [1, 2]}}},
        })))
        .unwrap_err();
        assert!(err.to_string().starts_with("b.f.nml.g.x:"), "{err}");
    }

    #[test]
    fn bad_dirs_value_is_rejected() {
        assert!(collect_experiment_definitions(&blocks(json!({"b": {"b_dirs": "r1"}}))).is_err());
        assert!(collect_experiment_definitions(&blocks(json!({"b": ["not", "a", "mapping"]}))).is_err());
    }
}
