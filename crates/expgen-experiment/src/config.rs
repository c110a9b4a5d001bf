use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{ExperimentError, ExperimentResult};

/// Models the generator knows how to configure.
pub const VALID_MODELS: &[&str] = &["access-om2", "access-om3"];

/// Input file read when none is named on the command line.
pub const DEFAULT_INPUT_FILE: &str = "Experiment_manager.yaml";

/// Input keys older experiment managers accepted that this generator does
/// not act on. They parse, are kept in [`ExperimentConfig::ignored`], and log
/// a warning.
pub const UNSUPPORTED_KEYS: &[&str] = &[
    "keep_uuid",
    "restart_path",
    "parent_experiment",
    "config_path",
    "lab_path",
];

fn default_test_path() -> PathBuf {
    PathBuf::from("experiment_generator_test_path")
}

/// The experiment input file.
///
/// ```yaml
/// test_path: tests
/// model_type: access-om2
/// repository_url: https://github.com/ACCESS-NRI/1deg_jra55_ryf.git
/// repository_directory: 1deg_jra55_ryf
/// control_branch_name: ctrl
/// Control_Experiment:
///   config.yaml:
///     queue: express
/// Perturbation_Experiment:
///   Parameter_block1:
///     Parameter_block1_dirs: [run_a, run_b]
///     ocean/input.nml:
///       ocean_model_nml:
///         dt_ocean: [900.0, 1200.0]
/// ```
///
/// Run setup keys (`keep_uuid`, `restart_path`, `parent_experiment`,
/// `config_path`, `lab_path`) are not supported: restarts and payu
/// bookkeeping are left to the caller. Any key outside the fields below is
/// collected in `ignored` and reported with a warning on load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Directory holding the cloned repository and the remove-state files.
    #[serde(default = "default_test_path")]
    pub test_path: PathBuf,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    /// Name of the clone under `test_path`.
    pub repository_directory: String,
    /// Branch checked out when cloning.
    #[serde(default)]
    pub existing_branch: Option<String>,
    /// Branch the control experiment is committed on; perturbation branches
    /// start from it.
    #[serde(default)]
    pub control_branch_name: Option<String>,
    /// Commit the control branch is created from when it does not exist yet.
    #[serde(default)]
    pub start_point: Option<String>,
    /// File path (relative to the repository) to change tree.
    #[serde(rename = "Control_Experiment", default)]
    pub control_experiment: IndexMap<String, Value>,
    /// Block name to block contents.
    #[serde(rename = "Perturbation_Experiment", default)]
    pub perturbation_experiment: Option<IndexMap<String, Value>>,
    /// Keys this generator does not read.
    #[serde(flatten)]
    pub ignored: IndexMap<String, Value>,
}

impl ExperimentConfig {
    pub fn from_yaml_str(text: &str) -> ExperimentResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        for key in config.ignored.keys() {
            if UNSUPPORTED_KEYS.contains(&key.as_str()) {
                warn!(%key, "input key is not supported; ignoring");
            } else {
                warn!(%key, "unknown input key; ignoring");
            }
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ExperimentResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ExperimentError::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Where the repository is cloned.
    pub fn repository_path(&self) -> PathBuf {
        self.test_path.join(&self.repository_directory)
    }

    /// State target for the control experiment.
    pub fn control_target(&self) -> &str {
        self.control_branch_name.as_deref().unwrap_or("control")
    }

    /// Whether any perturbation blocks are configured.
    pub fn has_perturbations(&self) -> bool {
        self.perturbation_experiment
            .as_ref()
            .is_some_and(|blocks| !blocks.is_empty())
    }

    pub fn validate_model_type(&self) -> ExperimentResult<()> {
        match self.model_type.as_deref() {
            Some(model) if VALID_MODELS.contains(&model) => Ok(()),
            other => Err(ExperimentError::InvalidModel {
                model: other.unwrap_or("<unset>").to_string(),
                valid: VALID_MODELS,
            }),
        }
    }

    pub fn validate(&self) -> ExperimentResult<()> {
        self.validate_model_type()?;
        if self.repository_directory.trim().is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "repository_directory must not be empty".into(),
            ));
        }
        if self.control_experiment.is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "no control experiment data provided (Control_Experiment is missing or empty)".into(),
            ));
        }
        if self.has_perturbations() && self.control_branch_name.is_none() {
            return Err(ExperimentError::InvalidConfig(
                "control_branch_name is required when Perturbation_Experiment is set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const INPUT: &str = r#"
model_type: access-om2
repository_url: https://github.com/ACCESS-NRI/1deg_jra55_ryf.git
repository_directory: 1deg_jra55_ryf
control_branch_name: ctrl
Control_Experiment:
  config.yaml:
    queue: express
  ocean/input.nml:
    ocean_model_nml:
      dt_ocean: 900
Perturbation_Experiment:
  Parameter_block1:
    Parameter_block1_dirs: [a, b]
"#;

    #[test]
    fn parses_with_defaults() {
        let config = ExperimentConfig::from_yaml_str(INPUT).unwrap();
        assert_eq!(config.test_path, PathBuf::from("experiment_generator_test_path"));
        assert_eq!(config.model_type.as_deref(), Some("access-om2"));
        assert_eq!(
            config.repository_path(),
            PathBuf::from("experiment_generator_test_path/1deg_jra55_ryf")
        );
        assert_eq!(config.control_target(), "ctrl");
        assert_eq!(
            config.control_experiment.keys().collect::<Vec<_>>(),
            vec!["config.yaml", "ocean/input.nml"]
        );
        assert_eq!(config.control_experiment["config.yaml"], json!({"queue": "express"}));
        assert!(config.has_perturbations());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_model() {
        let config = ExperimentConfig::from_yaml_str(&INPUT.replace("access-om2", "access-cm3")).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidModel { ref model, .. } if model == "access-cm3"));
        assert!(err.to_string().contains("access-om3"));
    }

    #[test]
    fn rejects_missing_control_block() {
        let config = ExperimentConfig::from_yaml_str(
            "model_type: access-om3\nrepository_directory: r\n",
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ExperimentError::InvalidConfig(_))));
    }

    #[test]
    fn perturbations_need_control_branch() {
        let config = ExperimentConfig::from_yaml_str(&INPUT.replace("control_branch_name: ctrl\n", "")).unwrap();
        assert_eq!(config.control_target(), "control");
        assert!(matches!(config.validate(), Err(ExperimentError::InvalidConfig(_))));
    }

    #[test]
    fn unsupported_keys_are_collected_not_applied() {
        let text = format!(
            "{INPUT}keep_uuid: true\nrestart_path: /scratch/restart000\nparent_experiment: abc123\nlab_path: /scratch/lab\n"
        );
        let config = ExperimentConfig::from_yaml_str(&text).unwrap();
        let keys: Vec<&str> = config.ignored.keys().map(String::as_str).collect();
        assert_eq!(keys, ["keep_uuid", "restart_path", "parent_experiment", "lab_path"]);
        assert!(keys.iter().all(|k| UNSUPPORTED_KEYS.contains(k)));
        assert_eq!(config.ignored["keep_uuid"], json!(true));
        assert_eq!(config.repository_directory, "1deg_jra55_ryf");
        config.validate().unwrap();
    }

    #[test]
    fn known_keys_are_not_reported_as_ignored() {
        let config = ExperimentConfig::from_yaml_str(INPUT).unwrap();
        assert!(config.ignored.is_empty());
    }

    #[test]
    fn missing_repository_directory_is_a_parse_error() {
        assert!(ExperimentConfig::from_yaml_str("model_type: access-om2\n").is_err());
    }
}
