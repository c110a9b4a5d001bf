//! Mapping from repository-relative file paths to their adapters.

use std::fmt;
use std::path::Path;

use crate::field_table::FieldTableFormat;
use crate::json::JsonFormat;
use crate::namelist::NamelistFormat;
use crate::traits::ConfigFormat;
use crate::yaml::YamlFormat;

/// The kind of configuration file, decided from its path alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Fortran namelist: names ending `_in`, or with a `.nml` suffix.
    Namelist,
    /// The payu `config.yaml` of an experiment.
    PayuConfig,
    /// MOM `field_table`.
    FieldTable,
    /// ACCESS-OM2 `forcing.json`.
    Forcing,
    /// Any other YAML file.
    Yaml,
    /// Any other JSON file.
    Json,
}

impl FileKind {
    /// Classify `path`. Returns `None` for files no adapter handles.
    pub fn detect(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?;
        let ext = path.extension().and_then(|e| e.to_str());

        if name.ends_with("_in") || ext == Some("nml") {
            return Some(Self::Namelist);
        }
        match name {
            "config.yaml" => return Some(Self::PayuConfig),
            "field_table" => return Some(Self::FieldTable),
            "forcing.json" => return Some(Self::Forcing),
            _ => {}
        }
        match ext {
            Some("yaml" | "yml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }

    /// The adapter that reads and writes this kind of file.
    pub fn format(self) -> &'static dyn ConfigFormat {
        match self {
            Self::Namelist => &NamelistFormat,
            Self::PayuConfig | Self::Yaml => &YamlFormat,
            Self::FieldTable => &FieldTableFormat,
            Self::Forcing | Self::Json => &JsonFormat,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Namelist => "namelist",
            Self::PayuConfig => "payu config",
            Self::FieldTable => "field table",
            Self::Forcing => "forcing",
            Self::Yaml => "yaml",
            Self::Json => "json",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_rules() {
        assert_eq!(FileKind::detect("ice/cice_in.nml"), Some(FileKind::Namelist));
        assert_eq!(FileKind::detect("atmosphere/input_atm.nml"), Some(FileKind::Namelist));
        assert_eq!(FileKind::detect("ice_in"), Some(FileKind::Namelist));
        assert_eq!(FileKind::detect("config.yaml"), Some(FileKind::PayuConfig));
        assert_eq!(FileKind::detect("ocean/field_table"), Some(FileKind::FieldTable));
        assert_eq!(FileKind::detect("atmosphere/forcing.json"), Some(FileKind::Forcing));
        assert_eq!(FileKind::detect("manifests/input.yaml"), Some(FileKind::Yaml));
        assert_eq!(FileKind::detect("diag.yml"), Some(FileKind::Yaml));
        assert_eq!(FileKind::detect("other.json"), Some(FileKind::Json));
        assert_eq!(FileKind::detect("MOM_input"), None);
        assert_eq!(FileKind::detect("nuopc.runconfig"), None);
        assert_eq!(FileKind::detect("README.md"), None);
    }

    #[test]
    fn formats_parse_their_own_kind() {
        let tree = FileKind::Namelist.format().parse("&g\n x = 1\n/\n").unwrap();
        assert_eq!(tree["g"]["x"], 1);
        assert_eq!(FileKind::PayuConfig.format().name(), "yaml");
        assert_eq!(FileKind::Forcing.format().name(), "json");
        assert_eq!(FileKind::FieldTable.format().name(), "field_table");
    }
}
