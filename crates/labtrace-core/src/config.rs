//! Assembly configuration
//!
//! Read from TOML:
//!
//! ```toml
//! lab = "example_lab"
//! experiment_id = "yeast-gates-2019"
//! sample_type_fallback = true
//!
//! [check]
//! stop_list = ["12345"]
//!
//! [fixups]
//! pass_through_operations = ["Transfer to 96 Well Plate"]
//!
//! [fixups.measurement_operations."Plate Reader Measurement"]
//! measurement_type = "PLATE_READER"
//! ```

use labtrace_fixup::standard::StandardFixupConfig;
use labtrace_model::ItemId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors reading or validating a [`TraceConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but a value is unusable
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Post-assembly consistency check settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Run the check after freezing
    pub enabled: bool,
    /// Items (and parts of collections) exempt from findings
    pub stop_list: Vec<ItemId>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stop_list: Vec::new(),
        }
    }
}

/// Settings of one assembly pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Lab name recorded on every plan as `lab`
    pub lab: Option<String>,
    /// Experiment reference recorded on plans that carry none
    pub experiment_id: Option<String>,
    /// Link an output to the single input sharing its sample type when no
    /// routing is declared
    pub sample_type_fallback: bool,
    /// Derive collection parts from part-level routing data
    pub part_derivations: bool,
    /// Consistency check
    pub check: CheckConfig,
    /// Standard fix-up units
    pub fixups: StandardFixupConfig,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            lab: None,
            experiment_id: None,
            sample_type_fallback: true,
            part_derivations: true,
            check: CheckConfig::default(),
            fixups: StandardFixupConfig::default(),
        }
    }
}

impl TraceConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`TraceConfig::from_toml_str`]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check values serde cannot
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lab.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("lab", "must not be empty"));
        }
        if self.experiment_id.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("experiment_id", "must not be empty"));
        }
        if self.check.stop_list.iter().any(|id| id.as_str().is_empty()) {
            return Err(invalid("check.stop_list", "contains an empty item id"));
        }
        if self
            .fixups
            .pass_through_operations
            .iter()
            .any(String::is_empty)
        {
            return Err(invalid(
                "fixups.pass_through_operations",
                "contains an empty operation type",
            ));
        }
        if self
            .fixups
            .measurement_operations
            .keys()
            .any(String::is_empty)
        {
            return Err(invalid(
                "fixups.measurement_operations",
                "contains an empty operation type",
            ));
        }
        Ok(())
    }

    /// Builder: lab name
    #[must_use]
    pub fn with_lab(mut self, lab: impl Into<String>) -> Self {
        self.lab = Some(lab.into());
        self
    }

    /// Builder: experiment reference
    #[must_use]
    pub fn with_experiment_id(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = Some(experiment_id.into());
        self
    }

    /// Builder: sample-type fallback
    #[must_use]
    pub fn with_sample_type_fallback(mut self, enabled: bool) -> Self {
        self.sample_type_fallback = enabled;
        self
    }

    /// Builder: part-level derivations
    #[must_use]
    pub fn with_part_derivations(mut self, enabled: bool) -> Self {
        self.part_derivations = enabled;
        self
    }

    /// Builder: consistency check
    #[must_use]
    pub fn with_check(mut self, check: CheckConfig) -> Self {
        self.check = check;
        self
    }

    /// Builder: standard fix-up units
    #[must_use]
    pub fn with_fixups(mut self, fixups: StandardFixupConfig) -> Self {
        self.fixups = fixups;
        self
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const TOML: &str = r#"
lab = "example_lab"
experiment_id = "yeast-gates"
sample_type_fallback = false

[check]
stop_list = ["12345"]

[fixups]
pass_through_operations = ["Transfer to 96 Well Plate"]
file_source_pruning = false

[fixups.measurement_operations."Plate Reader Measurement"]
measurement_type = "PLATE_READER"
"#;

    #[test]
    fn parses_full_document() {
        let config = TraceConfig::from_toml_str(TOML).unwrap();
        assert_eq!(config.lab.as_deref(), Some("example_lab"));
        assert!(!config.sample_type_fallback);
        assert!(config.part_derivations);
        assert!(config.check.enabled);
        assert_eq!(config.check.stop_list, vec![ItemId::new("12345")]);
        assert!(!config.fixups.file_source_pruning);
        assert!(config.fixups.collection_source_inference);
        let attrs = &config.fixups.measurement_operations["Plate Reader Measurement"];
        assert_eq!(attrs.get("measurement_type").unwrap(), "PLATE_READER");
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(TraceConfig::from_toml_str("").unwrap(), TraceConfig::default());
    }

    #[test]
    fn rejects_empty_names() {
        let err = TraceConfig::from_toml_str("[fixups]\npass_through_operations = [\"\"]\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "fixups.pass_through_operations",
                ..
            }
        ));
        assert!(TraceConfig::new().with_lab("").validate().is_err());
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            TraceConfig::from_toml_str("sample_type_fallback = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOML.as_bytes()).unwrap();
        let config = TraceConfig::from_path(file.path()).unwrap();
        assert_eq!(config.experiment_id.as_deref(), Some("yeast-gates"));

        let missing = TraceConfig::from_path(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
