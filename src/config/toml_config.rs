use crate::core::ConfigProvider;
use crate::domain::model::ReadOptions;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub read: ReadOptions,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

fn default_output_formats() -> Vec<String> {
    vec!["csv".to_string()]
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration, expanding `${VAR}` from the environment first.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().is_some_and(|m| m.enabled)
    }
}

impl ConfigProvider for TomlConfig {
    fn input_files(&self) -> &[String] {
        &self.source.files
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn read_options(&self) -> ReadOptions {
        self.read
    }

    fn archive_name(&self) -> Option<&str> {
        self.load
            .compression
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| c.filename.as_str())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;

        if self.source.files.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "source.files".to_string(),
            });
        }
        for file in &self.source.files {
            validation::validate_path("source.files", file)?;
        }
        validation::validate_file_extensions("source.files", &self.source.files, &["fit"])?;

        validation::validate_path("load.output_path", &self.load.output_path)?;
        validation::validate_output_formats("load.output_formats", &self.load.output_formats)?;

        if let Some(compression) = self.load.compression.as_ref().filter(|c| c.enabled) {
            validation::validate_non_empty_string("load.compression.filename", &compression.filename)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[pipeline]
name = "weekly-runs"

[source]
files = ["runs/monday.fit", "runs/wednesday.fit"]

[read]
include_unopinionated = false

[load]
output_path = "./test-output"
output_formats = ["csv", "json"]

[load.compression]
enabled = true
filename = "runs.zip"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.pipeline.name, "weekly-runs");
        assert_eq!(config.input_files().len(), 2);
        assert!(config.read.opinionated);
        assert!(!config.read.include_unopinionated);
        assert_eq!(config.archive_name(), Some("runs.zip"));
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_when_sections_omitted() {
        let config = TomlConfig::from_toml_str(
            r#"
[pipeline]
name = "minimal"

[source]
files = ["a.fit"]

[load]
output_path = "out"
"#,
        )
        .unwrap();

        assert_eq!(config.read, ReadOptions::default());
        assert_eq!(config.output_formats(), &["csv".to_string()]);
        assert_eq!(config.archive_name(), None);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ENDUREIO_TEST_OUTPUT", "/tmp/endureio-out");

        let config = TomlConfig::from_toml_str(
            r#"
[pipeline]
name = "env"

[source]
files = ["a.fit"]

[load]
output_path = "${ENDUREIO_TEST_OUTPUT}"
"#,
        )
        .unwrap();
        assert_eq!(config.load.output_path, "/tmp/endureio-out");

        std::env::remove_var("ENDUREIO_TEST_OUTPUT");
    }

    #[test]
    fn test_config_validation() {
        let config = TomlConfig::from_toml_str(
            r#"
[pipeline]
name = "bad"

[source]
files = ["activity.gpx"]

[load]
output_path = "./output"
output_formats = ["csv"]
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str(
            r#"
[pipeline]
name = "bad"

[source]
files = ["activity.fit"]

[load]
output_path = "./output"
output_formats = ["xlsx"]
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            TomlConfig::from_toml_str("[pipeline"),
            Err(EtlError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "weekly-runs");
    }
}
