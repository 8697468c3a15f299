pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::domain::model::ReadOptions;
#[cfg(feature = "cli")]
use crate::utils::error::{EtlError, Result};
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "endureio")]
#[command(about = "Convert FIT activity files into per-sample CSV and JSON tables")]
pub struct CliConfig {
    /// FIT files to read, comma separated or repeated
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub input: Vec<String>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "csv")]
    pub formats: Vec<String>,

    /// Bundle all outputs into this zip archive instead of loose files
    #[arg(long)]
    pub zip: Option<String>,

    /// Keep the FIT profile's field names instead of the short aliases
    #[arg(long)]
    pub no_opinionated: bool,

    /// Drop columns that have no short alias
    #[arg(long)]
    pub only_opinionated: bool,

    /// Let an alias replace a native field of the same name
    #[arg(long)]
    pub allow_column_overwrites: bool,

    #[arg(long)]
    pub no_crc_check: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn input_files(&self) -> &[String] {
        &self.input
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions {
            opinionated: !self.no_opinionated,
            include_unopinionated: !self.only_opinionated,
            allow_column_overwrites: self.allow_column_overwrites,
            check_crc: !self.no_crc_check,
        }
    }

    fn archive_name(&self) -> Option<&str> {
        self.zip.as_deref()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "input".to_string(),
            });
        }
        for file in &self.input {
            validation::validate_path("input", file)?;
        }
        validation::validate_file_extensions("input", &self.input, &["fit"])?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_output_formats("formats", &self.formats)?;

        if let Some(zip) = &self.zip {
            validation::validate_non_empty_string("zip", zip)?;
        }
        if self.no_opinionated && self.only_opinionated {
            return Err(EtlError::ConfigError {
                message: "--no-opinionated and --only-opinionated cannot be combined".to_string(),
            });
        }
        Ok(())
    }
}
