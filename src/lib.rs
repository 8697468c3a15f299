pub mod config;
pub mod core;
pub mod domain;
pub mod fit;
pub mod tasks;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};

pub use core::reader::{read_fit, read_fit_file};
pub use core::{etl::EtlEngine, pipeline::FitPipeline};
pub use domain::model::{ActivityFrame, Cell, ReadOptions};
pub use utils::error::{EtlError, Result};
