pub mod etl;
pub mod export;
pub mod pipeline;
pub mod reader;
pub mod translate;

pub use crate::domain::model::{ActivityOutput, SourceFile, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
