use crate::domain::model::{ReadOptions, SourceFile, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_files(&self) -> &[String];
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn read_options(&self) -> ReadOptions;
    /// Zip archive name when outputs are bundled.
    fn archive_name(&self) -> Option<&str>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<SourceFile>>;
    async fn transform(&self, data: Vec<SourceFile>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
