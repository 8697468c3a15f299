use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting conversion");
        self.monitor.log_stats("Start");

        tracing::info!("Extracting input files...");
        let files = self.pipeline.extract().await?;
        tracing::info!("Extracted {} files", files.len());
        self.monitor.log_stats("Extract");

        tracing::info!("Decoding activities...");
        let result = self.pipeline.transform(files).await?;
        tracing::info!(
            "Decoded {} activities ({} rows)",
            result.activities.len(),
            result.total_rows()
        );
        self.monitor.log_stats("Transform");

        tracing::info!("Writing outputs...");
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SourceFile, TransformResult};
    use crate::utils::error::EtlError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingPipeline {
        calls: AtomicUsize,
        fail_transform: bool,
    }

    #[async_trait::async_trait]
    impl Pipeline for RecordingPipeline {
        async fn extract(&self) -> Result<Vec<SourceFile>> {
            assert_eq!(self.calls.fetch_add(1, Ordering::SeqCst), 0);
            Ok(vec![SourceFile {
                name: "a".to_string(),
                bytes: vec![],
            }])
        }

        async fn transform(&self, data: Vec<SourceFile>) -> Result<TransformResult> {
            assert_eq!(self.calls.fetch_add(1, Ordering::SeqCst), 1);
            assert_eq!(data.len(), 1);
            if self.fail_transform {
                return Err(EtlError::ProcessingError {
                    message: "boom".to_string(),
                });
            }
            Ok(TransformResult::default())
        }

        async fn load(&self, _result: TransformResult) -> Result<String> {
            assert_eq!(self.calls.fetch_add(1, Ordering::SeqCst), 2);
            Ok("out".to_string())
        }
    }

    #[tokio::test]
    async fn test_runs_phases_in_order() {
        let engine = EtlEngine::new(RecordingPipeline::default());
        assert_eq!(engine.run().await.unwrap(), "out");
        assert_eq!(engine.pipeline.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_after_failed_phase() {
        let engine = EtlEngine::new(RecordingPipeline {
            fail_transform: true,
            ..Default::default()
        });
        assert!(engine.run().await.is_err());
        assert_eq!(engine.pipeline.calls.load(Ordering::SeqCst), 2);
    }
}
