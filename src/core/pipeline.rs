use crate::core::export;
use crate::core::reader::read_fit;
use crate::core::{ActivityOutput, ConfigProvider, Pipeline, SourceFile, Storage, TransformResult};
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Reads FIT files, builds activity frames and writes them as CSV/JSON.
pub struct FitPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> FitPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    fn wants(&self, format: &str) -> bool {
        self.config
            .output_formats()
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format))
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }
}

/// Output stem for an input path, suffixed when two inputs share a stem.
fn unique_stem(path: &str, used: &mut HashSet<String>) -> String {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("activity")
        .to_string();

    let mut candidate = stem.clone();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}_{}", stem, n);
        n += 1;
    }
    candidate
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for FitPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<SourceFile>> {
        let inputs = self.config.input_files();
        if inputs.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "input".to_string(),
            });
        }

        let mut used = HashSet::new();
        let mut files = Vec::with_capacity(inputs.len());
        for path in inputs {
            tracing::debug!("Reading {}", path);
            let bytes = self.storage.read_file(path).await?;
            tracing::debug!("Read {} bytes from {}", bytes.len(), path);
            files.push(SourceFile {
                name: unique_stem(path, &mut used),
                bytes,
            });
        }
        Ok(files)
    }

    async fn transform(&self, data: Vec<SourceFile>) -> Result<TransformResult> {
        let options = self.config.read_options();
        let mut activities = Vec::with_capacity(data.len());

        for file in data {
            let frame = read_fit(&file.bytes, &options).inspect_err(|e| {
                tracing::error!("Failed to decode {}: {}", file.name, e);
            })?;

            if frame.is_empty() {
                tracing::warn!("{} contains no records", file.name);
            } else {
                tracing::info!(
                    "{}: {} rows, {} columns, {} laps, device {}",
                    file.name,
                    frame.len(),
                    frame.columns.len(),
                    frame.attrs.laps.len(),
                    frame.attrs.device.as_deref().unwrap_or("unknown")
                );
            }

            let csv_output = if self.wants("csv") {
                Some(export::to_csv(&frame)?)
            } else {
                None
            };
            let json_output = if self.wants("json") {
                Some(export::to_json(&frame)?)
            } else {
                None
            };

            activities.push(ActivityOutput {
                name: file.name,
                frame,
                csv_output,
                json_output,
            });
        }

        Ok(TransformResult { activities })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let mut files: Vec<(String, String)> = Vec::new();
        for activity in result.activities {
            if let Some(csv) = activity.csv_output {
                files.push((format!("{}.csv", activity.name), csv));
            }
            if let Some(json) = activity.json_output {
                files.push((format!("{}.json", activity.name), json));
            }
        }

        if let Some(archive) = self.config.archive_name() {
            tracing::debug!("Creating ZIP file with {} files", files.len());

            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, content) in &files {
                    zip.start_file(name.as_str(), SimpleFileOptions::default())?;
                    zip.write_all(content.as_bytes())?;
                }
                zip.finish()?.into_inner()
            };

            let output_path = self.output_file(archive);
            tracing::debug!("Writing ZIP file ({} bytes) to {}", zip_data.len(), output_path);
            self.storage.write_file(&output_path, &zip_data).await?;
            return Ok(output_path);
        }

        for (name, content) in &files {
            let path = self.output_file(name);
            tracing::debug!("Writing {} ({} bytes)", path, content.len());
            self.storage.write_file(&path, content.as_bytes()).await?;
        }
        Ok(self.config.output_path().to_string())
    }
}
