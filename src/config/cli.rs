use crate::core::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Filesystem storage; relative paths resolve against `base_path`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(Path::new(path))
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.resolve(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_nested() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write_file("a/b/out.csv", b"x,y").await.unwrap();
        assert_eq!(storage.read_file("a/b/out.csv").await.unwrap(), b"x,y");
    }

    #[tokio::test]
    async fn test_absolute_paths_ignore_base() {
        let dir = TempDir::new().unwrap();
        let absolute = dir.path().join("abs.fit");
        std::fs::write(&absolute, b"data").unwrap();

        let storage = LocalStorage::new("/nonexistent-base");
        let data = storage.read_file(absolute.to_str().unwrap()).await.unwrap();
        assert_eq!(data, b"data");
    }
}
