//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::errors::PipelineError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, PipelineError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, PipelineError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Write JSON to file, replacing it atomically
    pub async fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), PipelineError> {
        let contents = serde_json::to_vec_pretty(value)?;
        self.write_atomic(&contents).await
    }

    /// Atomic write using a temporary file in the same directory
    pub async fn write_atomic(&self, contents: &[u8]) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Delete the file
    pub async fn delete(&self) -> Result<(), PipelineError> {
        if self.exists().await {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}
