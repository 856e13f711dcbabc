//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::PipelineError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), PipelineError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Copy the contents of `source` into this directory, replacing it
    pub async fn replace_with_copy_of(&self, source: &Path) -> Result<u64, PipelineError> {
        self.delete().await?;
        self.create().await?;

        let source = source.to_path_buf();
        let destination = self.path.clone();
        tokio::task::spawn_blocking(move || copy_tree(&source, &destination))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?
    }
}

fn copy_tree(source: &Path, destination: &Path) -> Result<u64, PipelineError> {
    let mut copied = 0;

    for entry in walkdir::WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| PipelineError::IoError(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}
