//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::PipelineError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout of the service
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the repository directory file
    pub fn repositories_file(&self) -> File {
        File::new(self.base_dir.join("repositories.json"))
    }

    /// Get the deployment record snapshot
    pub fn deployments_file(&self) -> File {
        File::new(self.base_dir.join("deployments.json"))
    }

    /// Get the directory holding per-deployment working trees
    pub fn workspaces_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("workspaces"))
    }

    /// Get the working tree of one deployment
    pub fn workspace_dir(&self, deployment_id: &str) -> Dir {
        self.workspaces_dir().subdir(deployment_id)
    }

    /// Get the static host output directory
    pub fn sites_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("sites"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), PipelineError> {
        self.workspaces_dir().create().await?;
        self.sites_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // /var/lib/launchpad on Linux, home directory elsewhere
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/var/lib/launchpad");

        #[cfg(not(target_os = "linux"))]
        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".launchpad");

        Self::new(base_dir)
    }
}
