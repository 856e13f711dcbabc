//! Repository lookup

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::info;

use crate::errors::PipelineError;
use crate::filesys::file::File;
use crate::models::repository::Repository;

/// Read-only lookup of repositories by id
#[async_trait]
pub trait RepositoryDirectory: Send + Sync {
    async fn get(&self, repository_id: &str) -> Result<Option<Repository>, PipelineError>;
}

/// Repository directory backed by a fixed set of repositories
#[derive(Default)]
pub struct StaticDirectory {
    repositories: HashMap<String, Repository>,
}

impl StaticDirectory {
    pub fn new(repositories: impl IntoIterator<Item = Repository>) -> Self {
        Self {
            repositories: repositories
                .into_iter()
                .map(|repo| (repo.id.clone(), repo))
                .collect(),
        }
    }

    /// Load repositories from a JSON array; a missing file yields an empty directory
    pub async fn load(file: &File) -> Result<Self, PipelineError> {
        if !file.exists().await {
            info!(
                "No repository file at {}, starting with an empty directory",
                file.path().display()
            );
            return Ok(Self::default());
        }

        let repositories: Vec<Repository> = file.read_json().await?;
        info!(
            "Loaded {} repositories from {}",
            repositories.len(),
            file.path().display()
        );
        Ok(Self::new(repositories))
    }
}

#[async_trait]
impl RepositoryDirectory for StaticDirectory {
    async fn get(&self, repository_id: &str) -> Result<Option<Repository>, PipelineError> {
        Ok(self.repositories.get(repository_id).cloned())
    }
}
