//! Deployment record persistence

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::deploy::fsm::DeploymentStatus;
use crate::errors::PipelineError;
use crate::models::deployment::DeploymentRecord;

pub use memory::MemoryStore;

/// Mutation applied to a record under the store's write lock
pub type Mutation =
    Box<dyn FnOnce(&mut DeploymentRecord) -> Result<(), PipelineError> + Send + 'static>;

/// Scope of a record listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Repository(String),
    Project(String),
}

/// Record listing filter; results are ordered newest first
#[derive(Debug, Clone)]
pub struct DeploymentQuery {
    pub scope: Scope,
    pub statuses: Vec<DeploymentStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl DeploymentQuery {
    pub fn all() -> Self {
        Self {
            scope: Scope::All,
            statuses: Vec::new(),
            created_after: None,
            created_before: None,
            limit: None,
        }
    }

    pub fn repository(repository_id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Repository(repository_id.into()),
            ..Self::all()
        }
    }

    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Project(project_id.into()),
            ..Self::all()
        }
    }

    pub fn with_status(mut self, status: DeploymentStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_statuses(mut self, statuses: &[DeploymentStatus]) -> Self {
        self.statuses.extend_from_slice(statuses);
        self
    }

    pub fn created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    pub fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &DeploymentRecord) -> bool {
        let in_scope = match &self.scope {
            Scope::All => true,
            Scope::Repository(id) => &record.repository_id == id,
            Scope::Project(id) => &record.project_id == id,
        };

        in_scope
            && (self.statuses.is_empty() || self.statuses.contains(&record.status))
            && self.created_after.is_none_or(|at| record.created_at >= at)
            && self.created_before.is_none_or(|at| record.created_at < at)
    }
}

/// Deployment record store
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Persist a new record; fails if the id already exists
    async fn insert(&self, record: DeploymentRecord) -> Result<(), PipelineError>;

    /// Fetch a record by id
    async fn get(&self, id: &str) -> Result<Option<DeploymentRecord>, PipelineError>;

    /// List records matching a query, newest first
    async fn list(&self, query: &DeploymentQuery) -> Result<Vec<DeploymentRecord>, PipelineError>;

    /// Apply a mutation atomically and return the updated record.
    ///
    /// When the mutation returns an error the stored record is left
    /// unchanged.
    async fn update(&self, id: &str, mutation: Mutation)
        -> Result<DeploymentRecord, PipelineError>;

    /// Number of attempts recorded for a repository and commit
    async fn count_attempts(
        &self,
        repository_id: &str,
        commit_hash: &str,
    ) -> Result<usize, PipelineError>;
}
