//! Source checkout

use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::models::repository::Repository;

/// Materializes one commit of a repository into a working directory
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Check out `commit` of `branch` into `target`, which must not exist
    /// yet. Returns the captured log text.
    async fn fetch(
        &self,
        repository: &Repository,
        commit: &str,
        branch: &str,
        target: &Path,
    ) -> Result<String, PipelineError>;
}

fn pattern(source: &str) -> Result<Regex, PipelineError> {
    Regex::new(source).map_err(|e| PipelineError::Internal(format!("invalid validator: {e}")))
}

/// Clone URLs must be HTTPS with allowlisted characters
pub fn validate_repo_url(url: &str) -> Result<(), PipelineError> {
    if !pattern(r"^https://[A-Za-z0-9._~:/?#\[\]@!$&'()*+,;=%-]+$")?.is_match(url) {
        return Err(PipelineError::ValidationFailure(format!(
            "repository url must be HTTPS and match allowlisted characters: {url}"
        )));
    }
    Ok(())
}

pub fn validate_branch(branch: &str) -> Result<(), PipelineError> {
    if !pattern(r"^[A-Za-z0-9][A-Za-z0-9._/-]*$")?.is_match(branch) || branch.contains("..") {
        return Err(PipelineError::ValidationFailure(format!(
            "invalid branch name: {branch}"
        )));
    }
    Ok(())
}

pub fn validate_commit(commit: &str) -> Result<(), PipelineError> {
    if !pattern(r"^[0-9a-fA-F]{7,40}$")?.is_match(commit) {
        return Err(PipelineError::ValidationFailure(format!(
            "commit must be a 7 to 40 character hex hash: {commit}"
        )));
    }
    Ok(())
}

/// Fetches sources with the `git` command line
#[derive(Debug, Default)]
pub struct GitSource;

impl GitSource {
    async fn git(args: &[&str], cwd: Option<&Path>, log: &mut String) -> Result<(), PipelineError> {
        let mut command = Command::new("git");
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        debug!("Running git {}", args.join(" "));

        let output = command.output().await.map_err(|e| {
            PipelineError::ExecutionFailure(format!("failed to run git {}: {e}", args[0]))
        })?;

        log.push_str(&format!("$ git {}\n", args.join(" ")));
        log.push_str(&String::from_utf8_lossy(&output.stdout));
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::ExecutionFailure(format!(
                "git {} failed: {}",
                args[0],
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceFetcher for GitSource {
    async fn fetch(
        &self,
        repository: &Repository,
        commit: &str,
        branch: &str,
        target: &Path,
    ) -> Result<String, PipelineError> {
        validate_repo_url(&repository.clone_url)?;
        validate_branch(branch)?;
        validate_commit(commit)?;

        let target_str = target.to_str().ok_or_else(|| {
            PipelineError::Internal(format!("non UTF-8 workspace path: {}", target.display()))
        })?;

        info!(
            repository_id = %repository.id,
            "Cloning {} (branch: {}) into {}",
            repository.clone_url,
            branch,
            target_str
        );

        let mut log = String::new();
        Self::git(
            &[
                "clone",
                "--branch",
                branch,
                "--single-branch",
                &repository.clone_url,
                target_str,
            ],
            None,
            &mut log,
        )
        .await?;
        Self::git(&["checkout", "--detach", commit], Some(target), &mut log).await?;

        Ok(log)
    }
}
