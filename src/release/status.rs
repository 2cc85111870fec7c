// ABOUTME: Read-only snapshot of a service's deploy repository for the status command.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::ServiceConfig;
use crate::git::{DeployRepository, GitError, LogEntry};

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStatus {
    pub path: PathBuf,
    pub initialized: bool,
    pub head: Option<LogEntry>,
    pub releases: usize,
    pub remotes: Vec<(String, String)>,
    /// Working-tree entries not yet released.
    pub unreleased: Vec<String>,
}

/// Inspect the deploy repository without changing it.
pub async fn inspect(service: &ServiceConfig) -> Result<RepositoryStatus, GitError> {
    let repo = DeployRepository::new(&service.deploy_repo_path);
    if !repo.exists() {
        return Ok(RepositoryStatus {
            path: service.deploy_repo_path.clone(),
            initialized: false,
            head: None,
            releases: 0,
            remotes: Vec::new(),
            unreleased: Vec::new(),
        });
    }

    Ok(RepositoryStatus {
        path: service.deploy_repo_path.clone(),
        initialized: true,
        head: repo.log(1).await?.into_iter().next(),
        releases: repo.commit_count().await?,
        remotes: repo.remotes().await?.into_iter().collect(),
        unreleased: repo.pending_changes().await?,
    })
}
