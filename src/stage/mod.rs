// ABOUTME: Artifact Stager: copies configured build outputs into the deploy repository.
// ABOUTME: Lazily initializes the repository and reconciles its remotes on every run.

mod copy;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::git::{DeployRepository, GitError, PRIMARY_REMOTE, remote_name};
use crate::manifest::{ManifestError, ReleaseManifest};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("source directory {0} does not exist")]
    SourceMissing(PathBuf),

    #[error("no artifacts staged: none of [{patterns}] exist under {source_dir}")]
    NothingStaged {
        patterns: String,
        source_dir: PathBuf,
    },

    #[error("failed to expand artifact {pattern}: {source}")]
    Expand {
        pattern: String,
        source: std::io::Error,
    },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("artifact copy did not finish: {0}")]
    CopyTask(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// One artifact copy, source-relative path and both absolute ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCopy {
    pub relative: String,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Everything a stage run would do, computed without touching the filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct StagePlan {
    pub initialize: bool,
    pub deploy_repo: PathBuf,
    pub remotes: Vec<(String, String)>,
    pub copies: Vec<PlannedCopy>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub staged: Vec<String>,
    pub missing: Vec<String>,
    pub initialized: bool,
    pub dry_run: bool,
}

impl StageReport {
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "Would stage" } else { "Staged" };
        format!("{} {} artifact(s)", verb, self.staged.len())
    }
}

/// Remote names and URLs the deploy repository should carry.
pub fn desired_remotes(service: &ServiceConfig) -> Vec<(String, String)> {
    let mut remotes: Vec<(String, String)> = service
        .servers
        .iter()
        .enumerate()
        .map(|(i, server)| (remote_name(i), server.remote_url()))
        .collect();
    remotes.push((PRIMARY_REMOTE.to_string(), service.primary().remote_url()));
    remotes
}

/// Compute the stage plan. Read-only.
pub fn plan(service: &ServiceConfig) -> Result<StagePlan, StageError> {
    if !service.source_dir.is_dir() {
        return Err(StageError::SourceMissing(service.source_dir.clone()));
    }

    let repo = DeployRepository::new(&service.deploy_repo_path);
    let mut copies = Vec::new();
    let mut missing = Vec::new();

    for pattern in &service.artifacts {
        let matches = pattern
            .expand(&service.source_dir)
            .map_err(|source| StageError::Expand {
                pattern: pattern.to_string(),
                source,
            })?;

        let matches: Vec<_> = matches
            .into_iter()
            .filter(|rel| service.source_dir.join(rel) != service.deploy_repo_path)
            .collect();

        if matches.is_empty() {
            missing.push(pattern.to_string());
            continue;
        }

        for relative in matches {
            let from = service.source_dir.join(&relative);
            let to = service.deploy_repo_path.join(&relative);
            copies.push(PlannedCopy {
                relative: relative.to_string_lossy().into_owned(),
                from,
                to,
            });
        }
    }

    Ok(StagePlan {
        initialize: !repo.exists(),
        deploy_repo: service.deploy_repo_path.clone(),
        remotes: desired_remotes(service),
        copies,
        missing,
    })
}

/// Make sure the deploy repository exists with current remotes. Returns true if it was created.
pub async fn ensure_repository(
    service: &ServiceConfig,
    repo: &DeployRepository,
) -> Result<bool, StageError> {
    let initialized = if repo.exists() {
        false
    } else {
        repo.init(&service.branch).await?;
        true
    };
    repo.sync_remotes(&desired_remotes(service)).await?;
    Ok(initialized)
}

/// Stage every configured artifact into the deploy repository.
pub async fn stage(
    service: &ServiceConfig,
    dry_run: bool,
    diagnostics: &mut Diagnostics,
) -> Result<StageReport, StageError> {
    let plan = plan(service)?;

    for pattern in &plan.missing {
        diagnostics.warn(Warning::missing_artifact(format!(
            "artifact '{}' not found in {}",
            pattern,
            service.source_dir.display()
        )));
    }

    if plan.copies.is_empty() {
        return Err(StageError::NothingStaged {
            patterns: service
                .artifacts
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            source_dir: service.source_dir.clone(),
        });
    }

    let staged: Vec<String> = plan.copies.iter().map(|c| c.relative.clone()).collect();

    if dry_run {
        if plan.initialize {
            tracing::info!(
                "would initialize deploy repository at {}",
                plan.deploy_repo.display()
            );
        }
        for copy in &plan.copies {
            tracing::info!("would copy {} -> {}", copy.from.display(), copy.to.display());
        }
        return Ok(StageReport {
            staged,
            missing: plan.missing,
            initialized: false,
            dry_run: true,
        });
    }

    let repo = DeployRepository::new(&service.deploy_repo_path)
        .with_connect_timeout(service.connect_timeout);
    let initialized = ensure_repository(service, &repo).await?;

    let copies = plan.copies.clone();
    let exclude = service.deploy_repo_path.clone();
    // The tree walk is blocking filesystem work; keep it off the async workers.
    tokio::task::spawn_blocking(move || copy::copy_artifacts(&copies, &exclude)).await??;

    ReleaseManifest::from_service(service).write_to(&service.deploy_repo_path)?;

    Ok(StageReport {
        staged,
        missing: plan.missing,
        initialized,
        dry_run: false,
    })
}
