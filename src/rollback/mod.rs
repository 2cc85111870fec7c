// ABOUTME: Rollback Engine over the deploy repository's commit history.
// ABOUTME: Lists, resolves and executes rollbacks as a hard reset plus force push.

mod selection;

pub use selection::{Choice, parse_selection};

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::git::{
    DeployRepository, GitError, GitErrorKind, LogEntry, PRIMARY_REMOTE, PushMode, remote_name,
};
use crate::release::{
    self, DeploymentResult, Operation, ReleaseError, lock_repository, push_all, record_pushes,
};
use crate::types::CommitHash;

/// Shown before any rollback that was not forced.
pub const CONFIRMATION_WARNING: &str = "This hard-resets the local deploy repository and \
force-pushes it. The remote hook will re-run the full install (checkout, environment, \
dependencies, restart) against the older tree.";

/// Default number of commits listed or offered for selection.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("deploy repository {0} has no releases to roll back to")]
    NoHistory(PathBuf),

    #[error("'{0}' does not resolve to a commit in the deploy repository")]
    UnknownTarget(String),

    #[error("cannot go back {steps} release(s): only {available} older release(s) exist")]
    TooManySteps { steps: usize, available: usize },

    #[error("rollback --steps must be at least 1")]
    ZeroSteps,

    #[error("selection {0} is not one of the listed releases")]
    InvalidSelection(String),

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// What to roll back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackTarget {
    /// A commit hash, tag or any other revision.
    Ref(String),
    /// N commits before HEAD.
    Steps(usize),
    /// 1-based index into `candidates()`.
    Selection(usize),
}

/// A resolved, not yet executed rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackPlan {
    pub current: CommitHash,
    pub target: CommitHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The target is HEAD; nothing to do.
    AlreadyAtTarget(CommitHash),
    Ready(RollbackPlan),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackOptions {
    /// Force-push to every target instead of only the primary.
    pub all_servers: bool,
}

/// Open the deploy repository, requiring at least one release commit.
pub async fn open_history(service: &ServiceConfig) -> Result<DeployRepository, RollbackError> {
    let repo = release::open_repository(service)?;
    if repo.commit_count().await? == 0 {
        return Err(RollbackError::NoHistory(repo.path().to_path_buf()));
    }
    Ok(repo)
}

/// The newest `limit` releases, HEAD first. Read-only.
pub async fn list_history(
    repo: &DeployRepository,
    limit: usize,
) -> Result<Vec<LogEntry>, RollbackError> {
    Ok(repo.log(limit).await?)
}

/// The newest `limit` releases older than HEAD, offered for interactive selection.
pub async fn candidates(
    repo: &DeployRepository,
    limit: usize,
) -> Result<Vec<LogEntry>, RollbackError> {
    let mut history = repo.log(limit + 1).await?;
    if !history.is_empty() {
        history.remove(0);
    }
    Ok(history)
}

/// Resolve `target` to a commit of the deploy repository.
pub async fn resolve_target(
    repo: &DeployRepository,
    target: &RollbackTarget,
) -> Result<CommitHash, RollbackError> {
    match target {
        RollbackTarget::Ref(rev) => repo.resolve(rev).await.map_err(|e| match e.kind() {
            GitErrorKind::UnknownRevision => RollbackError::UnknownTarget(rev.clone()),
            _ => e.into(),
        }),
        RollbackTarget::Steps(0) => Err(RollbackError::ZeroSteps),
        RollbackTarget::Steps(steps) => {
            let available = repo.commit_count().await?.saturating_sub(1);
            if *steps > available {
                return Err(RollbackError::TooManySteps {
                    steps: *steps,
                    available,
                });
            }
            Ok(repo.resolve(&format!("HEAD~{}", steps)).await?)
        }
        RollbackTarget::Selection(index) => {
            let listed = candidates(repo, *index).await?;
            index
                .checked_sub(1)
                .and_then(|i| listed.into_iter().nth(i))
                .map(|entry| entry.hash)
                .ok_or_else(|| RollbackError::InvalidSelection(index.to_string()))
        }
    }
}

/// Resolve `target` and compare it with HEAD.
pub async fn plan(
    repo: &DeployRepository,
    target: &RollbackTarget,
) -> Result<PlanOutcome, RollbackError> {
    let target = resolve_target(repo, target).await?;
    let current = repo
        .head()
        .await?
        .ok_or_else(|| RollbackError::NoHistory(repo.path().to_path_buf()))?;
    if target == current {
        return Ok(PlanOutcome::AlreadyAtTarget(current));
    }
    Ok(PlanOutcome::Ready(RollbackPlan { current, target }))
}

/// Reset to the planned commit and force-push it.
pub async fn execute(
    service: &ServiceConfig,
    repo: &DeployRepository,
    plan: &RollbackPlan,
    options: RollbackOptions,
    diagnostics: &mut Diagnostics,
) -> Result<DeploymentResult, RollbackError> {
    let started = Instant::now();
    let _lock = lock_repository(repo, &format!("rollback {}", service.name))?;

    tracing::info!(
        "rolling {} back from {} to {}",
        service.name,
        plan.current.short(),
        plan.target.short()
    );
    repo.reset_hard(&plan.target).await?;

    let mut result = DeploymentResult::new(service.name.clone(), Operation::Rollback);
    result.commit_hash = Some(plan.target.clone());

    let outcomes = if options.all_servers {
        push_all(repo, service, true).await
    } else {
        let primary = service.primary();
        tracing::info!("force-pushing to {} ({})", primary.label, PRIMARY_REMOTE);
        let outcome = repo
            .push(PRIMARY_REMOTE, &service.branch, &PushMode::Force)
            .await;
        if outcome.is_ok() {
            // The primary is also deploy-0; keep its tracking ref truthful.
            repo.set_tracking_head(&remote_name(0), &service.branch, &plan.target)
                .await?;
            if service.servers.len() > 1 {
                diagnostics.warn(Warning::targets_diverged(format!(
                    "only {} was rolled back; other targets still run {} until the next \
release or a rollback with --all-servers",
                    primary.label,
                    plan.current.short()
                )));
            }
        }
        vec![(primary.label.clone(), outcome)]
    };
    record_pushes(&mut result, outcomes, diagnostics);

    result.duration_seconds = started.elapsed().as_secs_f64();
    release::notify(service, &result, diagnostics).await;
    Ok(result)
}
