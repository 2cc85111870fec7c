// ABOUTME: Release Publisher: commits the staged tree and pushes it to every target.
// ABOUTME: Pushes fan out concurrently; per-target failures are aggregated, not fatal.

mod result;
mod status;

pub use result::{DeploymentResult, EXIT_POLICY, ExitPolicy, Operation, TargetFailure};
pub use status::{RepositoryStatus, inspect};

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::git::{DeployRepository, GitError, GitErrorKind, PushMode, remote_name};
use crate::hooks::{HookContext, HookError, HookPoint, HookRunner};
use crate::lock::{FileLock, LockError, REPOSITORY_LOCK};
use crate::notify::{CommandSink, notify_best_effort};
use crate::types::{BranchName, CommitHash, Label};

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("deploy repository {0} is not initialized")]
    NotInitialized(PathBuf),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("release aborted: {0}")]
    Hook(#[from] HookError),
}

#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub message: Option<String>,
    pub dry_run: bool,
    pub skip_push: bool,
}

/// What `--dry-run` reports: pending changes and where they would go.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasePreview {
    pub changes: Vec<String>,
    pub targets: Vec<Label>,
    pub branch: String,
}

#[derive(Debug)]
pub enum PublishOutcome {
    Published(DeploymentResult),
    DryRun(ReleasePreview),
}

/// Open the deploy repository of `service`, failing if it has never been staged.
pub fn open_repository(service: &ServiceConfig) -> Result<DeployRepository, ReleaseError> {
    let repo = DeployRepository::new(&service.deploy_repo_path)
        .with_connect_timeout(service.connect_timeout);
    if !repo.exists() {
        return Err(ReleaseError::NotInitialized(service.deploy_repo_path.clone()));
    }
    Ok(repo)
}

/// Take the repository lock for one release or rollback.
pub fn lock_repository(
    repo: &DeployRepository,
    operation: &str,
) -> Result<FileLock, ReleaseError> {
    Ok(FileLock::acquire(
        &repo.git_dir_path(REPOSITORY_LOCK),
        operation,
    )?)
}

/// Push HEAD to every target concurrently. Results keep configured order.
pub async fn push_all(
    repo: &DeployRepository,
    service: &ServiceConfig,
    force: bool,
) -> Vec<(Label, Result<(), GitError>)> {
    let targets: Vec<usize> = (0..service.servers.len()).collect();
    push_targets(repo, service, &targets, force).await
}

/// Push HEAD to the targets at `indices` concurrently, in configured order.
///
/// Without `force`, a target whose last known tip is not an ancestor of HEAD
/// (left ahead by a rollback of the primary alone) is overwritten under a lease
/// on that tip, so a push made by anyone else is still rejected.
pub async fn push_targets(
    repo: &DeployRepository,
    service: &ServiceConfig,
    indices: &[usize],
    force: bool,
) -> Vec<(Label, Result<(), GitError>)> {
    let head = repo.head().await.ok().flatten();
    let pushes = indices
        .iter()
        .filter_map(|&i| service.servers.get(i).map(|server| (i, server)))
        .map(|(i, server)| {
            let head = head.clone();
            async move {
                let remote = remote_name(i);
                let mode = if force {
                    PushMode::Force
                } else {
                    push_mode(repo, &remote, &service.branch, head.as_ref()).await
                };
                tracing::info!("pushing to {} ({})", server.label, remote);
                let outcome = repo.push(&remote, &service.branch, &mode).await;
                (server.label.clone(), outcome)
            }
        });
    join_all(pushes).await
}

async fn push_mode(
    repo: &DeployRepository,
    remote: &str,
    branch: &BranchName,
    head: Option<&CommitHash>,
) -> PushMode {
    let (Some(head), Ok(Some(tip))) = (head, repo.tracking_head(remote, branch).await) else {
        return PushMode::FastForward;
    };
    match repo.is_ancestor(&tip, head).await {
        Ok(false) => {
            tracing::info!(
                "{} is at {}, which HEAD does not contain; overwriting under lease",
                remote,
                tip.short()
            );
            PushMode::Lease(tip)
        }
        _ => PushMode::FastForward,
    }
}

/// Indices of targets whose last known tip is not `head`.
pub async fn lagging_targets(
    repo: &DeployRepository,
    service: &ServiceConfig,
    head: &CommitHash,
) -> Result<Vec<usize>, GitError> {
    let mut lagging = Vec::new();
    for i in 0..service.servers.len() {
        let tip = repo.tracking_head(&remote_name(i), &service.branch).await?;
        if tip.as_ref() != Some(head) {
            lagging.push(i);
        }
    }
    Ok(lagging)
}

/// Fold push outcomes into `result`, warning about each failed target.
pub fn record_pushes(
    result: &mut DeploymentResult,
    outcomes: Vec<(Label, Result<(), GitError>)>,
    diagnostics: &mut Diagnostics,
) {
    for (label, outcome) in outcomes {
        let outcome = outcome.map_err(|e| {
            let reason = match e.kind() {
                GitErrorKind::Unreachable => format!("unreachable: {}", e),
                GitErrorKind::Rejected => format!("rejected: {}", e),
                _ => e.to_string(),
            };
            diagnostics.warn(Warning::target_failed(format!(
                "push to {} failed: {}",
                label, reason
            )));
            reason
        });
        result.record(&label, outcome);
    }
}

/// Deliver the result to the configured notification command, if any.
pub async fn notify(
    service: &ServiceConfig,
    result: &DeploymentResult,
    diagnostics: &mut Diagnostics,
) {
    if let Some(command) = &service.notify_command {
        let sink = CommandSink::new(command, &service.source_dir);
        notify_best_effort(&sink, result, diagnostics).await;
    }
}

fn default_message() -> String {
    format!("Release {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))
}

/// Commit staged artifacts and push them to every target of `service`.
///
/// With nothing new to commit, HEAD is still pushed to any target that has not
/// received it, such as after `--skip-push` or a release where every push failed.
pub async fn publish(
    service: &ServiceConfig,
    options: &PublishOptions,
    diagnostics: &mut Diagnostics,
) -> Result<PublishOutcome, ReleaseError> {
    let started = Instant::now();
    let repo = open_repository(service)?;

    if options.dry_run {
        return Ok(PublishOutcome::DryRun(ReleasePreview {
            changes: repo.pending_changes().await?,
            targets: service.servers.iter().map(|s| s.label.clone()).collect(),
            branch: service.branch.to_string(),
        }));
    }

    let _lock = lock_repository(&repo, &format!("release {}", service.name))?;
    let mut result = DeploymentResult::new(service.name.clone(), Operation::Release);

    let mut context = HookContext {
        service: service.name.clone(),
        commit: repo.head().await?,
        deploy_dir: repo.path().to_path_buf(),
    };
    let hooks = HookRunner::new(repo.path());

    repo.add_all().await?;
    let committed = if repo.has_staged_changes().await? {
        if !service.hooks.pre_publish_local.is_empty() {
            hooks
                .run_all(
                    HookPoint::PrePublishLocal,
                    &service.hooks.pre_publish_local,
                    &context,
                )
                .await?;
            // Hooks may have written files into the payload.
            repo.add_all().await?;
        }

        let message = options.message.clone().unwrap_or_else(default_message);
        match repo.commit(&message).await {
            Ok(commit) => {
                tracing::info!("committed {} for {}", commit.short(), service.name);
                Some(commit)
            }
            Err(e) if e.kind() == GitErrorKind::NothingToCommit => None,
            Err(e) => return Err(e.into()),
        }
    } else {
        None
    };

    let (commit, targets) = match committed {
        Some(commit) => (commit, (0..service.servers.len()).collect::<Vec<_>>()),
        None => match undelivered_head(&repo, service, options).await? {
            Some(pending) => pending,
            None => {
                tracing::info!("no changes to release for {}", service.name);
                return Ok(PublishOutcome::Published(no_changes(result, &repo, started).await?));
            }
        },
    };
    result.commit_hash = Some(commit.clone());

    if options.skip_push {
        tracing::info!("skipping push for {}", service.name);
    } else {
        let outcomes = push_targets(&repo, service, &targets, false).await;
        record_pushes(&mut result, outcomes, diagnostics);

        if result.targets_succeeded > 0 && !service.hooks.post_publish_local.is_empty() {
            context.commit = Some(commit);
            run_optional_hooks(
                &hooks,
                HookPoint::PostPublishLocal,
                &service.hooks.post_publish_local,
                &context,
                diagnostics,
            )
            .await;
        }
    }

    result.duration_seconds = started.elapsed().as_secs_f64();
    notify(service, &result, diagnostics).await;
    Ok(PublishOutcome::Published(result))
}

/// HEAD and the targets it has not reached yet, after a skipped or failed push.
async fn undelivered_head(
    repo: &DeployRepository,
    service: &ServiceConfig,
    options: &PublishOptions,
) -> Result<Option<(CommitHash, Vec<usize>)>, ReleaseError> {
    if options.skip_push {
        return Ok(None);
    }
    let Some(head) = repo.head().await? else {
        return Ok(None);
    };
    let lagging = lagging_targets(repo, service, &head).await?;
    if lagging.is_empty() {
        return Ok(None);
    }
    tracing::info!(
        "nothing new to commit for {}; {} target(s) have not received {}",
        service.name,
        lagging.len(),
        head.short()
    );
    Ok(Some((head, lagging)))
}

async fn no_changes(
    mut result: DeploymentResult,
    repo: &DeployRepository,
    started: Instant,
) -> Result<DeploymentResult, ReleaseError> {
    result.no_changes = true;
    result.commit_hash = repo.head().await?;
    result.duration_seconds = started.elapsed().as_secs_f64();
    Ok(result)
}

/// Run hooks whose failures only warn.
pub async fn run_optional_hooks(
    hooks: &HookRunner,
    point: HookPoint,
    commands: &[String],
    context: &HookContext,
    diagnostics: &mut Diagnostics,
) {
    // Non-fatal points never return Err from run_all.
    if let Ok(results) = hooks.run_all(point, commands, context).await {
        for failed in results.into_iter().filter(|r| !r.success) {
            diagnostics.warn(Warning::hook_failed(failed.into_error(point).to_string()));
        }
    }
}
