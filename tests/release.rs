// ABOUTME: End-to-end tests for the release publisher against local bare repositories.
// ABOUTME: Covers fan-out, partial failure, the exit policy, hooks, dry runs and locking.

mod support;

use pushdeploy::diagnostics::{Diagnostics, WarningKind};
use pushdeploy::git::DeployRepository;
use pushdeploy::lock::{FileLock, LockError, REPOSITORY_LOCK};
use pushdeploy::release::{
    self, DeploymentResult, EXIT_POLICY, Operation, PublishOptions, PublishOutcome, ReleaseError,
};
use pushdeploy::stage;
use support::{Workspace, WorkspaceOptions, bare_head, workspace, workspace_with};

async fn stage_and_publish(
    ws: &Workspace,
    options: &PublishOptions,
    diag: &mut Diagnostics,
) -> Result<PublishOutcome, ReleaseError> {
    stage::stage(&ws.service, false, diag).await.unwrap();
    release::publish(&ws.service, options, diag).await
}

fn published(outcome: PublishOutcome) -> DeploymentResult {
    match outcome {
        PublishOutcome::Published(result) => result,
        PublishOutcome::DryRun(_) => panic!("expected a published release"),
    }
}

fn message(text: &str) -> PublishOptions {
    PublishOptions {
        message: Some(text.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn pushes_release_to_every_target() {
    support::init_tracing();
    let ws = workspace(2);
    let mut diag = Diagnostics::default();

    let result = published(
        stage_and_publish(&ws, &message("first release"), &mut diag)
            .await
            .unwrap(),
    );

    assert_eq!(result.operation, Operation::Release);
    assert_eq!(result.targets_attempted, 2);
    assert_eq!(result.targets_succeeded, 2);
    assert!(result.targets_failed.is_empty());
    assert!(!diag.has_warnings());

    let commit = result.commit_hash.expect("release commit");
    assert_eq!(bare_head(&ws.remote(0), "master").as_deref(), Some(commit.as_str()));
    assert_eq!(bare_head(&ws.remote(1), "master").as_deref(), Some(commit.as_str()));

    let log = DeployRepository::new(&ws.service.deploy_repo_path)
        .log(5)
        .await
        .unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].subject, "first release");
}

#[tokio::test]
async fn default_message_names_the_release_time() {
    let ws = workspace(1);
    let mut diag = Diagnostics::default();

    stage_and_publish(&ws, &PublishOptions::default(), &mut diag)
        .await
        .unwrap();

    let log = DeployRepository::new(&ws.service.deploy_repo_path)
        .log(1)
        .await
        .unwrap();
    assert!(log[0].subject.starts_with("Release "));
    assert!(log[0].subject.ends_with(" UTC"));
}

#[tokio::test]
async fn unchanged_tree_is_not_committed_again() {
    let ws = workspace(1);
    let mut diag = Diagnostics::default();
    let first = published(
        stage_and_publish(&ws, &message("one"), &mut diag)
            .await
            .unwrap(),
    );

    let second = published(
        stage_and_publish(&ws, &message("two"), &mut diag)
            .await
            .unwrap(),
    );

    assert!(second.no_changes);
    assert_eq!(second.targets_attempted, 0);
    assert_eq!(second.commit_hash, first.commit_hash);
    assert_eq!(second.summary(), "No changes to release.");
    assert!(!EXIT_POLICY.is_failure(&second));
}

#[tokio::test]
async fn one_unreachable_target_is_a_warning() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 2,
        missing_remotes: vec![1],
        ..Default::default()
    });
    let mut diag = Diagnostics::default();

    let result = published(
        stage_and_publish(&ws, &message("partial"), &mut diag)
            .await
            .unwrap(),
    );

    assert_eq!(result.targets_attempted, 2);
    assert_eq!(result.targets_succeeded, 1);
    assert_eq!(result.targets_failed.len(), 1);
    assert_eq!(result.targets_failed[0].label.as_str(), "target-1");
    assert!(!EXIT_POLICY.is_failure(&result));

    let warnings: Vec<_> = diag.of_kind(WarningKind::TargetFailed).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("target-1"));
    assert!(bare_head(&ws.remote(0), "master").is_some());
}

#[tokio::test]
async fn every_target_failing_fails_the_release() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 2,
        missing_remotes: vec![0, 1],
        ..Default::default()
    });
    let mut diag = Diagnostics::default();

    let result = published(
        stage_and_publish(&ws, &message("doomed"), &mut diag)
            .await
            .unwrap(),
    );

    assert!(result.all_failed());
    assert!(EXIT_POLICY.is_failure(&result));
    assert_eq!(diag.of_kind(WarningKind::TargetFailed).count(), 2);
    // The commit is kept locally even though nothing received it.
    assert!(result.commit_hash.is_some());
}

#[tokio::test]
async fn skipped_push_is_delivered_by_the_next_release() {
    let ws = workspace(2);
    let mut diag = Diagnostics::default();
    let skipped = published(
        stage_and_publish(
            &ws,
            &PublishOptions {
                message: Some("held back".to_string()),
                skip_push: true,
                ..Default::default()
            },
            &mut diag,
        )
        .await
        .unwrap(),
    );
    let commit = skipped.commit_hash.expect("release commit");
    assert_eq!(skipped.targets_attempted, 0);
    assert!(bare_head(&ws.remote(0), "master").is_none());

    let result = published(
        stage_and_publish(&ws, &message("again"), &mut diag)
            .await
            .unwrap(),
    );

    assert!(!result.no_changes);
    assert_eq!(result.targets_attempted, 2);
    assert_eq!(result.targets_succeeded, 2);
    assert_eq!(result.commit_hash.as_ref(), Some(&commit));
    for index in 0..2 {
        assert_eq!(
            bare_head(&ws.remote(index), "master").as_deref(),
            Some(commit.as_str())
        );
    }
    let log = DeployRepository::new(&ws.service.deploy_repo_path)
        .log(5)
        .await
        .unwrap();
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn release_retries_targets_that_never_received_head() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 2,
        missing_remotes: vec![0, 1],
        ..Default::default()
    });
    let mut diag = Diagnostics::default();
    let failed = published(
        stage_and_publish(&ws, &message("unreachable"), &mut diag)
            .await
            .unwrap(),
    );
    assert!(failed.all_failed());
    let commit = failed.commit_hash.expect("release commit");

    support::bare_repo(&ws.remote(0));
    support::bare_repo(&ws.remote(1));
    let mut retry_diag = Diagnostics::default();
    let result = published(
        stage_and_publish(&ws, &message("retry"), &mut retry_diag)
            .await
            .unwrap(),
    );

    assert!(!result.no_changes);
    assert_eq!(result.targets_succeeded, 2);
    assert!(!EXIT_POLICY.is_failure(&result));
    assert!(!retry_diag.has_warnings());
    assert_eq!(
        bare_head(&ws.remote(1), "master").as_deref(),
        Some(commit.as_str())
    );
}

#[tokio::test]
async fn release_retries_only_the_target_that_missed_it() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 2,
        missing_remotes: vec![1],
        ..Default::default()
    });
    let mut diag = Diagnostics::default();
    let partial = published(
        stage_and_publish(&ws, &message("partial"), &mut diag)
            .await
            .unwrap(),
    );
    let commit = partial.commit_hash.expect("release commit");

    support::bare_repo(&ws.remote(1));
    let result = published(
        stage_and_publish(&ws, &message("catch up"), &mut diag)
            .await
            .unwrap(),
    );

    assert_eq!(result.targets_attempted, 1);
    assert_eq!(result.targets_succeeded, 1);
    assert_eq!(
        bare_head(&ws.remote(1), "master").as_deref(),
        Some(commit.as_str())
    );

    let settled = published(
        stage_and_publish(&ws, &message("settled"), &mut diag)
            .await
            .unwrap(),
    );
    assert!(settled.no_changes);
}

#[tokio::test]
async fn failing_pre_publish_hook_aborts_before_commit() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 1,
        extra: "    hooks:\n      pre_publish_local: [\"echo refusing >&2; exit 3\"]\n"
            .to_string(),
        ..Default::default()
    });
    let mut diag = Diagnostics::default();

    let err = stage_and_publish(&ws, &message("blocked"), &mut diag)
        .await
        .unwrap_err();

    match err {
        ReleaseError::Hook(hook) => {
            assert_eq!(hook.code, Some(3));
            assert_eq!(hook.stderr, "refusing");
        }
        other => panic!("unexpected error: {other}"),
    }
    let repo = DeployRepository::new(&ws.service.deploy_repo_path);
    assert_eq!(repo.head().await.unwrap(), None);
    assert!(bare_head(&ws.remote(0), "master").is_none());
}

#[tokio::test]
async fn pre_publish_hook_output_is_part_of_the_release() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 1,
        extra: "    hooks:\n      pre_publish_local: [\"echo $PUSHDEPLOY_SERVICE > BUILD_INFO\"]\n"
            .to_string(),
        ..Default::default()
    });
    let mut diag = Diagnostics::default();

    stage_and_publish(&ws, &message("with info"), &mut diag)
        .await
        .unwrap();

    let repo = DeployRepository::new(&ws.service.deploy_repo_path);
    assert!(repo.pending_changes().await.unwrap().is_empty());
    assert_eq!(
        std::fs::read_to_string(ws.service.deploy_repo_path.join("BUILD_INFO")).unwrap(),
        "api\n"
    );
}

#[tokio::test]
async fn post_publish_hook_failure_only_warns() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 1,
        extra: "    hooks:\n      post_publish_local: [\"exit 1\"]\n".to_string(),
        ..Default::default()
    });
    let mut diag = Diagnostics::default();

    let result = published(
        stage_and_publish(&ws, &message("hooked"), &mut diag)
            .await
            .unwrap(),
    );

    assert_eq!(result.targets_succeeded, 1);
    assert_eq!(diag.of_kind(WarningKind::HookFailed).count(), 1);
}

#[tokio::test]
async fn skip_push_commits_only() {
    let ws = workspace(1);
    let mut diag = Diagnostics::default();
    let options = PublishOptions {
        message: Some("local only".to_string()),
        skip_push: true,
        ..Default::default()
    };

    let result = published(stage_and_publish(&ws, &options, &mut diag).await.unwrap());

    assert!(result.commit_hash.is_some());
    assert_eq!(result.targets_attempted, 0);
    assert!(result.summary().ends_with("(not pushed)"));
    assert!(bare_head(&ws.remote(0), "master").is_none());
}

#[tokio::test]
async fn dry_run_previews_without_committing() {
    let ws = workspace(2);
    let mut diag = Diagnostics::default();
    let options = PublishOptions {
        dry_run: true,
        ..Default::default()
    };

    let outcome = stage_and_publish(&ws, &options, &mut diag).await.unwrap();

    let PublishOutcome::DryRun(preview) = outcome else {
        panic!("expected a preview");
    };
    assert!(preview.changes.iter().any(|c| c.contains("dist/app.js")));
    assert_eq!(preview.targets.len(), 2);
    assert_eq!(preview.branch, "master");

    let repo = DeployRepository::new(&ws.service.deploy_repo_path);
    assert_eq!(repo.head().await.unwrap(), None);
}

#[tokio::test]
async fn unstaged_service_is_not_initialized() {
    let ws = workspace(1);
    let mut diag = Diagnostics::default();

    let err = release::publish(&ws.service, &message("early"), &mut diag)
        .await
        .unwrap_err();

    assert!(matches!(err, ReleaseError::NotInitialized(_)));
}

#[tokio::test]
async fn concurrent_release_is_refused() {
    let ws = workspace(1);
    let mut diag = Diagnostics::default();
    stage::stage(&ws.service, false, &mut diag).await.unwrap();
    let repo = DeployRepository::new(&ws.service.deploy_repo_path);
    let _held = FileLock::acquire(&repo.git_dir_path(REPOSITORY_LOCK), "release api").unwrap();

    let err = release::publish(&ws.service, &message("blocked"), &mut diag)
        .await
        .unwrap_err();

    assert!(matches!(err, ReleaseError::Lock(LockError::Held { .. })));
}

#[tokio::test]
async fn lock_is_released_after_publish() {
    let ws = workspace(1);
    let mut diag = Diagnostics::default();

    stage_and_publish(&ws, &message("one"), &mut diag)
        .await
        .unwrap();

    let repo = DeployRepository::new(&ws.service.deploy_repo_path);
    assert!(!repo.git_dir_path(REPOSITORY_LOCK).exists());
}

#[tokio::test]
async fn status_reports_history_and_unreleased_changes() {
    let ws = workspace(1);
    let mut diag = Diagnostics::default();
    stage_and_publish(&ws, &message("one"), &mut diag)
        .await
        .unwrap();
    ws.write_artifact("dist/app.js", "console.log('v2');\n");
    stage::stage(&ws.service, false, &mut diag).await.unwrap();

    let status = release::inspect(&ws.service).await.unwrap();

    assert!(status.initialized);
    assert_eq!(status.releases, 1);
    assert_eq!(status.head.unwrap().subject, "one");
    assert!(status.unreleased.iter().any(|c| c.contains("dist/app.js")));
    assert!(status.remotes.iter().any(|(name, _)| name == "origin"));
}
