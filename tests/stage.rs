// ABOUTME: Integration tests for the artifact stager.
// ABOUTME: Stages real files into a scratch deploy repository backed by local bare remotes.

mod support;

use pushdeploy::diagnostics::{Diagnostics, WarningKind};
use pushdeploy::git::DeployRepository;
use pushdeploy::manifest::ReleaseManifest;
use pushdeploy::stage::{self, StageError};
use support::{WorkspaceOptions, workspace, workspace_with};

#[tokio::test]
async fn stages_artifacts_and_initializes_repository() {
    support::init_tracing();
    let ws = workspace(2);
    let mut diag = Diagnostics::default();

    let report = stage::stage(&ws.service, false, &mut diag).await.unwrap();

    assert!(report.initialized);
    assert_eq!(report.staged, vec!["dist", "package.json"]);
    assert!(!diag.has_warnings());

    let deploy = &ws.service.deploy_repo_path;
    assert_eq!(
        std::fs::read_to_string(deploy.join("dist/app.js")).unwrap(),
        "console.log('v1');\n"
    );
    assert!(deploy.join("package.json").is_file());

    let manifest = ReleaseManifest::read_from(deploy).unwrap();
    assert_eq!(manifest.service.as_str(), "api");
}

#[tokio::test]
async fn configures_one_remote_per_target_plus_origin() {
    let ws = workspace(2);
    let mut diag = Diagnostics::default();
    stage::stage(&ws.service, false, &mut diag).await.unwrap();

    let remotes = DeployRepository::new(&ws.service.deploy_repo_path)
        .remotes()
        .await
        .unwrap();

    assert_eq!(remotes.len(), 3);
    assert_eq!(remotes["deploy-0"], ws.remote(0).display().to_string());
    assert_eq!(remotes["deploy-1"], ws.remote(1).display().to_string());
    assert_eq!(remotes["origin"], remotes["deploy-0"]);
}

#[tokio::test]
async fn restaging_replaces_removed_files() {
    let ws = workspace(1);
    let mut diag = Diagnostics::default();
    ws.write_artifact("dist/old.js", "old");
    stage::stage(&ws.service, false, &mut diag).await.unwrap();
    assert!(ws.service.deploy_repo_path.join("dist/old.js").exists());

    std::fs::remove_file(ws.build_dir().join("dist/old.js")).unwrap();
    let report = stage::stage(&ws.service, false, &mut diag).await.unwrap();

    assert!(!report.initialized);
    assert!(!ws.service.deploy_repo_path.join("dist/old.js").exists());
    assert!(ws.service.deploy_repo_path.join("dist/app.js").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinks_are_recreated_not_followed() {
    let ws = workspace(1);
    std::os::unix::fs::symlink("app.js", ws.build_dir().join("dist/current.js")).unwrap();
    let mut diag = Diagnostics::default();

    stage::stage(&ws.service, false, &mut diag).await.unwrap();

    let link = ws.service.deploy_repo_path.join("dist/current.js");
    let meta = std::fs::symlink_metadata(&link).unwrap();
    assert!(meta.file_type().is_symlink());
    assert_eq!(
        std::fs::read_link(&link).unwrap(),
        std::path::PathBuf::from("app.js")
    );
}

#[tokio::test]
async fn missing_artifact_warns_but_stages_the_rest() {
    let ws = workspace(1);
    std::fs::remove_file(ws.build_dir().join("package.json")).unwrap();
    let mut diag = Diagnostics::default();

    let report = stage::stage(&ws.service, false, &mut diag).await.unwrap();

    assert_eq!(report.staged, vec!["dist"]);
    assert_eq!(report.missing, vec!["package.json"]);
    let warnings: Vec<_> = diag.of_kind(WarningKind::MissingArtifact).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("package.json"));
}

#[tokio::test]
async fn nothing_to_stage_is_an_error() {
    let ws = workspace(1);
    std::fs::remove_dir_all(ws.build_dir().join("dist")).unwrap();
    std::fs::remove_file(ws.build_dir().join("package.json")).unwrap();
    let mut diag = Diagnostics::default();

    let err = stage::stage(&ws.service, false, &mut diag).await.unwrap_err();

    assert!(matches!(err, StageError::NothingStaged { .. }));
    assert_eq!(diag.of_kind(WarningKind::MissingArtifact).count(), 2);
    assert!(!ws.service.deploy_repo_path.exists());
}

#[tokio::test]
async fn missing_source_directory_is_an_error() {
    let ws = workspace(1);
    std::fs::remove_dir_all(ws.build_dir()).unwrap();
    let mut diag = Diagnostics::default();

    let err = stage::stage(&ws.service, false, &mut diag).await.unwrap_err();

    assert!(matches!(err, StageError::SourceMissing(_)));
}

#[tokio::test]
async fn dry_run_changes_nothing() {
    let ws = workspace(2);
    let mut diag = Diagnostics::default();

    let report = stage::stage(&ws.service, true, &mut diag).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.staged.len(), 2);
    assert!(report.summary().starts_with("Would stage"));
    assert!(!ws.service.deploy_repo_path.exists());
}

#[test]
fn plan_reports_initialization_and_copies() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 1,
        ..Default::default()
    });

    let plan = stage::plan(&ws.service).unwrap();

    assert!(plan.initialize);
    assert_eq!(plan.copies.len(), 2);
    assert_eq!(plan.copies[0].to, ws.service.deploy_repo_path.join("dist"));
    assert_eq!(plan.remotes.last().unwrap().0, "origin");
}
