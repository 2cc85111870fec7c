// ABOUTME: Integration tests for remote bootstrap.
// ABOUTME: Checks command sequences through a recording runner and a real local bootstrap.

mod support;

use std::os::unix::fs::PermissionsExt;

use pushdeploy::bootstrap::{self, HOOK_NAME};
use pushdeploy::config::{Config, ServiceConfig};
use pushdeploy::diagnostics::{Diagnostics, WarningKind};
use pushdeploy::shell::LocalRunner;
use support::{RecordingRunner, WorkspaceOptions, workspace_with};

fn ssh_service(extra: &str) -> ServiceConfig {
    let yaml = format!(
        r#"
services:
  api:
    source: .
    artifacts: [dist]
    servers:
      - host: deploy@web1.example.com
        bare_repo: /srv/git/api.git
        work_dir: /srv/apps/api
{}
"#,
        extra
    );
    Config::from_yaml(&yaml).unwrap().service("api").unwrap()
}

#[tokio::test]
async fn fresh_target_gets_repository_work_dir_and_hook() {
    support::init_tracing();
    let service = ssh_service("");
    let runner = RecordingRunner::new()
        .respond("test -f /srv/git/api.git/HEAD", 1, "")
        .respond("command -v pushdeploy", 0, "/usr/local/bin/pushdeploy\n");
    let mut diag = Diagnostics::default();

    let report = bootstrap::bootstrap_target(&runner, &service, service.primary(), &mut diag)
        .await
        .unwrap();

    assert!(report.created_repo);
    assert!(!report.created_group);
    assert!(report.hook_installed);
    assert!(report.installer_found);
    assert!(!diag.has_warnings());

    let init = runner.position("git init --bare --quiet /srv/git/api.git").unwrap();
    let head = runner
        .position("cd /srv/git/api.git && git symbolic-ref HEAD refs/heads/master")
        .unwrap();
    let work = runner.position("mkdir -p /srv/apps/api").unwrap();
    assert!(init < head && head < work);
    assert!(!runner.ran("--shared=group"));

    let files = runner.files();
    assert_eq!(files.len(), 1);
    let (path, script, mode) = &files[0];
    assert_eq!(path, &format!("/srv/git/api.git/hooks/{}", HOOK_NAME));
    assert_eq!(*mode, 0o755);
    assert!(script.contains("export PUSHDEPLOY_TARGET_DIR=/srv/apps/api"));
    assert!(script.contains("install \"$PUSHDEPLOY_SERVICE\""));
}

#[tokio::test]
async fn existing_repository_is_left_alone_but_hook_is_rewritten() {
    let service = ssh_service("");
    let runner = RecordingRunner::new();
    let mut diag = Diagnostics::default();

    let report = bootstrap::bootstrap_target(&runner, &service, service.primary(), &mut diag)
        .await
        .unwrap();

    assert!(!report.created_repo);
    assert!(!runner.ran("git init"));
    assert!(runner.ran("mkdir -p /srv/apps/api"));
    assert_eq!(runner.files().len(), 1);
}

#[tokio::test]
async fn group_is_created_and_owner_added() {
    let service = ssh_service("        owner: deploy\n        group: web");
    let runner = RecordingRunner::new()
        .respond("test -f", 1, "")
        .respond("getent group web", 2, "")
        .respond("id -nG deploy", 0, "deploy users\n");
    let mut diag = Diagnostics::default();

    let report = bootstrap::bootstrap_target(&runner, &service, service.primary(), &mut diag)
        .await
        .unwrap();

    assert!(report.created_group);
    assert!(runner.ran("sudo -n groupadd web"));
    assert!(runner.ran("sudo -n usermod -aG web deploy"));
    assert!(runner.ran("git init --bare --quiet --shared=group /srv/git/api.git"));
    assert!(runner.ran("sudo -n chgrp -R web /srv/git/api.git /srv/apps/api"));
    assert!(runner.ran("sudo -n chmod g+s /srv/git/api.git /srv/apps/api"));
}

#[tokio::test]
async fn existing_membership_needs_no_sudo() {
    let service = ssh_service("        owner: deploy\n        group: web");
    let runner = RecordingRunner::new().respond("id -nG deploy", 0, "deploy web\n");
    let mut diag = Diagnostics::default();

    let report = bootstrap::bootstrap_target(&runner, &service, service.primary(), &mut diag)
        .await
        .unwrap();

    assert!(!report.created_group);
    assert!(!runner.commands().iter().any(|c| c.starts_with("sudo")));
    assert!(runner.ran("chgrp -R web /srv/git/api.git /srv/apps/api"));
}

#[tokio::test]
async fn missing_installer_is_a_warning() {
    let service = ssh_service("");
    let runner = RecordingRunner::new().respond("command -v pushdeploy", 1, "");
    let mut diag = Diagnostics::default();

    let report = bootstrap::bootstrap_target(&runner, &service, service.primary(), &mut diag)
        .await
        .unwrap();

    assert!(!report.installer_found);
    assert_eq!(diag.of_kind(WarningKind::MissingBinary).count(), 1);
}

#[tokio::test]
async fn failed_step_names_the_step() {
    let service = ssh_service("");
    let runner = RecordingRunner::new()
        .respond("test -f", 1, "")
        .respond("git init", 128, "");
    let mut diag = Diagnostics::default();

    let err = bootstrap::bootstrap_target(&runner, &service, service.primary(), &mut diag)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("repository init failed on web1.example.com"));
    assert!(runner.files().is_empty());
}

#[tokio::test]
async fn local_bootstrap_creates_bare_repository_and_executable_hook() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 2,
        missing_remotes: vec![0, 1],
        ..Default::default()
    });
    let mut diag = Diagnostics::default();

    let summary = bootstrap::bootstrap_all(&ws.service, &mut diag).await;

    assert_eq!(summary.attempted(), 2);
    assert!(summary.failures.is_empty());
    for (index, report) in summary.reports.iter().enumerate() {
        assert!(report.created_repo);
        assert!(ws.remote(index).join("HEAD").is_file());
        assert!(ws.work_dir(index).is_dir());

        let head = std::fs::read_to_string(ws.remote(index).join("HEAD")).unwrap();
        assert_eq!(head.trim(), "ref: refs/heads/master");

        let hook = ws.remote(index).join("hooks").join(HOOK_NAME);
        let mode = std::fs::metadata(&hook).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    let expected_warnings = summary.reports.iter().filter(|r| !r.installer_found).count();
    assert_eq!(
        diag.of_kind(WarningKind::MissingBinary).count(),
        expected_warnings
    );

    // Second run only rewrites hooks.
    let again = bootstrap::bootstrap_all(&ws.service, &mut diag).await;
    assert!(again.reports.iter().all(|r| !r.created_repo));
}

#[tokio::test]
async fn local_runner_bootstraps_single_target() {
    let ws = workspace_with(WorkspaceOptions {
        targets: 1,
        missing_remotes: vec![0],
        ..Default::default()
    });
    let mut diag = Diagnostics::default();

    let report =
        bootstrap::bootstrap_target(&LocalRunner, &ws.service, ws.service.primary(), &mut diag)
            .await
            .unwrap();

    assert_eq!(report.label.as_str(), "target-0");
    let script =
        std::fs::read_to_string(ws.remote(0).join("hooks").join(HOOK_NAME)).unwrap();
    assert!(script.starts_with("#!/bin/sh\n"));
    assert!(script.contains(&format!("PUSHDEPLOY_GIT_DIR={}", ws.remote(0).display())));
}
