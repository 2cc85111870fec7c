// ABOUTME: Remote Bootstrapper: prepares each target's bare repository, work dir and hook.
// ABOUTME: Idempotent; every step probes before it changes anything except the hook itself.

mod hook_script;

pub use hook_script::{
    ENV_BRANCH, ENV_GIT_DIR, ENV_PROCESS_USER, ENV_SERVICE, ENV_TARGET_DIR, HOOK_NAME, hook_script,
};

use serde::Serialize;
use thiserror::Error;

use crate::config::{ServerTarget, ServiceConfig, Transport};
use crate::diagnostics::{Diagnostics, Warning};
use crate::release::TargetFailure;
use crate::shell::{CommandRunner, ExecError, LocalRunner, ShellCommand};
use crate::ssh::{self, Session, SessionConfig};
use crate::types::{AccountName, Label};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to connect to {label}: {source}")]
    Connect { label: Label, source: ssh::Error },

    #[error("{step} failed on {label}: {source}")]
    Step {
        label: Label,
        step: &'static str,
        source: ExecError,
    },

    #[error("init failed on every target ({0} attempted)")]
    AllTargetsFailed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub label: Label,
    pub created_repo: bool,
    pub created_group: bool,
    pub hook_installed: bool,
    pub installer_found: bool,
}

/// Outcome of `init` across all targets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapSummary {
    pub reports: Vec<BootstrapReport>,
    pub failures: Vec<TargetFailure>,
}

impl BootstrapSummary {
    pub fn attempted(&self) -> usize {
        self.reports.len() + self.failures.len()
    }

    pub fn all_failed(&self) -> bool {
        self.reports.is_empty() && !self.failures.is_empty()
    }
}

/// A connection to one target's command surface.
pub enum TargetRunner {
    Local(LocalRunner),
    Ssh(Session),
}

impl TargetRunner {
    pub async fn connect(
        target: &ServerTarget,
        service: &ServiceConfig,
    ) -> Result<Self, BootstrapError> {
        match target.transport {
            Transport::Local => Ok(TargetRunner::Local(LocalRunner)),
            Transport::Ssh => {
                let config = SessionConfig::for_target(target, service.connect_timeout);
                Session::connect(config)
                    .await
                    .map(TargetRunner::Ssh)
                    .map_err(|source| BootstrapError::Connect {
                        label: target.label.clone(),
                        source,
                    })
            }
        }
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        match self {
            TargetRunner::Local(runner) => runner,
            TargetRunner::Ssh(session) => session,
        }
    }

    /// Close the connection; a failed disconnect is only a warning.
    pub async fn close(self, diagnostics: &mut Diagnostics) {
        if let TargetRunner::Ssh(session) = self
            && let Err(e) = session.disconnect().await
        {
            diagnostics.warn(Warning::ssh_disconnect(format!(
                "failed to disconnect cleanly: {}",
                e
            )));
        }
    }
}

struct Steps<'a> {
    runner: &'a dyn CommandRunner,
    label: &'a Label,
}

impl Steps<'_> {
    fn fail(&self, step: &'static str) -> impl FnOnce(ExecError) -> BootstrapError + '_ {
        move |source| BootstrapError::Step {
            label: self.label.clone(),
            step,
            source,
        }
    }

    async fn run(&self, step: &'static str, command: ShellCommand) -> Result<String, BootstrapError> {
        self.runner
            .run_ok(&command)
            .await
            .map(|output| output.stdout)
            .map_err(self.fail(step))
    }

    async fn probe(&self, step: &'static str, command: ShellCommand) -> Result<bool, BootstrapError> {
        self.runner.probe(&command).await.map_err(self.fail(step))
    }
}

/// Ensure `group` exists and `owner` belongs to it. Returns (created_group, elevated).
async fn ensure_group(
    steps: &Steps<'_>,
    group: &AccountName,
    owner: Option<&AccountName>,
) -> Result<(bool, bool), BootstrapError> {
    let mut created = false;
    let mut changed = false;

    if !steps
        .probe("group lookup", ShellCommand::new("getent").arg("group").safe(group))
        .await?
    {
        tracing::info!("creating group {} on {}", group, steps.label);
        steps
            .run("group creation", ShellCommand::new("groupadd").safe(group).sudo())
            .await?;
        created = true;
        changed = true;
    }

    if let Some(owner) = owner {
        let groups = steps
            .run("group membership lookup", ShellCommand::new("id").arg("-nG").safe(owner))
            .await?;
        if !groups.split_whitespace().any(|g| g == group.as_str()) {
            tracing::info!("adding {} to group {} on {}", owner, group, steps.label);
            steps
                .run(
                    "group membership",
                    ShellCommand::new("usermod").arg("-aG").safe(group).safe(owner).sudo(),
                )
                .await?;
            changed = true;
        }
    }

    Ok((created, changed))
}

/// Prepare one target. Safe to re-run.
pub async fn bootstrap_target(
    runner: &dyn CommandRunner,
    service: &ServiceConfig,
    target: &ServerTarget,
    diagnostics: &mut Diagnostics,
) -> Result<BootstrapReport, BootstrapError> {
    let steps = Steps {
        runner,
        label: &target.label,
    };
    let bare = &target.bare_repo;
    let work = &target.work_dir;

    let (created_group, elevate) = match &target.group {
        Some(group) => ensure_group(&steps, group, target.owner.as_ref()).await?,
        None => (false, false),
    };

    let created_repo = if steps
        .probe("repository probe", ShellCommand::new("test").arg("-f").safe(&bare.child("HEAD")))
        .await?
    {
        tracing::info!("{} already initialized on {}", bare, target.label);
        false
    } else {
        steps
            .run("repository directory", ShellCommand::new("mkdir").arg("-p").safe(bare))
            .await?;
        let init = ShellCommand::new("git").arg("init").arg("--bare").arg("--quiet");
        let init = if target.group.is_some() {
            init.arg("--shared=group")
        } else {
            init
        };
        steps.run("repository init", init.safe(bare)).await?;
        steps
            .run(
                "repository HEAD",
                ShellCommand::new("git")
                    .arg("symbolic-ref")
                    .arg("HEAD")
                    .text(service.branch.full_ref())
                    .current_dir(bare),
            )
            .await?;
        tracing::info!("created bare repository {} on {}", bare, target.label);
        true
    };

    steps
        .run("work directory", ShellCommand::new("mkdir").arg("-p").safe(work))
        .await?;

    if let Some(group) = &target.group {
        let sudo = |command: ShellCommand| if elevate { command.sudo() } else { command };
        steps
            .run(
                "permissions",
                sudo(ShellCommand::new("chgrp").arg("-R").safe(group).safe(bare).safe(work)),
            )
            .await?;
        steps
            .run(
                "permissions",
                sudo(ShellCommand::new("chmod").arg("-R").arg("g+rwX").safe(bare).safe(work)),
            )
            .await?;
        steps
            .run(
                "permissions",
                sudo(ShellCommand::new("chmod").arg("g+s").safe(bare).safe(work)),
            )
            .await?;
    }

    let hooks_dir = bare.child("hooks");
    steps
        .run("hook directory", ShellCommand::new("mkdir").arg("-p").safe(&hooks_dir))
        .await?;
    let script = hook_script(&service.name, target, &service.branch);
    runner
        .write_file(&hooks_dir.child(HOOK_NAME), &script, 0o755)
        .await
        .map_err(steps.fail("hook install"))?;

    let installer_found = steps
        .probe(
            "installer probe",
            ShellCommand::new("sh").arg("-c").arg("command -v pushdeploy"),
        )
        .await?;
    if !installer_found {
        diagnostics.warn(Warning::missing_binary(format!(
            "pushdeploy is not on PATH on {}; pushes will not be installed until it is",
            target.label
        )));
    }

    Ok(BootstrapReport {
        label: target.label.clone(),
        created_repo,
        created_group,
        hook_installed: true,
        installer_found,
    })
}

/// Bootstrap every target, continuing past failures.
pub async fn bootstrap_all(
    service: &ServiceConfig,
    diagnostics: &mut Diagnostics,
) -> BootstrapSummary {
    let mut summary = BootstrapSummary::default();

    for target in service.servers.iter() {
        let outcome = match TargetRunner::connect(target, service).await {
            Ok(connection) => {
                let outcome =
                    bootstrap_target(connection.runner(), service, target, diagnostics).await;
                connection.close(diagnostics).await;
                outcome
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                diagnostics.warn(Warning::target_failed(e.to_string()));
                summary.failures.push(TargetFailure {
                    label: target.label.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    summary
}
