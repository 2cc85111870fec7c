// ABOUTME: Installation struct parameterized by state marker, with its transitions.
// ABOUTME: Each transition consumes self and returns the next state on success.

use std::path::PathBuf;

use serde::Serialize;
use snafu::ResultExt;

use crate::diagnostics::{Diagnostics, Warning};
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::manifest::ReleaseManifest;
use crate::process::{RestartAction, manager_for, restart_and_persist};
use crate::shell::{CommandRunner, ShellCommand};
use crate::types::{BranchName, CommitHash, RemotePath, ServiceName};

use super::context::InstallContext;
use super::dependencies::DependencyPlan;
use super::error::{
    CheckoutSnafu, DependenciesSnafu, EnvironmentSnafu, InstallError, ManifestSnafu,
    ProcessSettingsSnafu, RestartSnafu,
};
use super::state::{CheckedOut, DependenciesInstalled, EnvironmentReady, Received, Restarted};

pub const ENV_FILE: &str = ".env";

/// What one install did.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub service: ServiceName,
    pub branch: BranchName,
    pub commit: CommitHash,
    pub env_file: Option<PathBuf>,
    /// Rendered dependency command, when one ran.
    pub dependencies: Option<String>,
    pub hooks_failed: usize,
    pub restart: Option<RestartAction>,
}

/// An install in progress, parameterized by its current state.
pub struct Installation<'a, S> {
    context: &'a InstallContext,
    runner: &'a dyn CommandRunner,
    report: InstallReport,
    state: S,
}

impl<'a> Installation<'a, Received> {
    /// Start installing `commit`.
    pub fn new(
        context: &'a InstallContext,
        runner: &'a dyn CommandRunner,
        commit: CommitHash,
    ) -> Self {
        Installation {
            context,
            runner,
            report: InstallReport {
                service: context.service.clone(),
                branch: context.branch.clone(),
                commit,
                env_file: None,
                dependencies: None,
                hooks_failed: 0,
                restart: None,
            },
            state: Received,
        }
    }

    /// Force the work tree to the pushed commit, then read its manifest.
    ///
    /// Reads the commit's tree rather than the branch, which a later push may
    /// already have moved. Files tracked before and absent now are removed.
    pub async fn checkout(self) -> Result<Installation<'a, CheckedOut>, InstallError> {
        let context = self.context;
        let checkout = ShellCommand::new("git")
            .text(format!("--git-dir={}", context.git_dir))
            .text(format!("--work-tree={}", context.target_dir))
            .arg("read-tree")
            .arg("-u")
            .arg("--reset")
            .safe(&self.report.commit);
        self.runner.run_ok(&checkout).await.context(CheckoutSnafu)?;
        tracing::info!(
            "checked out {} ({}) into {}",
            context.branch,
            self.report.commit.short(),
            context.target_dir
        );

        let manifest =
            ReleaseManifest::read_from(context.target_dir.as_path()).context(ManifestSnafu)?;
        if manifest.service != context.service {
            return Err(InstallError::ServiceMismatch {
                expected: context.service.clone(),
                found: manifest.service,
            });
        }

        Ok(self.transition(CheckedOut { manifest }))
    }
}

impl<'a, S> Installation<'a, S> {
    fn transition<T>(self, state: T) -> Installation<'a, T> {
        Installation {
            context: self.context,
            runner: self.runner,
            report: self.report,
            state,
        }
    }

    pub fn context(&self) -> &InstallContext {
        self.context
    }

    pub fn commit(&self) -> &CommitHash {
        &self.report.commit
    }
}

impl<'a> Installation<'a, CheckedOut> {
    pub fn manifest(&self) -> &ReleaseManifest {
        &self.state.manifest
    }

    /// Replace `<work>/.env` with the manifest environment, sorted by key.
    pub fn write_environment(mut self) -> Result<Installation<'a, EnvironmentReady>, InstallError> {
        let environment = &self.state.manifest.environment;
        if !environment.is_empty() {
            let path = self.context.target_dir.as_path().join(ENV_FILE);
            let content: String = environment
                .iter()
                .map(|(key, value)| format!("{}={}\n", key, value))
                .collect();
            std::fs::write(&path, content).context(EnvironmentSnafu { path: path.clone() })?;
            tracing::info!("wrote {} variable(s) to {}", environment.len(), path.display());
            self.report.env_file = Some(path);
        }
        let manifest = self.state.manifest.clone();
        Ok(self.transition(EnvironmentReady { manifest }))
    }
}

impl<'a> Installation<'a, EnvironmentReady> {
    pub fn manifest(&self) -> &ReleaseManifest {
        &self.state.manifest
    }

    /// Directory dependencies are installed in: the work tree or its package dir.
    pub fn install_dir(&self) -> RemotePath {
        match &self.state.manifest.package_dir {
            Some(package_dir) => self.context.target_dir.join(package_dir),
            None => self.context.target_dir.clone(),
        }
    }

    pub async fn install_dependencies(
        mut self,
    ) -> Result<Installation<'a, DependenciesInstalled>, InstallError> {
        let dir = self.install_dir();
        let plan = DependencyPlan::choose(
            self.state.manifest.install_command.as_deref(),
            dir.as_path(),
        );

        match plan.command() {
            Some(command) => {
                let command = command.current_dir(&dir);
                let rendered = command.render();
                tracing::info!("installing dependencies: {}", rendered);
                self.runner
                    .run_ok(&command)
                    .await
                    .context(DependenciesSnafu {
                        command: rendered.clone(),
                    })?;
                self.report.dependencies = Some(rendered);
            }
            None => tracing::info!("no dependency manifest in {}, skipping install", dir),
        }

        let manifest = self.state.manifest.clone();
        Ok(self.transition(DependenciesInstalled { manifest }))
    }
}

impl<'a> Installation<'a, DependenciesInstalled> {
    pub fn manifest(&self) -> &ReleaseManifest {
        &self.state.manifest
    }

    /// Run `post_install_remote` hooks in the work tree. Failures are warnings.
    pub async fn run_post_install(&mut self, diagnostics: &mut Diagnostics) {
        let commands = &self.state.manifest.post_install;
        if commands.is_empty() {
            return;
        }
        let work_dir = self.context.target_dir.as_path();
        let hook_context = HookContext {
            service: self.context.service.clone(),
            commit: Some(self.report.commit.clone()),
            deploy_dir: work_dir.to_path_buf(),
        };
        let runner = HookRunner::new(work_dir);
        for command in commands {
            let result = runner
                .run(HookPoint::PostInstallRemote, command, &hook_context)
                .await;
            if !result.success {
                self.report.hooks_failed += 1;
                let error = result.into_error(HookPoint::PostInstallRemote);
                diagnostics.warn(Warning::hook_failed(error.to_string()));
            }
        }
    }

    /// Restart (or start) the process and persist the manager's state.
    pub async fn restart(mut self) -> Result<Installation<'a, Restarted>, InstallError> {
        let manager = manager_for(
            &self.state.manifest.process,
            &self.context.target_dir,
            self.context.process_user.as_ref(),
        )
        .context(ProcessSettingsSnafu)?;
        let action = restart_and_persist(manager.as_ref(), self.runner)
            .await
            .context(RestartSnafu)?;
        self.report.restart = Some(action);
        Ok(self.transition(Restarted { action }))
    }
}

impl Installation<'_, Restarted> {
    pub fn action(&self) -> RestartAction {
        self.state.action
    }

    pub fn finish(self) -> InstallReport {
        self.report
    }
}
