// ABOUTME: Hooks system for release lifecycle events.
// ABOUTME: Runs configured shell commands at pre-publish, post-install and post-publish points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use crate::types::{CommitHash, ServiceName};

/// Hook execution points in the release lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before the release commit. Failure aborts the release.
    PrePublishLocal,
    /// On the server after dependencies are installed. Failure logs warning.
    PostInstallRemote,
    /// After at least one push succeeded. Failure logs warning.
    PostPublishLocal,
}

impl HookPoint {
    /// Name used in config, logs and `PUSHDEPLOY_HOOK`.
    pub fn name(&self) -> &'static str {
        match self {
            HookPoint::PrePublishLocal => "pre_publish_local",
            HookPoint::PostInstallRemote => "post_install_remote",
            HookPoint::PostPublishLocal => "post_publish_local",
        }
    }

    /// Whether failure at this hook point should abort the operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PrePublishLocal)
    }
}

#[derive(Debug, Error)]
#[error("{point} hook `{command}` failed ({}): {stderr}", describe_code(.code))]
pub struct HookError {
    pub point: &'static str,
    pub command: String,
    pub code: Option<i32>,
    pub stderr: String,
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "did not run to completion".to_string(),
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub service: ServiceName,
    pub commit: Option<CommitHash>,
    pub deploy_dir: PathBuf,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self, point: HookPoint) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("PUSHDEPLOY_SERVICE".to_string(), self.service.to_string());
        env.insert("PUSHDEPLOY_HOOK".to_string(), point.name().to_string());
        env.insert(
            "PUSHDEPLOY_DEPLOY_DIR".to_string(),
            self.deploy_dir.display().to_string(),
        );
        if let Some(ref commit) = self.commit {
            env.insert("PUSHDEPLOY_COMMIT".to_string(), commit.to_string());
        }
        env
    }
}

/// Result of running one hook command.
#[derive(Debug)]
pub struct HookResult {
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HookResult {
    pub fn into_error(self, point: HookPoint) -> HookError {
        HookError {
            point: point.name(),
            command: self.command,
            code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Runs hook commands under `sh -c` in a working directory.
pub struct HookRunner {
    working_dir: PathBuf,
}

impl HookRunner {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
        }
    }

    /// Run a single hook command.
    pub async fn run(&self, point: HookPoint, command: &str, context: &HookContext) -> HookResult {
        tracing::info!("Running {} hook: {}", point.name(), command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .envs(context.to_env(point))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    command: command.to_string(),
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.name());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.name(),
                        result.exit_code
                    );
                }

                result
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.name(), e);
                HookResult {
                    command: command.to_string(),
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        }
    }

    /// Run every command for `point` in order.
    ///
    /// At a fatal point the first failure stops the sequence and is returned as an error.
    /// Elsewhere every command runs and failures are left in the results.
    pub async fn run_all(
        &self,
        point: HookPoint,
        commands: &[String],
        context: &HookContext,
    ) -> Result<Vec<HookResult>, HookError> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = self.run(point, command, context).await;
            if !result.success && point.is_fatal() {
                return Err(result.into_error(point));
            }
            results.push(result);
        }
        Ok(results)
    }
}
