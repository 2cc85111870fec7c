// ABOUTME: CommandRunner capability with a local tokio-process implementation.
// ABOUTME: The SSH session implements the same trait for remote targets.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use super::command::ShellCommand;
use crate::types::RemotePath;

/// Output from a command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    NonZero {
        command: String,
        code: u32,
        stderr: String,
    },

    #[error("failed to write {path}: {reason}")]
    WriteFile { path: String, reason: String },

    #[error("remote execution failed: {0}")]
    Remote(String),
}

/// Something that can execute `ShellCommand`s: the local machine or an SSH session.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its output regardless of exit status.
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ExecError>;

    /// Replace a file's contents and set its mode.
    async fn write_file(
        &self,
        path: &RemotePath,
        contents: &str,
        mode: u32,
    ) -> Result<(), ExecError>;

    /// Short description for logs, e.g. `local` or `ssh deploy@web1`.
    fn describe(&self) -> String;

    /// Run a command and fail on a non-zero exit status.
    async fn run_ok(&self, command: &ShellCommand) -> Result<CommandOutput, ExecError> {
        let output = self.run(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ExecError::NonZero {
                command: command.render(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Run a probe command, mapping exit status to a boolean.
    async fn probe(&self, command: &ShellCommand) -> Result<bool, ExecError> {
        Ok(self.run(command).await?.success())
    }
}

/// Runs commands on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunner;

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ExecError> {
        let argv = command.argv();
        let (program, args) = argv.split_first().ok_or_else(|| ExecError::Spawn {
            command: command.render(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        })?;

        tracing::debug!("running locally: {}", command);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = command.working_dir() {
            cmd.current_dir(dir.as_path());
        }

        let output = cmd.output().await.map_err(|source| ExecError::Spawn {
            command: command.render(),
            source,
        })?;

        Ok(CommandOutput {
            // Killed by a signal: report the conventional shell status.
            exit_code: output.status.code().map(|c| c as u32).unwrap_or(128),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn write_file(
        &self,
        path: &RemotePath,
        contents: &str,
        mode: u32,
    ) -> Result<(), ExecError> {
        let write_err = |e: std::io::Error| ExecError::WriteFile {
            path: path.to_string(),
            reason: e.to_string(),
        };
        tokio::fs::write(path.as_path(), contents)
            .await
            .map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path.as_path(), std::fs::Permissions::from_mode(mode))
                .await
                .map_err(write_err)?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(())
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}
