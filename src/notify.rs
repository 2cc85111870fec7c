// ABOUTME: Notification sinks told about every release and rollback result.
// ABOUTME: The command sink pipes the JSON result into a configured shell command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::diagnostics::{Diagnostics, Warning};
use crate::release::DeploymentResult;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to run notification command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("notification command exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, result: &DeploymentResult) -> Result<(), NotifyError>;

    fn describe(&self) -> String;
}

/// Runs `sh -c <command>` with the result as JSON on stdin.
#[derive(Debug, Clone)]
pub struct CommandSink {
    command: String,
    working_dir: PathBuf,
}

impl CommandSink {
    pub fn new(command: impl Into<String>, working_dir: &Path) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl NotificationSink for CommandSink {
    async fn notify(&self, result: &DeploymentResult) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(result)?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that ignores stdin closes the pipe early; that is not a failure.
            if let Err(e) = stdin.write_all(&payload).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(e.into());
            }
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(NotifyError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn describe(&self) -> String {
        format!("command `{}`", self.command)
    }
}

/// Deliver `result`; failures become warnings and never fail the command.
pub async fn notify_best_effort(
    sink: &dyn NotificationSink,
    result: &DeploymentResult,
    diagnostics: &mut Diagnostics,
) {
    match sink.notify(result).await {
        Ok(()) => tracing::debug!("notified {}", sink.describe()),
        Err(e) => diagnostics.warn(Warning::notification_failed(format!(
            "notification via {} failed: {}",
            sink.describe(),
            e
        ))),
    }
}
