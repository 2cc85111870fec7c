// ABOUTME: systemd adapter: restarts a unit through systemctl, optionally via sudo.

use async_trait::async_trait;

use super::{ProcessManager, RestartAction};
use crate::shell::{CommandRunner, ExecError, ShellCommand};
use crate::types::ProcessName;

#[derive(Debug, Clone)]
pub struct Systemd {
    unit: String,
    sudo: bool,
}

impl Systemd {
    pub fn new(name: &ProcessName, sudo: bool) -> Self {
        Self {
            unit: unit_name(name),
            sudo,
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

/// `name` with a `.service` suffix, unless it already names a unit type.
fn unit_name(name: &ProcessName) -> String {
    let name = name.as_str();
    if name.ends_with(".service") {
        name.to_string()
    } else {
        format!("{}.service", name)
    }
}

#[async_trait]
impl ProcessManager for Systemd {
    async fn exists(&self, runner: &dyn CommandRunner) -> Result<bool, ExecError> {
        runner
            .probe(&ShellCommand::new("systemctl").arg("cat").text(&self.unit))
            .await
    }

    async fn restart(&self, runner: &dyn CommandRunner) -> Result<RestartAction, ExecError> {
        tracing::info!("restarting systemd unit {}", self.unit);
        let restart = ShellCommand::new("systemctl").arg("restart").text(&self.unit);
        runner.run_ok(&self.run_as(restart)).await?;
        Ok(RestartAction::Restarted)
    }

    async fn persist_state(&self, _runner: &dyn CommandRunner) -> Result<(), ExecError> {
        Ok(())
    }

    fn run_as(&self, command: ShellCommand) -> ShellCommand {
        if self.sudo { command.sudo() } else { command }
    }

    fn logs_command(&self, lines: usize, follow: bool) -> ShellCommand {
        let logs = ShellCommand::new("journalctl")
            .arg("--no-pager")
            .arg("-u")
            .text(&self.unit)
            .arg("-n")
            .text(lines.to_string());
        let logs = if follow { logs.arg("-f") } else { logs };
        self.run_as(logs)
    }
}
