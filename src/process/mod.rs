// ABOUTME: Process-manager adapters behind one trait: pm2, systemd and a pid-file daemon.
// ABOUTME: Selected by ProcessManagerKind; every command goes through a CommandRunner.

mod daemon;
mod pm2;
mod systemd;

pub use daemon::{Daemon, default_port, fnv1a};
pub use pm2::Pm2;
pub use systemd::Systemd;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{ProcessManagerKind, ProcessSettings, ServerTarget, Transport};
use crate::shell::{CommandRunner, ExecError, ShellCommand};
use crate::types::{AccountName, PathError, RemotePath};

/// What a restart actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RestartAction {
    /// A known process was restarted in place.
    Restarted,
    /// The process was unknown to the manager and started fresh.
    Started,
    /// A running daemon was signalled to reload.
    Reloaded { pid: u32 },
    /// No live daemon; a new one was launched.
    ColdStarted { pid: u32 },
}

#[async_trait]
pub trait ProcessManager: Send + Sync {
    /// Whether the manager already knows (or runs) the process.
    async fn exists(&self, runner: &dyn CommandRunner) -> Result<bool, ExecError>;

    /// Restart the process, starting it when it is not known yet.
    async fn restart(&self, runner: &dyn CommandRunner) -> Result<RestartAction, ExecError>;

    /// Persist the manager's process list across reboots, where supported.
    async fn persist_state(&self, runner: &dyn CommandRunner) -> Result<(), ExecError>;

    /// Wrap a command so it runs with the identity the manager expects.
    fn run_as(&self, command: ShellCommand) -> ShellCommand;

    /// Command that prints (or follows) the process's recent log output.
    fn logs_command(&self, lines: usize, follow: bool) -> ShellCommand;
}

/// Build the adapter for `settings`, operating in `work_dir`.
pub fn manager_for(
    settings: &ProcessSettings,
    work_dir: &RemotePath,
    process_user: Option<&AccountName>,
) -> Result<Box<dyn ProcessManager>, PathError> {
    Ok(match settings.kind {
        ProcessManagerKind::Pm2 => Box::new(Pm2::new(
            settings.name.clone(),
            settings.pm2.ecosystem.clone(),
            work_dir.clone(),
            process_user.cloned(),
        )),
        ProcessManagerKind::Systemd => {
            Box::new(Systemd::new(&settings.name, settings.systemd.sudo))
        }
        ProcessManagerKind::Daemon => Box::new(Daemon::new(
            settings.name.clone(),
            &settings.daemon,
            work_dir.clone(),
            process_user.cloned(),
        )?),
    })
}

/// Restart then persist, the sequence the installer runs.
pub async fn restart_and_persist(
    manager: &dyn ProcessManager,
    runner: &dyn CommandRunner,
) -> Result<RestartAction, ExecError> {
    let action = manager.restart(runner).await?;
    manager.persist_state(runner).await?;
    Ok(action)
}

/// Argument vector of the foreground child that shows the process's logs on `target`.
///
/// SSH targets go through the system `ssh` client with a TTY so `--follow` ends on Ctrl-C.
pub fn logs_argv(
    settings: &ProcessSettings,
    target: &ServerTarget,
    lines: usize,
    follow: bool,
) -> Result<Vec<String>, PathError> {
    let manager = manager_for(settings, &target.work_dir, target.process_user.as_ref())?;
    let command = manager.logs_command(lines, follow);
    Ok(match target.transport {
        Transport::Local => command.argv(),
        Transport::Ssh => {
            let mut argv = vec![
                "ssh".to_string(),
                "-t".to_string(),
                "-p".to_string(),
                target.port.to_string(),
            ];
            if let Some(key) = &target.key_path {
                argv.push("-i".to_string());
                argv.push(key.display().to_string());
            }
            argv.push(target.ssh_destination());
            argv.push(command.render());
            argv
        }
    })
}
