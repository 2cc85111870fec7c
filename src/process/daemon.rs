// ABOUTME: Daemon adapter for processes that manage their own workers behind a pid file.
// ABOUTME: A live pid gets SIGHUP for a zero-downtime reload; otherwise the command is launched.

use async_trait::async_trait;

use super::{ProcessManager, RestartAction};
use crate::config::DaemonOptions;
use crate::shell::{CommandRunner, ExecError, ShellCommand};
use crate::types::{AccountName, PathError, ProcessName, RemotePath};

/// Detaches `$1` with output appended to `$3`, records its pid in `$2` and prints it.
const LAUNCHER: &str =
    "nohup sh -c \"$1\" >>\"$3\" 2>&1 </dev/null & echo $! >\"$2\"; echo $!";

/// 32-bit FNV-1a hash.
pub fn fnv1a(value: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in value.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Stable per-name port in 3000..4000.
pub fn default_port(name: &ProcessName) -> u16 {
    3000 + (fnv1a(name.as_str()) % 1000) as u16
}

fn default_workers() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

#[derive(Debug, Clone)]
pub struct Daemon {
    name: ProcessName,
    command: String,
    work_dir: RemotePath,
    pid_file: RemotePath,
    log_file: RemotePath,
    port: u16,
    workers: u32,
    user: Option<AccountName>,
}

impl Daemon {
    pub fn new(
        name: ProcessName,
        options: &DaemonOptions,
        work_dir: RemotePath,
        user: Option<AccountName>,
    ) -> Result<Self, PathError> {
        let pid_file = match &options.pid_file {
            Some(path) => path.clone(),
            None => RemotePath::new(&format!("{}/{}.pid", work_dir, name))?,
        };
        let log_file = RemotePath::new(&format!("{}/{}.log", work_dir, name))?;
        Ok(Self {
            port: options.port.unwrap_or_else(|| default_port(&name)),
            workers: options.workers.unwrap_or_else(default_workers),
            command: options.command.clone().unwrap_or_default(),
            name,
            work_dir,
            pid_file,
            log_file,
            user,
        })
    }

    pub fn pid_file(&self) -> &RemotePath {
        &self.pid_file
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Pid recorded in the marker file, if the file exists and parses.
    async fn recorded_pid(&self, runner: &dyn CommandRunner) -> Result<Option<u32>, ExecError> {
        let output = runner
            .run(&ShellCommand::new("cat").safe(&self.pid_file))
            .await?;
        if !output.success() {
            return Ok(None);
        }
        Ok(output.stdout.trim().parse().ok())
    }

    /// Live pid from the marker file.
    async fn live_pid(&self, runner: &dyn CommandRunner) -> Result<Option<u32>, ExecError> {
        let Some(pid) = self.recorded_pid(runner).await? else {
            return Ok(None);
        };
        let alive = runner
            .probe(&self.run_as(ShellCommand::new("kill").arg("-0").text(pid.to_string())))
            .await?;
        Ok(alive.then_some(pid))
    }

    fn launch_command(&self) -> ShellCommand {
        let launch = ShellCommand::new("sh")
            .arg("-c")
            .arg(LAUNCHER)
            .arg("pushdeploy-daemon")
            .text(&self.command)
            .safe(&self.pid_file)
            .safe(&self.log_file)
            .env("PORT", self.port.to_string())
            .env("WORKERS", self.workers.to_string())
            .current_dir(&self.work_dir);
        self.run_as(launch)
    }
}

#[async_trait]
impl ProcessManager for Daemon {
    async fn exists(&self, runner: &dyn CommandRunner) -> Result<bool, ExecError> {
        Ok(self.live_pid(runner).await?.is_some())
    }

    async fn restart(&self, runner: &dyn CommandRunner) -> Result<RestartAction, ExecError> {
        if let Some(pid) = self.live_pid(runner).await? {
            tracing::info!("reloading {} (pid {}) with SIGHUP", self.name, pid);
            runner
                .run_ok(&self.run_as(ShellCommand::new("kill").arg("-HUP").text(pid.to_string())))
                .await?;
            return Ok(RestartAction::Reloaded { pid });
        }

        tracing::info!(
            "starting {} on port {} with {} worker(s)",
            self.name,
            self.port,
            self.workers
        );
        let output = runner.run_ok(&self.launch_command()).await?;
        let pid = output
            .stdout
            .trim()
            .parse()
            .map_err(|_| ExecError::Remote(format!(
                "daemon launcher printed no pid: {:?}",
                output.stdout.trim()
            )))?;
        Ok(RestartAction::ColdStarted { pid })
    }

    async fn persist_state(&self, _runner: &dyn CommandRunner) -> Result<(), ExecError> {
        Ok(())
    }

    fn run_as(&self, command: ShellCommand) -> ShellCommand {
        match &self.user {
            Some(user) => command.as_user(user),
            None => command,
        }
    }

    fn logs_command(&self, lines: usize, follow: bool) -> ShellCommand {
        let logs = ShellCommand::new("tail").arg("-n").text(lines.to_string());
        let logs = if follow { logs.arg("-f") } else { logs };
        logs.safe(&self.log_file)
    }
}
