// ABOUTME: pm2 adapter: restart with --update-env, or start from the ecosystem descriptor.

use async_trait::async_trait;

use super::{ProcessManager, RestartAction};
use crate::shell::{CommandRunner, ExecError, ShellCommand};
use crate::types::{AccountName, ProcessName, RemotePath};

const ECOSYSTEM_SUFFIXES: &[&str] = &[
    ".config.js",
    ".config.cjs",
    ".config.mjs",
    ".json",
    ".yml",
    ".yaml",
];

#[derive(Debug, Clone)]
pub struct Pm2 {
    name: ProcessName,
    ecosystem: String,
    work_dir: RemotePath,
    user: Option<AccountName>,
}

impl Pm2 {
    pub fn new(
        name: ProcessName,
        ecosystem: String,
        work_dir: RemotePath,
        user: Option<AccountName>,
    ) -> Self {
        Self {
            name,
            ecosystem,
            work_dir,
            user,
        }
    }

    /// Whether the descriptor is an ecosystem file rather than a script.
    fn is_ecosystem_file(&self) -> bool {
        ECOSYSTEM_SUFFIXES
            .iter()
            .any(|suffix| self.ecosystem.ends_with(suffix))
    }

    fn start_command(&self) -> ShellCommand {
        let start = ShellCommand::new("pm2").arg("start").text(&self.ecosystem);
        let start = if self.is_ecosystem_file() {
            start.arg("--only").safe(&self.name)
        } else {
            start.arg("--name").safe(&self.name)
        };
        self.run_as(start.current_dir(&self.work_dir))
    }
}

#[async_trait]
impl ProcessManager for Pm2 {
    async fn exists(&self, runner: &dyn CommandRunner) -> Result<bool, ExecError> {
        runner
            .probe(&self.run_as(ShellCommand::new("pm2").arg("describe").safe(&self.name)))
            .await
    }

    async fn restart(&self, runner: &dyn CommandRunner) -> Result<RestartAction, ExecError> {
        if self.exists(runner).await? {
            tracing::info!("restarting pm2 process {}", self.name);
            let restart = ShellCommand::new("pm2")
                .arg("restart")
                .safe(&self.name)
                .arg("--update-env")
                .current_dir(&self.work_dir);
            runner.run_ok(&self.run_as(restart)).await?;
            Ok(RestartAction::Restarted)
        } else {
            tracing::info!("starting pm2 process {} from {}", self.name, self.ecosystem);
            runner.run_ok(&self.start_command()).await?;
            Ok(RestartAction::Started)
        }
    }

    async fn persist_state(&self, runner: &dyn CommandRunner) -> Result<(), ExecError> {
        runner
            .run_ok(&self.run_as(ShellCommand::new("pm2").arg("save")))
            .await
            .map(|_| ())
    }

    fn run_as(&self, command: ShellCommand) -> ShellCommand {
        match &self.user {
            Some(user) => command.as_user(user),
            None => command,
        }
    }

    fn logs_command(&self, lines: usize, follow: bool) -> ShellCommand {
        let logs = ShellCommand::new("pm2")
            .arg("logs")
            .safe(&self.name)
            .arg("--lines")
            .text(lines.to_string());
        let logs = if follow { logs } else { logs.arg("--nostream") };
        self.run_as(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pm2(ecosystem: &str, user: Option<&str>) -> Pm2 {
        Pm2::new(
            ProcessName::new("api").unwrap(),
            ecosystem.to_string(),
            RemotePath::new("/srv/apps/api").unwrap(),
            user.map(|u| AccountName::new(u).unwrap()),
        )
    }

    #[test]
    fn start_uses_only_for_ecosystem_files() {
        let cmd = pm2("ecosystem.config.js", None).start_command();
        assert_eq!(
            cmd.render(),
            "cd /srv/apps/api && pm2 start ecosystem.config.js --only api"
        );
    }

    #[test]
    fn start_uses_name_for_scripts() {
        let cmd = pm2("server.js", None).start_command();
        assert_eq!(cmd.argv(), ["pm2", "start", "server.js", "--name", "api"]);
    }

    #[test]
    fn run_as_wraps_with_sudo_user() {
        let cmd = pm2("ecosystem.config.js", Some("www-data"))
            .run_as(ShellCommand::new("pm2").arg("save"));
        assert_eq!(cmd.render(), "sudo -n -u www-data -H pm2 save");
    }

    #[test]
    fn logs_command_streams_only_when_following() {
        let p = pm2("ecosystem.config.js", None);
        assert_eq!(
            p.logs_command(50, false).render(),
            "pm2 logs api --lines 50 --nostream"
        );
        assert_eq!(p.logs_command(50, true).render(), "pm2 logs api --lines 50");
    }
}
