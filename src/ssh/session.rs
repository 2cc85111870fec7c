// ABOUTME: An authenticated SSH session to one deployment target.
// ABOUTME: Implements CommandRunner so bootstrap steps run the same way locally and remotely.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};

use super::auth::Credentials;
use super::error::{Error, Result};
use super::host_keys::{HostKeyPolicy, HostKeyVerifier};
use crate::config::ServerTarget;
use crate::shell::{CommandOutput, CommandRunner, ExecError, ShellCommand, quote};
use crate::types::RemotePath;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(600);
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for one target.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Explicit private key; `None` falls back to the agent and default keys.
    pub key_path: Option<PathBuf>,
    pub host_keys: HostKeyPolicy,
    /// Upper bound for TCP connect, handshake and authentication.
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl SessionConfig {
    /// Settings for a target; without a configured user the local login name is used.
    pub fn for_target(target: &ServerTarget, connect_timeout: Duration) -> Self {
        let user = match &target.user {
            Some(user) => user.to_string(),
            None => std::env::var("USER").unwrap_or_else(|_| "root".to_string()),
        };
        let host_keys = if target.trust_first_connection {
            HostKeyPolicy::TrustFirstUse
        } else {
            HostKeyPolicy::Strict
        };
        Self {
            host: target.host.to_string(),
            port: target.port,
            user,
            key_path: target.key_path.clone(),
            host_keys,
            connect_timeout,
            command_timeout: COMMAND_TIMEOUT,
        }
    }
}

pub struct Session {
    config: SessionConfig,
    handle: Handle<HostKeyVerifier>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.config.user)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect and authenticate, giving up once `connect_timeout` elapses.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let timeout = config.connect_timeout;
        tokio::time::timeout(timeout, Self::establish(config.clone()))
            .await
            .unwrap_or(Err(Error::ConnectTimeout {
                host: config.host,
                port: config.port,
                timeout,
            }))
    }

    async fn establish(config: SessionConfig) -> Result<Self> {
        let credentials = Credentials::resolve(config.key_path.as_deref()).await?;

        let settings = client::Config {
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..Default::default()
        };
        let verifier = HostKeyVerifier {
            host: config.host.clone(),
            port: config.port,
            policy: config.host_keys,
        };

        let mut handle = client::connect(
            Arc::new(settings),
            (config.host.as_str(), config.port),
            verifier,
        )
        .await
        .map_err(|e| Error::Connect {
            host: config.host.clone(),
            port: config.port,
            reason: e.to_string(),
        })?;

        if !credentials.authenticate(&mut handle, &config.user).await? {
            return Err(Error::AuthenticationFailed {
                user: config.user,
                host: config.host,
            });
        }

        tracing::debug!("ssh session open to {}@{}:{}", config.user, config.host, config.port);
        Ok(Self { config, handle })
    }

    /// Run a command line, optionally feeding `input` on stdin.
    pub async fn exec(&self, line: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
        let timeout = self.config.command_timeout;
        tokio::time::timeout(timeout, self.exec_channel(line, input))
            .await
            .unwrap_or(Err(Error::CommandTimeout(timeout)))
    }

    async fn exec_channel(&self, line: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Channel(e.to_string()))?;
        channel
            .exec(true, line)
            .await
            .map_err(|e| Error::Channel(e.to_string()))?;

        if let Some(input) = input {
            channel.data(input).await?;
            channel.eof().await?;
        }

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        let mut eof = false;

        // Exit status and EOF may arrive in either order.
        while let Some(message) = channel.wait().await {
            match message {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                ChannelMsg::Eof => eof = true,
                ChannelMsg::Close => break,
                _ => {}
            }
            if eof && exit_code.is_some() {
                break;
            }
        }

        Ok(CommandOutput {
            exit_code: exit_code.ok_or(Error::ChannelClosed)?,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for Session {
    async fn run(&self, command: &ShellCommand) -> std::result::Result<CommandOutput, ExecError> {
        let line = command.render();
        tracing::debug!("[{}] {}", self.config.host, line);
        self.exec(&line, None)
            .await
            .map_err(|e| ExecError::Remote(e.to_string()))
    }

    async fn write_file(
        &self,
        path: &RemotePath,
        contents: &str,
        mode: u32,
    ) -> std::result::Result<(), ExecError> {
        let target = quote(path.as_str());
        let line = format!("cat > {target} && chmod {mode:o} {target}");
        let output = self
            .exec(&line, Some(contents.as_bytes()))
            .await
            .map_err(|e| ExecError::Remote(e.to_string()))?;
        if output.success() {
            return Ok(());
        }
        Err(ExecError::WriteFile {
            path: path.to_string(),
            reason: output.stderr.trim().to_string(),
        })
    }

    fn describe(&self) -> String {
        format!("ssh {}@{}", self.config.user, self.config.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Transport;
    use crate::types::{AccountName, HostName, Label};

    fn target() -> ServerTarget {
        ServerTarget {
            host: HostName::new("web1.example.com").unwrap(),
            port: 2222,
            user: Some(AccountName::new("deploy").unwrap()),
            transport: Transport::Ssh,
            bare_repo: RemotePath::new("/srv/git/api.git").unwrap(),
            work_dir: RemotePath::new("/srv/apps/api").unwrap(),
            owner: None,
            group: None,
            label: Label::new("web1").unwrap(),
            process_user: None,
            trust_first_connection: false,
            key_path: None,
        }
    }

    #[test]
    fn target_settings_carry_connection_fields() {
        let config = SessionConfig::for_target(&target(), Duration::from_secs(3));
        assert_eq!(config.host, "web1.example.com");
        assert_eq!(config.port, 2222);
        assert_eq!(config.user, "deploy");
        assert_eq!(config.host_keys, HostKeyPolicy::Strict);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.command_timeout, COMMAND_TIMEOUT);
    }

    #[test]
    fn first_connection_trust_and_key_are_forwarded() {
        let mut target = target();
        target.trust_first_connection = true;
        target.key_path = Some(PathBuf::from("/home/me/.ssh/deploy"));

        let config = SessionConfig::for_target(&target, Duration::from_secs(5));

        assert_eq!(config.host_keys, HostKeyPolicy::TrustFirstUse);
        assert_eq!(config.key_path, Some(PathBuf::from("/home/me/.ssh/deploy")));
    }
}
