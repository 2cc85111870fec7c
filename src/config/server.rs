// ABOUTME: Deployment target configuration: connection, bare repository and working directory.
// ABOUTME: Parses "[user@]host[:port]" shorthands and validates every shell-facing field.

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{AccountName, HostName, Label, RemotePath};

/// How the deploy repository reaches the target's bare repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// git over SSH, remote commands over a russh session.
    #[default]
    Ssh,
    /// Bare repository on this machine; commands run locally.
    Local,
}

/// One validated deployment destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    pub host: HostName,
    pub port: u16,
    pub user: Option<AccountName>,
    pub transport: Transport,
    pub bare_repo: RemotePath,
    pub work_dir: RemotePath,
    pub owner: Option<AccountName>,
    pub group: Option<AccountName>,
    pub label: Label,
    pub process_user: Option<AccountName>,
    pub trust_first_connection: bool,
    pub key_path: Option<PathBuf>,
}

/// `[user@]host[:port]` split into its parts, unvalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl Address {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("server address cannot be empty".to_string());
        }

        let (user, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user.to_string()), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, Some(port))
            }
            None => (rest, None),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(Address {
            user,
            host: host.to_string(),
            port,
        })
    }
}

impl ServerTarget {
    /// The git remote URL for this target.
    pub fn remote_url(&self) -> String {
        match self.transport {
            Transport::Local => self.bare_repo.to_string(),
            Transport::Ssh => {
                let user = self
                    .user
                    .as_ref()
                    .map(|u| format!("{}@", u))
                    .unwrap_or_default();
                format!("ssh://{}{}:{}{}", user, self.host, self.port, self.bare_repo)
            }
        }
    }

    /// `user@host` destination for the system `ssh` client.
    pub fn ssh_destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.to_string(),
        }
    }
}
