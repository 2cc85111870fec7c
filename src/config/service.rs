// ABOUTME: Service definitions: the raw config entry and its validated ServiceConfig.
// ABOUTME: All shell-facing validation happens here, once, before any side effect.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactPattern;
use super::deserialize::{RawServer, ServerEntry, deserialize_servers};
use super::env_value::{EnvValue, resolve_env_map};
use super::process_manager::{
    DaemonOptions, Pm2Options, ProcessManagerKind, ProcessSettings, SystemdOptions,
};
use super::server::{Address, ServerTarget, Transport};
use crate::error::{Error, Result};
use crate::types::{
    AccountName, BranchName, HostName, Label, ProcessName, RelativePath, RemotePath, ServiceName,
};

pub const DEFAULT_DEPLOY_DIR: &str = ".deploy";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shell commands keyed by lifecycle point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HooksConfig {
    #[serde(default)]
    pub pre_publish_local: Vec<String>,
    #[serde(default)]
    pub post_install_remote: Vec<String>,
    #[serde(default)]
    pub post_publish_local: Vec<String>,
}

/// Service-wide fallbacks from the `defaults:` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Defaults {
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// A service as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    pub source: PathBuf,
    #[serde(default)]
    pub deploy_dir: Option<PathBuf>,
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub process_manager: ProcessManagerKind,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub pm2: Pm2Options,
    #[serde(default)]
    pub systemd: SystemdOptions,
    #[serde(default)]
    pub daemon: DaemonOptions,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub package_dir: Option<String>,
    #[serde(default)]
    pub install_command: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
    #[serde(default)]
    pub hooks: HooksConfig,
    #[serde(default)]
    pub notify_command: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,

    // Fallbacks for server entries that omit them.
    #[serde(default)]
    pub bare_repo: Option<String>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub process_user: Option<String>,

    #[serde(deserialize_with = "deserialize_servers")]
    pub servers: NonEmpty<ServerEntry>,
}

/// A validated service definition, owned for the duration of one command.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: ServiceName,
    pub source_dir: PathBuf,
    pub deploy_repo_path: PathBuf,
    pub artifacts: Vec<ArtifactPattern>,
    pub process: ProcessSettings,
    pub servers: NonEmpty<ServerTarget>,
    pub environment: BTreeMap<String, String>,
    pub hooks: HooksConfig,
    pub branch: BranchName,
    pub package_dir: Option<RelativePath>,
    pub install_command: Option<String>,
    pub connect_timeout: Duration,
    pub notify_command: Option<String>,
}

impl ServiceConfig {
    /// The first configured target, aliased as `origin` in the deploy repository.
    pub fn primary(&self) -> &ServerTarget {
        self.servers.first()
    }

    /// Look a target up by label.
    pub fn server(&self, label: &str) -> Option<&ServerTarget> {
        self.servers.iter().find(|s| s.label.as_str() == label)
    }
}

fn invalid(service: &str, field: &str, err: impl std::fmt::Display) -> Error {
    Error::InvalidConfig(format!("service '{}': {}: {}", service, field, err))
}

fn optional<T, E: std::fmt::Display>(
    service: &str,
    field: &str,
    value: Option<&str>,
    parse: impl Fn(&str) -> std::result::Result<T, E>,
) -> Result<Option<T>> {
    value
        .map(|v| parse(v).map_err(|e| invalid(service, field, e)))
        .transpose()
}

impl ServiceEntry {
    /// Validate this entry into a `ServiceConfig`.
    ///
    /// Relative `source` paths resolve against `base_dir` (the config file's directory).
    pub fn resolve(
        &self,
        name: &str,
        defaults: &Defaults,
        base_dir: &std::path::Path,
    ) -> Result<ServiceConfig> {
        let service_name = ServiceName::new(name).map_err(|e| invalid(name, "name", e))?;

        let source_dir = base_dir.join(&self.source);
        let deploy_dir = self
            .deploy_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOY_DIR));
        if deploy_dir.is_absolute() || deploy_dir.components().any(|c| c.as_os_str() == "..") {
            return Err(invalid(
                name,
                "deploy_dir",
                "must be a relative path inside the source directory",
            ));
        }
        let deploy_repo_path = source_dir.join(deploy_dir);

        if self.artifacts.is_empty() {
            return Err(invalid(name, "artifacts", "at least one artifact is required"));
        }
        let artifacts = self
            .artifacts
            .iter()
            .map(|a| ArtifactPattern::parse(a).map_err(|e| invalid(name, "artifacts", e)))
            .collect::<Result<Vec<_>>>()?;

        let process_name = match &self.process_name {
            Some(p) => ProcessName::new(p).map_err(|e| invalid(name, "process_name", e))?,
            None => ProcessName::new(service_name.as_str())
                .map_err(|e| invalid(name, "process_name", e))?,
        };
        if self.process_manager == ProcessManagerKind::Daemon && self.daemon.command.is_none() {
            return Err(invalid(
                name,
                "daemon.command",
                "required when process_manager is daemon",
            ));
        }
        let process = ProcessSettings {
            kind: self.process_manager,
            name: process_name,
            pm2: self.pm2.clone(),
            systemd: self.systemd.clone(),
            daemon: self.daemon.clone(),
        };

        let branch = match self.branch.as_deref().or(defaults.branch.as_deref()) {
            Some(b) => BranchName::new(b).map_err(|e| invalid(name, "branch", e))?,
            None => BranchName::default(),
        };

        let package_dir = optional(
            name,
            "package_dir",
            self.package_dir.as_deref(),
            RelativePath::new,
        )?;
        let environment = resolve_env_map(&self.env)?;

        let servers = self.resolve_servers(name)?;

        Ok(ServiceConfig {
            name: service_name,
            source_dir,
            deploy_repo_path,
            artifacts,
            process,
            servers,
            environment,
            hooks: self.hooks.clone(),
            branch,
            package_dir,
            install_command: self.install_command.clone(),
            connect_timeout: self
                .connect_timeout
                .or(defaults.connect_timeout)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            notify_command: self.notify_command.clone(),
        })
    }

    fn resolve_servers(&self, name: &str) -> Result<NonEmpty<ServerTarget>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.servers.len());

        for (index, entry) in self.servers.iter().enumerate() {
            let target = self.resolve_server(name, index, entry.clone().into_raw())?;
            if !seen.insert(target.label.clone()) {
                return Err(invalid(
                    name,
                    &format!("servers[{}].label", index),
                    format!("duplicate label '{}'; set distinct labels", target.label),
                ));
            }
            resolved.push(target);
        }

        NonEmpty::from_vec(resolved)
            .ok_or_else(|| invalid(name, "servers", "at least one server is required"))
    }

    fn resolve_server(&self, name: &str, index: usize, raw: RawServer) -> Result<ServerTarget> {
        let field = |f: &str| format!("servers[{}].{}", index, f);

        let address = match (&raw.host, raw.transport) {
            (Some(host), _) => Address::parse(host).map_err(|e| invalid(name, &field("host"), e))?,
            (None, Transport::Local) => Address {
                user: None,
                host: "localhost".to_string(),
                port: None,
            },
            (None, Transport::Ssh) => {
                return Err(invalid(name, &field("host"), "required for ssh transport"));
            }
        };

        let host = HostName::new(&address.host).map_err(|e| invalid(name, &field("host"), e))?;
        let user = optional(
            name,
            &field("user"),
            raw.user.as_deref().or(address.user.as_deref()),
            AccountName::new,
        )?;
        let port = raw.port.or(address.port).unwrap_or(22);

        let bare_repo = raw
            .bare_repo
            .as_deref()
            .or(self.bare_repo.as_deref())
            .ok_or_else(|| invalid(name, &field("bare_repo"), "required"))?;
        let bare_repo =
            RemotePath::new(bare_repo).map_err(|e| invalid(name, &field("bare_repo"), e))?;

        let work_dir = raw
            .work_dir
            .as_deref()
            .or(self.work_dir.as_deref())
            .ok_or_else(|| invalid(name, &field("work_dir"), "required"))?;
        let work_dir =
            RemotePath::new(work_dir).map_err(|e| invalid(name, &field("work_dir"), e))?;

        let owner = optional(
            name,
            &field("owner"),
            raw.owner.as_deref().or(self.owner.as_deref()),
            AccountName::new,
        )?;
        let group = optional(
            name,
            &field("group"),
            raw.group.as_deref().or(self.group.as_deref()),
            AccountName::new,
        )?;
        let process_user = optional(
            name,
            &field("process_user"),
            raw.process_user.as_deref().or(self.process_user.as_deref()),
            AccountName::new,
        )?;

        let label = match raw.label.as_deref() {
            Some(l) => Label::new(l),
            None if self.servers.len() == 1 || raw.transport == Transport::Ssh => {
                Label::new(host.as_str())
            }
            None => Label::new(&format!("server-{}", index)),
        }
        .map_err(|e| invalid(name, &field("label"), e))?;

        Ok(ServerTarget {
            host,
            port,
            user,
            transport: raw.transport,
            bare_repo,
            work_dir,
            owner,
            group,
            label,
            process_user,
            trust_first_connection: raw.trust_first_connection,
            key_path: raw.key,
        })
    }
}
