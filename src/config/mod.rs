// ABOUTME: Configuration types and parsing for pushdeploy.yml.
// ABOUTME: Handles file discovery, YAML parsing, env var interpolation and per-service resolution.

mod artifact;
mod deserialize;
mod env_value;
mod process_manager;
mod server;
mod service;

pub use artifact::{ArtifactPattern, wildcard_match};
pub use env_value::{EnvValue, is_valid_env_key, resolve_env_map};
pub use process_manager::{
    DaemonOptions, Pm2Options, ProcessManagerKind, ProcessSettings, SystemdOptions,
};
pub use server::{Address, ServerTarget, Transport};
pub use service::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_DEPLOY_DIR, Defaults, HooksConfig, ServiceConfig,
    ServiceEntry,
};

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "pushdeploy.yml";
pub const CONFIG_FILENAME_ALT: &str = "pushdeploy.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".pushdeploy/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    pub services: BTreeMap<String, ServiceEntry>,

    /// Directory relative `source` paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.base_dir = PathBuf::from(".");
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = config_base_dir(path);
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                let mut config = Self::load(path)?;
                // `.pushdeploy/config.yml` still describes the project directory.
                config.base_dir = dir.to_path_buf();
                return Ok(config);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Names of every configured service, sorted.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    /// Resolve and validate one service.
    pub fn service(&self, name: &str) -> Result<ServiceConfig> {
        let entry = self
            .services
            .get(name)
            .ok_or_else(|| Error::UnknownService {
                name: name.to_string(),
                known: self.service_names().iter().map(|s| s.to_string()).collect(),
            })?;
        entry.resolve(name, &self.defaults, &self.base_dir)
    }
}

fn config_base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
services:
  api:
    source: build
    artifacts: [dist, package.json]
    servers:
      - host: deploy@web1.example.com
        bare_repo: /srv/git/api.git
        work_dir: /srv/apps/api
"#;

    #[test]
    fn resolves_minimal_service() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let api = config.service("api").unwrap();

        assert_eq!(api.name.as_str(), "api");
        assert_eq!(api.deploy_repo_path, PathBuf::from("./build/.deploy"));
        assert_eq!(api.branch.as_str(), "master");
        assert_eq!(api.process.kind, ProcessManagerKind::Pm2);
        assert_eq!(api.process.name.as_str(), "api");
        assert_eq!(api.connect_timeout, DEFAULT_CONNECT_TIMEOUT);

        let server = api.primary();
        assert_eq!(server.host.as_str(), "web1.example.com");
        assert_eq!(server.user.as_ref().unwrap().as_str(), "deploy");
        assert_eq!(server.label.as_str(), "web1.example.com");
    }

    #[test]
    fn unknown_service_lists_known_names() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let err = config.service("web").unwrap_err();
        match err {
            Error::UnknownService { name, known } => {
                assert_eq!(name, "web");
                assert_eq!(known, vec!["api".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn string_servers_inherit_service_paths() {
        let yaml = r#"
services:
  api:
    source: .
    artifacts: [dist]
    bare_repo: /srv/git/api.git
    work_dir: /srv/apps/api
    servers:
      - web1.example.com
      - ops@web2.example.com:2222
"#;
        let api = Config::from_yaml(yaml).unwrap().service("api").unwrap();
        assert_eq!(api.servers.len(), 2);
        let second = &api.servers[1];
        assert_eq!(second.port, 2222);
        assert_eq!(second.bare_repo.as_str(), "/srv/git/api.git");
        assert_eq!(second.label.as_str(), "web2.example.com");
    }

    #[test]
    fn empty_server_list_is_rejected() {
        let yaml = r#"
services:
  api:
    source: .
    artifacts: [dist]
    servers: []
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("at least one server"));
    }

    #[test]
    fn unsafe_paths_are_rejected() {
        let yaml = r#"
services:
  api:
    source: .
    artifacts: [dist]
    servers:
      - host: web1
        bare_repo: "/srv/git/api.git; rm -rf /"
        work_dir: /srv/apps/api
"#;
        let err = Config::from_yaml(yaml)
            .unwrap()
            .service("api")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let yaml = r#"
services:
  api:
    source: .
    artifacts: [dist]
    bare_repo: /srv/git/api.git
    work_dir: /srv/apps/api
    servers:
      - web1
      - deploy@web1
"#;
        let err = Config::from_yaml(yaml)
            .unwrap()
            .service("api")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate label"));
    }

    #[test]
    fn daemon_requires_command() {
        let yaml = r#"
services:
  api:
    source: .
    artifacts: [dist]
    process_manager: daemon
    bare_repo: /srv/git/api.git
    work_dir: /srv/apps/api
    servers: [web1]
"#;
        let err = Config::from_yaml(yaml)
            .unwrap()
            .service("api")
            .unwrap_err();
        assert!(err.to_string().contains("daemon.command"));
    }

    #[test]
    fn defaults_block_applies() {
        let yaml = r#"
defaults:
  connect_timeout: 12s
  branch: production
services:
  api:
    source: .
    artifacts: [dist]
    bare_repo: /srv/git/api.git
    work_dir: /srv/apps/api
    servers: [web1]
"#;
        let api = Config::from_yaml(yaml).unwrap().service("api").unwrap();
        assert_eq!(api.connect_timeout, std::time::Duration::from_secs(12));
        assert_eq!(api.branch.as_str(), "production");
    }

    #[test]
    fn discover_finds_dir_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".pushdeploy")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), MINIMAL).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.base_dir, dir.path());
        let api = config.service("api").unwrap();
        assert_eq!(api.source_dir, dir.path().join("build"));
    }

    #[test]
    fn discover_reports_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }
}
