// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles the non-empty server list and its shorthand string entries.

use std::path::PathBuf;

use nonempty::NonEmpty;
use serde::Deserialize;

use super::server::Transport;

/// A server as written in the config file, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerEntry {
    /// `[user@]host[:port]`; paths come from the service-level defaults.
    Simple(String),
    Detailed(RawServer),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawServer {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub bare_repo: Option<String>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub process_user: Option<String>,
    #[serde(default)]
    pub trust_first_connection: bool,
    #[serde(default)]
    pub key: Option<PathBuf>,
}

impl ServerEntry {
    pub fn into_raw(self) -> RawServer {
        match self {
            ServerEntry::Simple(host) => RawServer {
                host: Some(host),
                ..Default::default()
            },
            ServerEntry::Detailed(raw) => raw,
        }
    }
}

pub fn deserialize_servers<'de, D>(deserializer: D) -> Result<NonEmpty<ServerEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<ServerEntry> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one server is required"))
}
