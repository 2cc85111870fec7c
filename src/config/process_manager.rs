// ABOUTME: Process manager selection and per-adapter options.
// ABOUTME: Parses "pm2", "systemd" and "daemon" plus the settings each adapter needs.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::types::{ProcessName, RemotePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessManagerKind {
    #[default]
    Pm2,
    Systemd,
    Daemon,
}

impl FromStr for ProcessManagerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pm2" => Ok(ProcessManagerKind::Pm2),
            "systemd" | "systemctl" => Ok(ProcessManagerKind::Systemd),
            "daemon" => Ok(ProcessManagerKind::Daemon),
            other => Err(format!(
                "unknown process manager: {} (expected pm2, systemd or daemon)",
                other
            )),
        }
    }
}

impl fmt::Display for ProcessManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessManagerKind::Pm2 => write!(f, "pm2"),
            ProcessManagerKind::Systemd => write!(f, "systemd"),
            ProcessManagerKind::Daemon => write!(f, "daemon"),
        }
    }
}

impl<'de> Deserialize<'de> for ProcessManagerKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Serialize for ProcessManagerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pm2Options {
    /// Process descriptor started when the app is not yet known to pm2.
    #[serde(default = "default_ecosystem")]
    pub ecosystem: String,
}

fn default_ecosystem() -> String {
    "ecosystem.config.js".to_string()
}

impl Default for Pm2Options {
    fn default() -> Self {
        Self {
            ecosystem: default_ecosystem(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemdOptions {
    #[serde(default = "default_true")]
    pub sudo: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SystemdOptions {
    fn default() -> Self {
        Self { sudo: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonOptions {
    /// Start command, run under `sh -c` in the working directory.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub workers: Option<u32>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub pid_file: Option<RemotePath>,
}

/// Everything the installer needs to restart the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSettings {
    pub kind: ProcessManagerKind,
    pub name: ProcessName,
    #[serde(default)]
    pub pm2: Pm2Options,
    #[serde(default)]
    pub systemd: SystemdOptions,
    #[serde(default)]
    pub daemon: DaemonOptions,
}
