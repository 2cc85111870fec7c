// ABOUTME: Release manifest shipped inside every payload at .pushdeploy/manifest.json.
// ABOUTME: Carries the settings the server-side installer needs, versioned with the release.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ProcessSettings, ServiceConfig};
use crate::types::{BranchName, RelativePath, ServiceName};

pub const MANIFEST_DIR: &str = ".pushdeploy";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_FORMAT: u32 = 1;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("release manifest not found at {0}")]
    Missing(PathBuf),

    #[error("failed to read release manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write release manifest {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid release manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unsupported release manifest format {0} (expected {MANIFEST_FORMAT})")]
    UnsupportedFormat(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub format: u32,
    pub service: ServiceName,
    pub branch: BranchName,
    pub process: ProcessSettings,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub package_dir: Option<RelativePath>,
    #[serde(default)]
    pub install_command: Option<String>,
    #[serde(default)]
    pub post_install: Vec<String>,
}

impl ReleaseManifest {
    pub fn from_service(service: &ServiceConfig) -> Self {
        Self {
            format: MANIFEST_FORMAT,
            service: service.name.clone(),
            branch: service.branch.clone(),
            process: service.process.clone(),
            environment: service.environment.clone(),
            package_dir: service.package_dir.clone(),
            install_command: service.install_command.clone(),
            post_install: service.hooks.post_install_remote.clone(),
        }
    }

    /// Location of the manifest inside a checked-out tree.
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(MANIFEST_DIR).join(MANIFEST_FILE)
    }

    /// Write (or replace) the manifest under `root`.
    pub fn write_to(&self, root: &Path) -> Result<PathBuf, ManifestError> {
        let path = Self::path_in(root);
        let write_err = |source| ManifestError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(root.join(MANIFEST_DIR)).map_err(write_err)?;
        let mut json = serde_json::to_string_pretty(self).map_err(|e| ManifestError::Parse {
            path: path.clone(),
            source: e,
        })?;
        json.push('\n');
        std::fs::write(&path, json).map_err(write_err)?;
        Ok(path)
    }

    /// Read the manifest from a checked-out tree.
    pub fn read_from(root: &Path) -> Result<Self, ManifestError> {
        let path = Self::path_in(root);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::Missing(path));
            }
            Err(source) => return Err(ManifestError::Read { path, source }),
        };
        let manifest: ReleaseManifest =
            serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.clone(),
                source,
            })?;
        if manifest.format != MANIFEST_FORMAT {
            return Err(ManifestError::UnsupportedFormat(manifest.format));
        }
        Ok(manifest)
    }
}
