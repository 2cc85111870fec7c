// ABOUTME: Dependency installer detection from lockfiles in the install directory.
// ABOUTME: An explicit install_command always wins over detection.

use std::path::Path;

use serde::Serialize;

use crate::shell::ShellCommand;

/// A package manager recognised by its marker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Pnpm,
    Yarn,
    NpmCi,
    Npm,
    Pip,
}

/// Detection order: the first marker present decides.
const DETECTION_ORDER: &[PackageManager] = &[
    PackageManager::Pnpm,
    PackageManager::Yarn,
    PackageManager::NpmCi,
    PackageManager::Npm,
    PackageManager::Pip,
];

impl PackageManager {
    pub fn marker(&self) -> &'static str {
        match self {
            PackageManager::Pnpm => "pnpm-lock.yaml",
            PackageManager::Yarn => "yarn.lock",
            PackageManager::NpmCi => "package-lock.json",
            PackageManager::Npm => "package.json",
            PackageManager::Pip => "requirements.txt",
        }
    }

    pub fn command(&self) -> ShellCommand {
        match self {
            PackageManager::Pnpm => ShellCommand::new("pnpm")
                .arg("install")
                .arg("--prod")
                .arg("--frozen-lockfile"),
            PackageManager::Yarn => ShellCommand::new("yarn")
                .arg("install")
                .arg("--production")
                .arg("--frozen-lockfile"),
            PackageManager::NpmCi => ShellCommand::new("npm").arg("ci").arg("--omit=dev"),
            PackageManager::Npm => ShellCommand::new("npm").arg("install").arg("--omit=dev"),
            PackageManager::Pip => ShellCommand::new("pip")
                .arg("install")
                .arg("-r")
                .arg("requirements.txt"),
        }
    }

    /// The package manager whose marker exists in `dir`, if any.
    pub fn detect(dir: &Path) -> Option<PackageManager> {
        DETECTION_ORDER
            .iter()
            .copied()
            .find(|pm| dir.join(pm.marker()).is_file())
    }
}

/// How dependencies get installed for one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyPlan {
    /// The configured `install_command`, run under `sh -c`.
    Override(String),
    Detected(PackageManager),
    Skip,
}

impl DependencyPlan {
    pub fn choose(install_command: Option<&str>, dir: &Path) -> Self {
        match install_command {
            Some(command) if !command.trim().is_empty() => {
                DependencyPlan::Override(command.to_string())
            }
            _ => PackageManager::detect(dir)
                .map(DependencyPlan::Detected)
                .unwrap_or(DependencyPlan::Skip),
        }
    }

    pub fn command(&self) -> Option<ShellCommand> {
        match self {
            DependencyPlan::Override(command) => {
                Some(ShellCommand::new("sh").arg("-c").text(command))
            }
            DependencyPlan::Detected(pm) => Some(pm.command()),
            DependencyPlan::Skip => None,
        }
    }
}
