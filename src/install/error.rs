// ABOUTME: Installer error types with SNAFU pattern.
// ABOUTME: Each variant names the install step that failed; kind() exposes it for programmatic handling.

use std::path::PathBuf;

use snafu::Snafu;

use crate::lock::LockError;
use crate::manifest::ManifestError;
use crate::shell::ExecError;
use crate::types::{PathError, ServiceName};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InstallError {
    #[snafu(display("install context is missing {variable}"))]
    MissingContext { variable: &'static str },

    #[snafu(display("invalid install context {variable}: {reason}"))]
    InvalidContext {
        variable: &'static str,
        reason: String,
    },

    #[snafu(display("failed to read ref updates: {source}"))]
    ReadRefs { source: std::io::Error },

    #[snafu(display("another install is running: {source}"))]
    Locked { source: LockError },

    #[snafu(display("checkout failed: {source}"))]
    Checkout { source: ExecError },

    #[snafu(display("{source}"))]
    Manifest { source: ManifestError },

    #[snafu(display(
        "release manifest belongs to service '{found}', but the installer was invoked for '{expected}'"
    ))]
    ServiceMismatch {
        expected: ServiceName,
        found: ServiceName,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    Environment {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("dependency install `{command}` failed: {source}"))]
    Dependencies { command: String, source: ExecError },

    #[snafu(display("invalid process manager settings: {source}"))]
    ProcessSettings { source: PathError },

    #[snafu(display("restart failed: {source}"))]
    Restart { source: ExecError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallErrorKind {
    /// The hook environment or CLI flags did not describe a target.
    Context,
    /// Another installer holds the lock.
    Locked,
    /// Reading input, checking out or reading the manifest failed.
    Checkout,
    /// The environment file could not be written.
    Environment,
    /// The dependency installer failed.
    Dependencies,
    /// The process manager could not restart the process.
    Restart,
}

impl InstallError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> InstallErrorKind {
        match self {
            InstallError::MissingContext { .. } | InstallError::InvalidContext { .. } => {
                InstallErrorKind::Context
            }
            InstallError::Locked { .. } => InstallErrorKind::Locked,
            InstallError::ReadRefs { .. }
            | InstallError::Checkout { .. }
            | InstallError::Manifest { .. }
            | InstallError::ServiceMismatch { .. } => InstallErrorKind::Checkout,
            InstallError::Environment { .. } => InstallErrorKind::Environment,
            InstallError::Dependencies { .. } => InstallErrorKind::Dependencies,
            InstallError::ProcessSettings { .. } | InstallError::Restart { .. } => {
                InstallErrorKind::Restart
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_step() {
        let err = InstallError::MissingContext {
            variable: "PUSHDEPLOY_GIT_DIR",
        };
        assert_eq!(err.kind(), InstallErrorKind::Context);
        assert!(err.to_string().contains("PUSHDEPLOY_GIT_DIR"));

        let err = InstallError::Restart {
            source: ExecError::Remote("boom".to_string()),
        };
        assert_eq!(err.kind(), InstallErrorKind::Restart);
        assert_eq!(err.to_string(), "restart failed: remote execution failed: boom");
    }
}
