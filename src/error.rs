// ABOUTME: Application-wide error types for pushdeploy.
// ABOUTME: Uses thiserror; every fatal error can carry a remediation hint.

use std::path::PathBuf;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::git::{GitError, GitErrorKind};
use crate::hooks::HookError;
use crate::install::{InstallError, InstallErrorKind};
use crate::lock::LockError;
use crate::manifest::ManifestError;
use crate::release::ReleaseError;
use crate::rollback::RollbackError;
use crate::shell::ExecError;
use crate::stage::StageError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown service '{name}'")]
    UnknownService { name: String, known: Vec<String> },

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{message}")]
    Precondition { message: String, hint: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("git: {0}")]
    Git(#[from] GitError),

    #[error("SSH: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("install failed: {0}")]
    Install(#[from] InstallError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("{operation} failed on every target ({attempted} attempted)")]
    AllTargetsFailed {
        operation: &'static str,
        attempted: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

fn git_hint(error: &GitError) -> Option<String> {
    match error.kind() {
        GitErrorKind::NotInstalled => Some("install git and make sure it is on PATH".to_string()),
        GitErrorKind::Unreachable => Some(
            "check that the server is reachable and your SSH key is loaded (ssh-add -l)"
                .to_string(),
        ),
        GitErrorKind::Rejected => Some(
            "the remote refused the update; run `pushdeploy init` again to reinstall the hook"
                .to_string(),
        ),
        _ => None,
    }
}

impl Error {
    /// Suggested next step for the user, if there is an obvious one.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::ConfigNotFound(_) => Some(
                "create pushdeploy.yml in the project directory or pass --config <path>"
                    .to_string(),
            ),
            Error::UnknownService { known, .. } if known.is_empty() => {
                Some("no services are configured under `services:`".to_string())
            }
            Error::UnknownService { known, .. } => {
                Some(format!("configured services: {}", known.join(", ")))
            }
            Error::MissingEnvVar(name) => Some(format!(
                "export {} or give the reference a `default:`",
                name
            )),
            Error::Precondition { hint, .. } => Some(hint.clone()),
            Error::Git(e) => git_hint(e),
            Error::Stage(StageError::SourceMissing(path)) => Some(format!(
                "build the project first, or fix source_dir (currently {})",
                path.display()
            )),
            Error::Stage(StageError::NothingStaged { .. }) => {
                Some("check the `artifacts` list against your build output".to_string())
            }
            Error::Stage(StageError::Git(e)) => git_hint(e),
            Error::Release(ReleaseError::NotInitialized(_))
            | Error::Rollback(RollbackError::Release(ReleaseError::NotInitialized(_))) => {
                Some("run `pushdeploy stage <service>` first".to_string())
            }
            Error::Release(ReleaseError::Lock(_))
            | Error::Rollback(RollbackError::Release(ReleaseError::Lock(_)))
            | Error::Lock(_) => Some(
                "wait for the other pushdeploy process to finish; stale locks expire after an hour"
                    .to_string(),
            ),
            Error::Release(ReleaseError::Hook(_)) | Error::Hook(_) => {
                Some("fix the pre_publish_local hook; nothing was committed".to_string())
            }
            Error::Release(ReleaseError::Git(e)) | Error::Rollback(RollbackError::Git(e)) => {
                git_hint(e)
            }
            Error::Rollback(RollbackError::NoHistory(_)) => {
                Some("release at least once before rolling back".to_string())
            }
            Error::Rollback(RollbackError::UnknownTarget(_))
            | Error::Rollback(RollbackError::TooManySteps { .. }) => {
                Some("use `pushdeploy rollback <service> --list` to see releases".to_string())
            }
            Error::Bootstrap(BootstrapError::Connect { .. }) | Error::Ssh(_) => Some(
                "check the host, port and user, and that your SSH agent holds the key".to_string(),
            ),
            Error::Bootstrap(BootstrapError::Step { .. }) => Some(
                "the deploy user may need passwordless sudo for group setup (sudo -n)".to_string(),
            ),
            Error::Install(e) => match e.kind() {
                InstallErrorKind::Context => Some(
                    "the installer runs from the post-receive hook; re-run `pushdeploy init`"
                        .to_string(),
                ),
                InstallErrorKind::Locked => {
                    Some("another push is being installed; push again afterwards".to_string())
                }
                _ => None,
            },
            Error::AllTargetsFailed { .. } => {
                Some("see the warnings above for each target's error".to_string())
            }
            _ => None,
        }
    }
}
