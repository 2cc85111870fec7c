// ABOUTME: Git error types with SNAFU pattern.
// ABOUTME: Carries the git arguments and stderr, classified into kinds for programmatic handling.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GitError {
    #[snafu(display("failed to run git {args}: {source}"))]
    Spawn {
        args: String,
        source: std::io::Error,
    },

    #[snafu(display("git {args} failed with code {code}: {stderr}"))]
    Command {
        args: String,
        code: i32,
        stderr: String,
    },

    #[snafu(display("unexpected output from git {args}: {output}"))]
    UnexpectedOutput { args: String, output: String },

    #[snafu(display("unknown revision: {rev}"))]
    UnknownRevision { rev: String },

    #[snafu(display("failed to prepare repository at {path}: {source}"))]
    Prepare {
        path: String,
        source: std::io::Error,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitErrorKind {
    /// The git binary is not on PATH.
    NotInstalled,
    /// Local I/O failure around a git invocation.
    Io,
    /// The remote could not be reached or refused the connection.
    Unreachable,
    /// The remote rejected the update (non-fast-forward, hook refusal).
    Rejected,
    /// `git commit` found nothing to record.
    NothingToCommit,
    /// A revision did not resolve to a commit.
    UnknownRevision,
    /// Any other non-zero exit.
    Failed,
}

const UNREACHABLE_MARKERS: &[&str] = &[
    "Could not read from remote repository",
    "Could not resolve hostname",
    "Connection refused",
    "Connection timed out",
    "Operation timed out",
    "No route to host",
    "does not appear to be a git repository",
    "Host key verification failed",
    "Permission denied",
];

impl GitError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> GitErrorKind {
        match self {
            GitError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                GitErrorKind::NotInstalled
            }
            GitError::Spawn { .. } | GitError::Prepare { .. } => GitErrorKind::Io,
            GitError::UnknownRevision { .. } => GitErrorKind::UnknownRevision,
            GitError::UnexpectedOutput { .. } => GitErrorKind::Failed,
            GitError::Command { stderr, .. } => {
                if stderr.contains("nothing to commit") || stderr.contains("nothing added to commit")
                {
                    GitErrorKind::NothingToCommit
                } else if UNREACHABLE_MARKERS.iter().any(|m| stderr.contains(m)) {
                    GitErrorKind::Unreachable
                } else if stderr.contains("[rejected]") || stderr.contains("[remote rejected]") {
                    GitErrorKind::Rejected
                } else {
                    GitErrorKind::Failed
                }
            }
        }
    }

    /// Captured stderr of a failed git command.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            GitError::Command { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
