// ABOUTME: Git plumbing for the deploy repository.
// ABOUTME: Shells out to the git binary; errors carry arguments and stderr.

mod error;
mod repository;

pub use error::{GitError, GitErrorKind};
pub use repository::{COMMITTER_NAME, DeployRepository, LogEntry, PushMode};

/// Remote name for the target at `index` in configured order.
pub fn remote_name(index: usize) -> String {
    format!("deploy-{}", index)
}

/// Alias for the primary target.
pub const PRIMARY_REMOTE: &str = "origin";
