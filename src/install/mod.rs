// ABOUTME: Server-Side Installer invoked by the post-receive hook.
// ABOUTME: Checks out the pushed branch, writes .env, installs dependencies and restarts the process.

mod context;
mod dependencies;
mod error;
mod installation;
mod state;

pub use context::{InstallContext, InstallOverrides, RefUpdate, select_deploy_update};
pub use dependencies::{DependencyPlan, PackageManager};
pub use error::{InstallError, InstallErrorKind};
pub use installation::{ENV_FILE, InstallReport, Installation};
pub use state::{CheckedOut, DependenciesInstalled, EnvironmentReady, Received, Restarted};

use snafu::ResultExt;

use crate::diagnostics::Diagnostics;
use crate::lock::{FileLock, INSTALL_LOCK};
use crate::shell::CommandRunner;
use crate::types::BranchName;

use error::LockedSnafu;

#[derive(Debug, Clone)]
pub enum InstallOutcome {
    /// The push did not update the deploy branch.
    Ignored { branch: BranchName },
    Installed(InstallReport),
}

/// Install the update for the configured branch out of `ref_lines`, holding the install lock.
pub async fn run_install(
    context: &InstallContext,
    ref_lines: &str,
    runner: &dyn CommandRunner,
    diagnostics: &mut Diagnostics,
) -> Result<InstallOutcome, InstallError> {
    let updates = RefUpdate::parse_lines(ref_lines);
    let Some(update) = select_deploy_update(&updates, &context.branch) else {
        tracing::info!(
            "push did not update {}, nothing to install",
            context.branch.full_ref()
        );
        return Ok(InstallOutcome::Ignored {
            branch: context.branch.clone(),
        });
    };

    let lock_path = context.git_dir.as_path().join(INSTALL_LOCK);
    let _lock = FileLock::acquire(&lock_path, &format!("install {}", context.service))
        .context(LockedSnafu)?;

    let mut installation = Installation::new(context, runner, update.new.clone())
        .checkout()
        .await?
        .write_environment()?
        .install_dependencies()
        .await?;
    installation.run_post_install(diagnostics).await;

    let report = installation.restart().await?.finish();
    tracing::info!(
        "installed {} ({}) for {}",
        report.branch,
        report.commit.short(),
        report.service
    );
    Ok(InstallOutcome::Installed(report))
}
