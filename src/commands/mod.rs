// ABOUTME: Command module aggregator for the pushdeploy CLI.
// ABOUTME: One handler per subcommand; shared result reporting lives here.

mod deploy;
mod init;
mod install;
mod logs;
mod release;
mod rollback;
mod stage;
mod status;

pub use deploy::deploy;
pub use init::init;
pub use install::install;
pub use logs::logs;
pub use release::release;
pub use rollback::{RollbackArgs, rollback};
pub use stage::stage;
pub use status::status;

use pushdeploy::diagnostics::Diagnostics;
use pushdeploy::error::{Error, Result};
use pushdeploy::output::Output;
use pushdeploy::release::{DeploymentResult, EXIT_POLICY, Operation};

/// Print warnings and the result, then apply the exit policy.
fn finish(output: &Output, diagnostics: &Diagnostics, result: &DeploymentResult) -> Result<()> {
    output.warnings(diagnostics);
    output.result(result);
    if EXIT_POLICY.is_failure(result) {
        return Err(Error::AllTargetsFailed {
            operation: match result.operation {
                Operation::Release => "release",
                Operation::Rollback => "rollback",
            },
            attempted: result.targets_attempted,
        });
    }
    output.success(&result.summary());
    Ok(())
}
