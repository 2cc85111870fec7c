// ABOUTME: Install command implementation, invoked by the post-receive hook on the server.
// ABOUTME: Reads ref updates from stdin and runs the installer against the local machine.

use std::io::{IsTerminal, Read};

use pushdeploy::diagnostics::Diagnostics;
use pushdeploy::error::{Error, Result};
use pushdeploy::install::{self, InstallContext, InstallError, InstallOutcome, InstallOverrides};
use pushdeploy::output::Output;
use pushdeploy::shell::LocalRunner;
use pushdeploy::types::ServiceName;

pub async fn install(service: &str, overrides: InstallOverrides, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let service = ServiceName::new(service).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let context = InstallContext::from_env(service, overrides)?;

    let stdin = std::io::stdin();
    let ref_lines = read_ref_lines(stdin.is_terminal(), stdin.lock())?;

    let outcome = install::run_install(&context, &ref_lines, &LocalRunner, &mut diag).await?;
    output.warnings(&diag);

    match outcome {
        InstallOutcome::Ignored { branch } => {
            output.success(&format!("Push did not update {}; nothing to install.", branch));
        }
        InstallOutcome::Installed(report) => {
            output.result(&report);
            output.success(&format!(
                "Installed {} ({}) into {}",
                report.service,
                report.commit.short(),
                context.target_dir
            ));
        }
    }
    Ok(())
}

/// Read the hook's `<old> <new> <ref>` lines; a terminal never sends them.
fn read_ref_lines(interactive: bool, mut input: impl Read) -> Result<String> {
    if interactive {
        return Err(Error::Precondition {
            message: "install reads ref updates from the post-receive hook on stdin".to_string(),
            hint: "pipe '<old> <new> refs/heads/<branch>' lines into pushdeploy install".to_string(),
        });
    }
    let mut ref_lines = String::new();
    input
        .read_to_string(&mut ref_lines)
        .map_err(|source| InstallError::ReadRefs { source })?;
    Ok(ref_lines)
}
