// ABOUTME: Logs command implementation.
// ABOUTME: Runs the process manager's log command on a server as a foreground child.

use std::process::Stdio;

use pushdeploy::config::ServiceConfig;
use pushdeploy::error::{Error, Result};
use pushdeploy::output::Output;
use pushdeploy::process;
use tokio::process::Command;

pub async fn logs(
    service: &ServiceConfig,
    server: Option<&str>,
    lines: usize,
    follow: bool,
    output: Output,
) -> Result<()> {
    let target = match server {
        Some(label) => service.server(label).ok_or_else(|| Error::Precondition {
            message: format!("service '{}' has no server labelled '{}'", service.name, label),
            hint: format!(
                "known servers: {}",
                service
                    .servers
                    .iter()
                    .map(|s| s.label.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })?,
        None => service.primary(),
    };

    let argv = process::logs_argv(&service.process, target, lines, follow)
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };
    output.progress(&format!("Logs for {} on {}", service.name, target.label));
    tracing::debug!("running {}", argv.join(" "));

    // Inherit the terminal; --follow ends with Ctrl-C.
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await?;

    if !status.success() && !follow {
        return Err(Error::Precondition {
            message: format!("log command exited with {}", status),
            hint: format!("run `{}` by hand to see why", argv.join(" ")),
        });
    }
    Ok(())
}
