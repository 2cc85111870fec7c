// ABOUTME: Init command implementation.
// ABOUTME: Bootstraps every server of a service and reports per-target results.

use pushdeploy::bootstrap::{self, BootstrapReport};
use pushdeploy::config::ServiceConfig;
use pushdeploy::diagnostics::Diagnostics;
use pushdeploy::error::{Error, Result};
use pushdeploy::output::Output;

pub async fn init(service: &ServiceConfig, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    output.progress(&format!(
        "Initializing {} on {} server(s)",
        service.name,
        service.servers.len()
    ));

    let summary = bootstrap::bootstrap_all(service, &mut diag).await;
    for report in &summary.reports {
        output.progress(&describe(report));
    }
    for failure in &summary.failures {
        output.progress(&format!("  ✗ {}: {}", failure.label, failure.error));
    }

    output.warnings(&diag);
    output.result(&summary);

    if summary.all_failed() {
        return Err(Error::AllTargetsFailed {
            operation: "init",
            attempted: summary.attempted(),
        });
    }
    output.success(&format!(
        "Initialized {}/{} server(s)",
        summary.reports.len(),
        summary.attempted()
    ));
    Ok(())
}

fn describe(report: &BootstrapReport) -> String {
    let repo = if report.created_repo {
        "created bare repository"
    } else {
        "bare repository already initialized"
    };
    let mut line = format!("  ✓ {}: {}, hook installed", report.label, repo);
    if report.created_group {
        line.push_str(", group created");
    }
    if !report.installer_found {
        line.push_str(" (pushdeploy missing on server)");
    }
    line
}
