// ABOUTME: Stage command implementation.
// ABOUTME: Copies configured artifacts into the deploy repository, or reports the plan.

use pushdeploy::config::ServiceConfig;
use pushdeploy::diagnostics::Diagnostics;
use pushdeploy::error::Result;
use pushdeploy::output::Output;
use pushdeploy::stage::{self, StageReport};

pub async fn stage(service: &ServiceConfig, dry_run: bool, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();
    let report = run_stage(service, dry_run, &output, &mut diag).await?;
    output.warnings(&diag);
    output.result(&report);
    output.success(&report.summary());
    Ok(())
}

/// Stage and print per-artifact progress. Shared with `deploy`.
pub(super) async fn run_stage(
    service: &ServiceConfig,
    dry_run: bool,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<StageReport> {
    output.progress(&format!(
        "Staging {} from {}",
        service.name,
        service.source_dir.display()
    ));

    if dry_run {
        let plan = stage::plan(service)?;
        if plan.initialize {
            output.progress(&format!(
                "  → Would initialize {}",
                plan.deploy_repo.display()
            ));
        }
        for copy in &plan.copies {
            output.progress(&format!("  → Would copy {}", copy.relative));
        }
    }

    let report = stage::stage(service, dry_run, diag).await?;
    if report.initialized {
        output.progress(&format!(
            "  → Initialized deploy repository at {}",
            service.deploy_repo_path.display()
        ));
    }
    if !dry_run {
        for artifact in &report.staged {
            output.progress(&format!("  → {}", artifact));
        }
    }
    Ok(report)
}
