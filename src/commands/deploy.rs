// ABOUTME: Deploy command implementation.
// ABOUTME: Stages artifacts and releases them in one step.

use pushdeploy::config::ServiceConfig;
use pushdeploy::diagnostics::Diagnostics;
use pushdeploy::error::Result;
use pushdeploy::output::Output;
use pushdeploy::release::PublishOptions;

use super::release::run_publish;
use super::stage::run_stage;

pub async fn deploy(
    service: &ServiceConfig,
    message: Option<String>,
    skip_push: bool,
    dry_run: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let report = run_stage(service, dry_run, &output, &mut diag).await?;
    output.progress(&report.summary());

    if dry_run && !service.deploy_repo_path.join(".git").exists() {
        // Nothing to diff against before the first stage.
        output.warnings(&diag);
        output.result(&report);
        return Ok(());
    }

    let options = PublishOptions {
        message,
        dry_run,
        skip_push,
    };
    run_publish(service, &options, &output, &mut diag).await
}
