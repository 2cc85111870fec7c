// ABOUTME: Release command implementation.
// ABOUTME: Commits the staged tree and pushes it to every configured server.

use pushdeploy::config::ServiceConfig;
use pushdeploy::diagnostics::Diagnostics;
use pushdeploy::error::Result;
use pushdeploy::output::Output;
use pushdeploy::release::{self, PublishOptions, PublishOutcome, ReleasePreview};

use super::finish;

pub async fn release(
    service: &ServiceConfig,
    message: Option<String>,
    dry_run: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();
    let options = PublishOptions {
        message,
        dry_run,
        skip_push: false,
    };
    run_publish(service, &options, &output, &mut diag).await
}

/// Publish and report. Shared with `deploy`.
pub(super) async fn run_publish(
    service: &ServiceConfig,
    options: &PublishOptions,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<()> {
    output.progress(&format!(
        "Releasing {} to {} server(s)",
        service.name,
        service.servers.len()
    ));

    match release::publish(service, options, diag).await? {
        PublishOutcome::DryRun(preview) => {
            print_preview(output, &preview);
            output.warnings(diag);
            Ok(())
        }
        PublishOutcome::Published(result) => {
            for failure in &result.targets_failed {
                output.progress(&format!("  ✗ {}: {}", failure.label, failure.error));
            }
            finish(output, diag, &result)
        }
    }
}

fn print_preview(output: &Output, preview: &ReleasePreview) {
    output.data(
        &format!(
            "{} pending change(s) for {} on {}",
            preview.changes.len(),
            preview.branch,
            preview
                .targets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        preview,
    );
    for change in &preview.changes {
        output.progress(&format!("  {}", change));
    }
}
