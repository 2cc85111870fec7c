// ABOUTME: Status command implementation.
// ABOUTME: Shows deploy repository presence, current release, remotes and unreleased changes.

use pushdeploy::config::ServiceConfig;
use pushdeploy::error::Result;
use pushdeploy::output::Output;
use pushdeploy::release;

pub async fn status(service: &ServiceConfig, output: Output) -> Result<()> {
    let status = release::inspect(service).await?;

    let mut lines = vec![format!("Service: {}", service.name)];
    if !status.initialized {
        lines.push(format!(
            "Deploy repository: {} (not staged yet)",
            status.path.display()
        ));
    } else {
        lines.push(format!("Deploy repository: {}", status.path.display()));
        match &status.head {
            Some(head) => lines.push(format!(
                "Current release: {} {} ({} total)",
                head.hash.short(),
                head.subject,
                status.releases
            )),
            None => lines.push("Current release: none".to_string()),
        }
        for (name, url) in &status.remotes {
            lines.push(format!("Remote {}: {}", name, url));
        }
        if status.unreleased.is_empty() {
            lines.push("Working tree: clean".to_string());
        } else {
            lines.push(format!(
                "Working tree: {} unreleased change(s)",
                status.unreleased.len()
            ));
        }
    }

    output.data(&lines.join("\n"), &status);
    Ok(())
}
