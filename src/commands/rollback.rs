// ABOUTME: Rollback command implementation.
// ABOUTME: Lists history, resolves the target, confirms, then resets and force-pushes.

use std::io::IsTerminal;

use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use pushdeploy::config::ServiceConfig;
use pushdeploy::diagnostics::Diagnostics;
use pushdeploy::error::{Error, Result};
use pushdeploy::git::LogEntry;
use pushdeploy::output::Output;
use pushdeploy::rollback::{
    self, CONFIRMATION_WARNING, Choice, PlanOutcome, RollbackOptions, RollbackTarget,
    parse_selection,
};

use super::finish;

pub struct RollbackArgs {
    pub target: Option<String>,
    pub steps: Option<usize>,
    pub list: bool,
    pub limit: usize,
    pub force: bool,
    pub all_servers: bool,
}

fn format_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "{}  {}  {}",
        entry.hash.short(),
        entry.date.format("%Y-%m-%d %H:%M"),
        entry.subject
    );
    if !entry.tags.is_empty() {
        line.push_str(&format!("  ({})", entry.tags.join(", ")));
    }
    line
}

fn prompt_error(e: dialoguer::Error) -> Error {
    Error::Io(std::io::Error::other(e))
}

fn require_terminal(what: &str) -> Result<()> {
    if std::io::stdin().is_terminal() {
        return Ok(());
    }
    Err(Error::Precondition {
        message: format!("{} needs an interactive terminal", what),
        hint: "pass a target (or --steps) and --force when running non-interactively".to_string(),
    })
}

pub async fn rollback(service: &ServiceConfig, args: RollbackArgs, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();
    let repo = rollback::open_history(service).await?;

    if args.list {
        let history = rollback::list_history(&repo, args.limit).await?;
        for (i, entry) in history.iter().enumerate() {
            let marker = if i == 0 { "*" } else { " " };
            output.data(&format!("{} {}", marker, format_entry(entry)), entry);
        }
        return Ok(());
    }

    let target = match (args.target, args.steps) {
        (Some(rev), _) => RollbackTarget::Ref(rev),
        (None, Some(steps)) => RollbackTarget::Steps(steps),
        (None, None) => match select_interactively(&repo, args.limit, &output).await? {
            Some(index) => RollbackTarget::Selection(index),
            None => {
                output.success("Rollback cancelled.");
                return Ok(());
            }
        },
    };

    let plan = match rollback::plan(&repo, &target).await? {
        PlanOutcome::AlreadyAtTarget(head) => {
            output.success(&format!(
                "Already at {}; nothing to roll back.",
                head.short()
            ));
            return Ok(());
        }
        PlanOutcome::Ready(plan) => plan,
    };

    if !args.force {
        require_terminal("rollback confirmation")?;
        output.warning(CONFIRMATION_WARNING);
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Roll {} back from {} to {}?",
                service.name,
                plan.current.short(),
                plan.target.short()
            ))
            .default(false)
            .interact()
            .map_err(prompt_error)?;
        if !confirmed {
            output.success("Rollback cancelled.");
            return Ok(());
        }
    }

    let options = RollbackOptions {
        all_servers: args.all_servers,
    };
    let result = rollback::execute(service, &repo, &plan, options, &mut diag).await?;
    finish(&output, &diag, &result)
}

/// Offer recent releases and read a selection. None means cancelled.
async fn select_interactively(
    repo: &pushdeploy::git::DeployRepository,
    limit: usize,
    output: &Output,
) -> Result<Option<usize>> {
    let listed = rollback::candidates(repo, limit).await?;
    if listed.is_empty() {
        return Err(Error::Precondition {
            message: "there is no earlier release to roll back to".to_string(),
            hint: "release at least twice before rolling back".to_string(),
        });
    }
    require_terminal("interactive rollback")?;

    for (i, entry) in listed.iter().enumerate() {
        output.progress(&format!("{:>3}) {}", i + 1, format_entry(entry)));
    }

    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Roll back to [1-{}, q to cancel]", listed.len()))
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_error)?;

    match parse_selection(&answer, listed.len())? {
        Choice::Pick(index) => Ok(Some(index)),
        Choice::Cancel => Ok(None),
    }
}
