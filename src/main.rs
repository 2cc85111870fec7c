// ABOUTME: Entry point for the pushdeploy CLI application.
// ABOUTME: Parses arguments, sets up logging and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use pushdeploy::config::{Config, ServiceConfig};
use pushdeploy::error::Result;
use pushdeploy::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag; RUST_LOG wins when set.
    let default = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, Output::new(mode)).await {
        let output = Output::new(mode);
        output.error(&e.to_string());
        if let Some(hint) = e.hint() {
            output.hint(&hint);
        }
        std::process::exit(1);
    }
}

/// Load the configuration and resolve one service from it.
fn load_service(cli_config: Option<&std::path::Path>, name: &str) -> Result<ServiceConfig> {
    let config = match cli_config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?,
    };
    config.service(name)
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Stage { service, dry_run } => {
            let service = load_service(config_path, &service)?;
            commands::stage(&service, dry_run, output).await
        }
        Commands::Release {
            service,
            message,
            dry_run,
        } => {
            let service = load_service(config_path, &service)?;
            commands::release(&service, message, dry_run, output).await
        }
        Commands::Deploy {
            service,
            message,
            skip_push,
            dry_run,
        } => {
            let service = load_service(config_path, &service)?;
            commands::deploy(&service, message, skip_push, dry_run, output).await
        }
        Commands::Init { service } => {
            let service = load_service(config_path, &service)?;
            commands::init(&service, output).await
        }
        Commands::Install {
            service,
            target_dir,
            git_dir,
            branch,
        } => {
            // Runs on the server from the hook; the release manifest replaces the config file.
            let overrides = pushdeploy::install::InstallOverrides {
                target_dir,
                git_dir,
                branch,
            };
            commands::install(&service, overrides, output).await
        }
        Commands::Rollback {
            service,
            target,
            steps,
            list,
            limit,
            force,
            all_servers,
        } => {
            let service = load_service(config_path, &service)?;
            let args = commands::RollbackArgs {
                target,
                steps,
                list,
                limit,
                force,
                all_servers,
            };
            commands::rollback(&service, args, output).await
        }
        Commands::Status { service } => {
            let service = load_service(config_path, &service)?;
            commands::status(&service, output).await
        }
        Commands::Logs {
            service,
            server,
            lines,
            follow,
        } => {
            let service = load_service(config_path, &service)?;
            commands::logs(&service, server.as_deref(), lines, follow, output).await
        }
    }
}
