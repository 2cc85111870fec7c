// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pushdeploy")]
#[command(about = "Push-to-deploy: commit build artifacts and push them to your servers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file (default: discovered in the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output (only final result)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Output as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy build artifacts into the deploy repository
    Stage {
        service: String,

        /// Show what would be copied without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Commit the staged tree and push it to every server
    Release {
        service: String,

        /// Commit message (default: "Release <timestamp>")
        #[arg(short, long)]
        message: Option<String>,

        /// Show pending changes and targets without committing
        #[arg(long)]
        dry_run: bool,
    },

    /// Stage, then release
    Deploy {
        service: String,

        #[arg(short, long)]
        message: Option<String>,

        /// Commit without pushing
        #[arg(long)]
        skip_push: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Prepare the bare repository, work directory and hook on every server
    Init { service: String },

    /// Install a pushed release (run by the post-receive hook)
    Install {
        service: String,

        /// Work tree to check out into (default: $PUSHDEPLOY_TARGET_DIR)
        #[arg(long)]
        target_dir: Option<String>,

        /// Bare repository that received the push (default: $PUSHDEPLOY_GIT_DIR)
        #[arg(long)]
        git_dir: Option<String>,

        /// Branch to deploy (default: $PUSHDEPLOY_BRANCH or master)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Roll the deployment back to an earlier release
    Rollback {
        service: String,

        /// Commit hash or tag to roll back to
        target: Option<String>,

        /// Go back N releases from the current one
        #[arg(long, conflicts_with = "target")]
        steps: Option<usize>,

        /// List recent releases and exit
        #[arg(long)]
        list: bool,

        /// Number of releases to list or offer
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,

        /// Force-push to every server instead of only the primary
        #[arg(long)]
        all_servers: bool,
    },

    /// Show the deploy repository state
    Status { service: String },

    /// Show the managed process's logs on a server
    Logs {
        service: String,

        /// Server label (default: the primary server)
        #[arg(long)]
        server: Option<String>,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: usize,

        /// Keep streaming new output
        #[arg(short, long)]
        follow: bool,
    },
}
