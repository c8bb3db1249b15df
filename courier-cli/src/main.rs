//! Courier — scheduled idempotent publisher for CN ASN IP lists.
//!
//! # Usage
//!
//! ```text
//! courier init <repository> [--committer-name <name>] [--committer-email <email>]
//!              [--hour-utc <h>] [--minute-utc <m>]
//! courier run [--dry-run]
//! courier status [--json]
//! courier diff
//! courier daemon start|stop|status|run|install|uninstall|logs
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, diff::DiffArgs, init::InitArgs, run::RunArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "courier",
    version,
    about = "Publish CN ASN IP range lists into a git repository, idempotently",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register the target repository and write the default config.
    Init(InitArgs),

    /// Produce artifacts, detect changes, and publish if anything differs.
    Run(RunArgs),

    /// Show per-artifact publication state.
    Status(StatusArgs),

    /// Show unified diffs of what a publish would record.
    Diff(DiffArgs),

    /// Manage the courier background daemon and launchd integration.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Run(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
