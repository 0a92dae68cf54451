//! autopacker — keeps unpacked mod folders and their archives in sync.
//!
//! # Usage
//!
//! ```text
//! autopacker [watch] [DIR] [--any-folder] [--release-dir DIR] [--print-error-stack] [--pack-original]
//! autopacker release [DIR] [--any-folder] [--release-dir DIR] [--json]
//! autopacker sync [DIR] [--any-folder] [--pack-original]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{release::ReleaseArgs, sync::SyncArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "autopacker",
    version,
    about = "Keep unpacked mod folders in sync with their archives and publish releases",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    watch: WatchArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync every unpacked folder, then watch for changes (default).
    Watch(WatchArgs),

    /// Zip every mod under development into the release directory.
    Release(ReleaseArgs),

    /// Sync every unpacked folder once and exit.
    Sync(SyncArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    autopacker_daemon::init_tracing();
    match cli.command.unwrap_or(Commands::Watch(cli.watch)) {
        Commands::Watch(args) => args.run(),
        Commands::Release(args) => args.run(),
        Commands::Sync(args) => args.run(),
    }
}
