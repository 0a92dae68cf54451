//! `autopacker watch` — initial sync, then keep archives in step with edits.
//!
//! Operator commands are read from stdin on a separate thread:
//!
//! ```text
//! r | release   publish a release (Enter confirms)
//! <Enter> | q   stop watching
//! ```

use std::io::{self, BufRead, Write};
use std::thread;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::sync::broadcast;

use autopacker_core::config::Settings;
use autopacker_daemon::start_blocking;
use autopacker_sync::ReleaseOutcome;

use super::release::{describe, print_summary, publish};
use super::RootArgs;

/// Arguments for `autopacker watch` (the default command).
#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    #[command(flatten)]
    pub root: RootArgs,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.root.resolve()?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(16);

        println!(
            "Watching '{}'. Type {} + Enter to publish a release, Enter to exit.",
            settings.working_dir.display(),
            "r".bold()
        );
        {
            let settings = settings.clone();
            let shutdown = shutdown_tx.clone();
            thread::spawn(move || {
                operator_console(&settings, io::stdin().lock());
                let _ = shutdown.send(());
            });
        }

        start_blocking(settings, shutdown_tx, shutdown_rx).context("watcher exited with error")
    }
}

/// Serve operator commands until exit is requested or input ends.
fn operator_console(settings: &Settings, input: impl BufRead) {
    let mut lines = input.lines();
    while let Some(Ok(line)) = lines.next() {
        match line.trim().to_ascii_lowercase().as_str() {
            "r" | "release" => {
                print!("Publish a new release of every mod in development? [Enter to confirm] ");
                let _ = io::stdout().flush();
                match lines.next() {
                    Some(Ok(answer)) if answer.trim().is_empty() => release(settings),
                    Some(Ok(_)) => println!("Release cancelled."),
                    _ => return,
                }
            }
            "" | "q" | "quit" | "exit" => return,
            other => println!("Unknown command '{other}'. Use 'r' to release or Enter to exit."),
        }
    }
}

fn release(settings: &Settings) {
    match publish(settings) {
        Ok(ReleaseOutcome::Completed(summary)) => print_summary(&summary),
        Ok(ReleaseOutcome::Refused(reason)) => {
            println!("{} release refused: {}", "!".yellow(), describe(&reason));
        }
        Err(err) => println!("{} {err:#}", "✗".red()),
    }
}
