//! `autopacker release` — zip every mod under development.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use autopacker_core::config::Settings;
use autopacker_daemon::ProcessMonitor;
use autopacker_sync::{RefusalReason, ReleaseBuilder, ReleaseOutcome, ReleaseSummary};

use super::RootArgs;

/// Arguments for `autopacker release`.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    #[command(flatten)]
    pub root: RootArgs,

    /// Emit the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReleaseArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.root.resolve()?;
        match publish(&settings)? {
            ReleaseOutcome::Completed(summary) => {
                if self.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&summary)
                            .context("failed to render release summary JSON")?
                    );
                } else {
                    print_summary(&summary);
                }
                Ok(())
            }
            ReleaseOutcome::Refused(reason) => bail!("release refused: {}", describe(&reason)),
        }
    }
}

/// Run one release batch with a process-table lock check.
pub fn publish(settings: &Settings) -> Result<ReleaseOutcome> {
    let monitor = ProcessMonitor::new(settings.conventions.owner_process.clone());
    ReleaseBuilder {
        working_dir: &settings.working_dir,
        release_dir: &settings.release_dir,
        conventions: &settings.conventions,
        any_folder: settings.any_folder,
        monitor: &monitor,
    }
    .publish_all()
    .with_context(|| {
        format!(
            "failed to publish releases into '{}'",
            settings.release_dir.display()
        )
    })
}

pub fn describe(reason: &RefusalReason) -> String {
    match reason {
        RefusalReason::NotModRoot {
            working_dir,
            root_folder,
        } => format!(
            "'{}' is not the {root_folder} folder (use --any-folder to override)",
            working_dir.display()
        ),
        RefusalReason::OwnerRunning { process } => {
            format!("{process} is running; close the game and try again")
        }
    }
}

pub fn print_summary(summary: &ReleaseSummary) {
    if summary.found == 0 {
        println!("{} no mods with unpacked folders found", "!".yellow());
        return;
    }

    let noun = if summary.published == 1 { "mod" } else { "mods" };
    println!(
        "{} {} {noun} published",
        "✓".green(),
        summary.published.to_string().bold()
    );
    for artifact in &summary.artifacts {
        println!("  ✎  {}", artifact.display());
    }
    if summary.skipped_empty > 0 {
        println!("{} {} skipped (nothing to package)", "·".dimmed(), summary.skipped_empty);
    }
    if summary.failed > 0 {
        println!("{} {} failed", "✗".red(), summary.failed.to_string().bold());
    }
}
