//! `autopacker sync` — reconcile every unpacked folder once.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use autopacker_core::LockMonitor;
use autopacker_daemon::ProcessMonitor;
use autopacker_sync::{
    pipeline::{self, SyncScope},
    EntryChange, ReconcileReport,
};

use super::RootArgs;

/// Arguments for `autopacker sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub root: RootArgs,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.root.resolve()?;
        let monitor = ProcessMonitor::new(settings.conventions.owner_process.clone());
        if monitor.is_owner_running() {
            bail!(
                "{} is running and keeps archives locked; close the game and try again",
                monitor.process_name()
            );
        }

        let results = pipeline::run(&settings.working_dir, &settings.conventions, SyncScope::All);
        if results.is_empty() {
            println!("No unpacked folders found under '{}'.", settings.working_dir.display());
            return Ok(());
        }

        let mut failed = 0usize;
        for (unit, result) in &results {
            let label = unit.display_path(&settings.working_dir);
            match result {
                Ok(report) => print_report(&label, report),
                Err(err) => {
                    failed += 1;
                    println!("{} '{label}': {}", "✗".red(), settings.verbosity.render(err));
                }
            }
        }

        if failed > 0 {
            bail!("{failed} of {} unpacked folders failed to sync", results.len());
        }
        Ok(())
    }
}

fn print_report(label: &str, report: &ReconcileReport) {
    match report {
        ReconcileReport::SkippedEmpty { .. } => {
            println!("{} '{label}' — empty, archive left alone", "·".dimmed());
        }
        ReconcileReport::Unchanged { .. } => {
            println!("{} '{label}' — nothing to do", "✓".green());
        }
        ReconcileReport::Created { archive, changes }
        | ReconcileReport::Updated { archive, changes } => {
            println!(
                "{} '{label}' → {} ({} changes)",
                "✓".green(),
                archive.display(),
                changes.len()
            );
            for change in changes {
                match change {
                    EntryChange::Added(name) => println!("  +  {name}"),
                    EntryChange::Updated(name) => println!("  ✎  {name}"),
                    EntryChange::Removed(name) => println!("  -  {name}"),
                }
            }
        }
    }
}
