//! Shared sync entrypoint used by the CLI and the daemon's initial pass.

use std::path::Path;

use autopacker_core::{locate, Conventions, UnpackedDir};

use crate::{reconcile, ReconcileReport, SyncError};

/// Scope for a sync pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Every unpacked directory below the root.
    All,
    /// A single unpacked directory.
    Unit(UnpackedDir),
}

/// Reconcile every unit in `scope`.
///
/// Units are processed in path order. A failing unit does not stop the run;
/// its error is returned in place of a report.
pub fn run(
    root: &Path,
    conventions: &Conventions,
    scope: SyncScope,
) -> Vec<(UnpackedDir, Result<ReconcileReport, SyncError>)> {
    let units = match scope {
        SyncScope::All => locate::discover_units(root, conventions),
        SyncScope::Unit(unit) => vec![unit],
    };
    units
        .into_iter()
        .map(|unit| {
            let result = reconcile(&unit, conventions);
            if let Err(err) = &result {
                tracing::error!(unit = %unit, error = %err, "failed to sync unpacked folder");
            }
            (unit, result)
        })
        .collect()
}
