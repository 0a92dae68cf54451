//! Timestamped release packages for every mod under development.
//!
//! A mod folder takes part only if it contains an unpacked directory
//! somewhere below it. The release zip holds the packaged output of the mod
//! (archives, manifests, anything outside unpacked folders) with every entry
//! rooted under `<mod>/`.

use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use walkdir::WalkDir;
use zip::ZipWriter;

use autopacker_core::{classify, Conventions, LockMonitor};

use crate::archive;
use crate::error::{io_err, SyncError};
use crate::reconcile::finish_writer;
use crate::scan::{self, FileMap};

/// Why a release request was turned down before touching anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefusalReason {
    /// The working directory is not the game's mod root.
    NotModRoot { working_dir: PathBuf, root_folder: String },
    /// The game is running; archives may be stale or locked.
    OwnerRunning { process: String },
}

/// Counters for one `publish_all` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseSummary {
    /// Mod folders with at least one unpacked directory.
    pub found: usize,
    pub published: usize,
    pub failed: usize,
    /// Found, but nothing was left to package after filtering.
    pub skipped_empty: usize,
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Refused(RefusalReason),
    Completed(ReleaseSummary),
}

enum ModOutcome {
    NotInDevelopment,
    Empty,
    Published(PathBuf),
}

/// Packages mods from `working_dir` into `release_dir/<mod>/`.
pub struct ReleaseBuilder<'a> {
    pub working_dir: &'a Path,
    pub release_dir: &'a Path,
    pub conventions: &'a Conventions,
    /// Skip the mod-root name check.
    pub any_folder: bool,
    pub monitor: &'a dyn LockMonitor,
}

impl ReleaseBuilder<'_> {
    /// Publish every mod under development, stamped with the current local time.
    pub fn publish_all(&self) -> Result<ReleaseOutcome, SyncError> {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        self.publish_all_at(&timestamp)
    }

    /// [`publish_all`](Self::publish_all) with an explicit artifact timestamp.
    pub fn publish_all_at(&self, timestamp: &str) -> Result<ReleaseOutcome, SyncError> {
        if let Some(reason) = self.refusal() {
            match &reason {
                RefusalReason::NotModRoot {
                    working_dir,
                    root_folder,
                } => tracing::warn!(
                    working_dir = %working_dir.display(),
                    "to create releases, the working directory must point to the {root_folder} folder",
                ),
                RefusalReason::OwnerRunning { process } => tracing::warn!(
                    process = %process,
                    "game is running; mod files are locked and may be out of sync",
                ),
            }
            return Ok(ReleaseOutcome::Refused(reason));
        }

        fs::create_dir_all(self.release_dir).map_err(|e| io_err(self.release_dir, e))?;

        let mut mod_dirs: Vec<PathBuf> = fs::read_dir(self.working_dir)
            .map_err(|e| io_err(self.working_dir, e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        mod_dirs.sort();

        let mut summary = ReleaseSummary::default();
        for mod_dir in mod_dirs {
            match self.publish_mod(&mod_dir, timestamp) {
                Ok(ModOutcome::NotInDevelopment) => {}
                Ok(ModOutcome::Empty) => {
                    summary.found += 1;
                    summary.skipped_empty += 1;
                }
                Ok(ModOutcome::Published(zip_path)) => {
                    summary.found += 1;
                    summary.published += 1;
                    tracing::info!(zip = %zip_path.display(), "new release zip file created");
                    summary.artifacts.push(zip_path);
                }
                Err(err) => {
                    summary.found += 1;
                    summary.failed += 1;
                    tracing::error!(
                        mod_dir = %mod_dir.display(),
                        error = %err,
                        "failed to publish the new release",
                    );
                }
            }
        }

        log_summary(&summary);
        Ok(ReleaseOutcome::Completed(summary))
    }

    fn refusal(&self) -> Option<RefusalReason> {
        let root_folder = &self.conventions.root_folder;
        let named_root = self
            .working_dir
            .file_name()
            .map(|name| name.to_string_lossy().eq_ignore_ascii_case(root_folder))
            .unwrap_or(false);
        if !self.any_folder && !named_root {
            return Some(RefusalReason::NotModRoot {
                working_dir: self.working_dir.to_path_buf(),
                root_folder: root_folder.clone(),
            });
        }
        if self.monitor.is_owner_running() {
            return Some(RefusalReason::OwnerRunning {
                process: self.conventions.owner_process.clone(),
            });
        }
        None
    }

    fn publish_mod(&self, mod_dir: &Path, timestamp: &str) -> Result<ModOutcome, SyncError> {
        if !has_unpacked_subtree(mod_dir, self.conventions) {
            return Ok(ModOutcome::NotInDevelopment);
        }
        let mod_name = mod_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let files = scan::collect_files(mod_dir, |absolute, relative| {
            !is_release_excluded(absolute, relative, self.conventions)
        })?;
        if files.is_empty() {
            tracing::info!(
                mod_name = %mod_name,
                "skipping empty mod folder to avoid creating an empty archive",
            );
            return Ok(ModOutcome::Empty);
        }

        let target_dir = self.release_dir.join(&mod_name);
        fs::create_dir_all(&target_dir).map_err(|e| io_err(&target_dir, e))?;
        let zip_path = target_dir.join(format!("{mod_name}-{timestamp}.zip"));
        write_release_zip(&zip_path, &mod_name, &files)?;
        Ok(ModOutcome::Published(zip_path))
    }
}

/// Write a brand-new release zip. Existing artifacts are never overwritten;
/// a partially written file is deleted on failure.
fn write_release_zip(zip_path: &Path, mod_name: &str, files: &FileMap) -> Result<(), SyncError> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(zip_path)
        .map_err(|e| io_err(zip_path, e))?;

    let result = fill_release_zip(file, zip_path, mod_name, files);
    if result.is_err() {
        let _ = fs::remove_file(zip_path);
    }
    result
}

fn fill_release_zip(
    file: File,
    zip_path: &Path,
    mod_name: &str,
    files: &FileMap,
) -> Result<(), SyncError> {
    let mut writer = ZipWriter::new(BufWriter::new(file));
    for disk in files.values() {
        let name = format!("{mod_name}/{}", disk.entry_name);
        archive::append_file(&mut writer, zip_path, disk, &name)?;
        tracing::info!("added: {}", disk.entry_name);
    }
    finish_writer(writer, zip_path)
}

/// Releases never carry scratch files, backups or unpacked working folders,
/// whatever `pack_original` says.
fn is_release_excluded(absolute: &Path, relative: &Path, conventions: &Conventions) -> bool {
    classify::is_temp_or_hidden(absolute, conventions)
        || classify::is_backup_file(absolute, conventions)
        || classify::is_under_reserved_subtree(relative, conventions)
}

fn has_unpacked_subtree(mod_dir: &Path, conventions: &Conventions) -> bool {
    WalkDir::new(mod_dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_dir() && classify::has_unpacked_suffix(e.path(), conventions))
}

fn log_summary(summary: &ReleaseSummary) {
    if summary.found == 0 {
        tracing::warn!("couldn't find any mods with unpacked folders to create a new release");
    }
    match summary.published {
        0 => tracing::info!("failed to publish any mod releases"),
        1 => tracing::info!("1 mod successfully published"),
        n => tracing::info!("{n} mods successfully published"),
    }
    match summary.failed {
        0 => {}
        1 => tracing::warn!("failed to publish 1 mod"),
        n => tracing::warn!("failed to publish {n} mods"),
    }
}
