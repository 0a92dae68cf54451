//! Folder-to-archive reconciliation.
//!
//! ## `reconcile` — protocol
//!
//! 1. Scan the unpacked folder, dropping temp, hidden and backup files.
//! 2. Empty scan → stop. An archive is never emptied because its folder was.
//! 3. No archive yet → deflate every file into `<archive>.autopacker.tmp`.
//! 4. Archive exists → plan removals, additions and replacements keyed by
//!    case-insensitive entry name; nothing to do → stop without writing.
//! 5. Otherwise stream into `<archive>.autopacker.tmp`: current entries are
//!    copied raw, new and stale files are deflated from disk.
//! 6. Rename the temp file over the archive.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::ZipWriter;

use autopacker_core::{classify, Conventions, UnpackedDir};

use crate::archive::{self, ArchiveEntry};
use crate::error::{io_err, zip_err, SyncError};
use crate::scan::{self, entry_key, DiskFile, FileMap};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One entry-level mutation applied to an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryChange {
    Added(String),
    Updated(String),
    Removed(String),
}

/// Outcome of reconciling one unpacked folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileReport {
    /// The folder held no packable files; the archive was left alone.
    SkippedEmpty { unit: UnpackedDir },
    /// A new archive was written.
    Created {
        archive: PathBuf,
        changes: Vec<EntryChange>,
    },
    /// An existing archive was rewritten.
    Updated {
        archive: PathBuf,
        changes: Vec<EntryChange>,
    },
    /// The archive already matched the folder.
    Unchanged { archive: PathBuf },
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Updated { .. })
    }

    pub fn changes(&self) -> &[EntryChange] {
        match self {
            Self::Created { changes, .. } | Self::Updated { changes, .. } => changes,
            Self::SkippedEmpty { .. } | Self::Unchanged { .. } => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Make the archive paired with `unit` match the folder's current contents.
pub fn reconcile(
    unit: &UnpackedDir,
    conventions: &Conventions,
) -> Result<ReconcileReport, SyncError> {
    let archive_path = unit.archive_path(conventions);
    let archive_label = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::info!(archive = %archive_label, "syncing pack file");

    let files = scan::collect_files(unit.path(), |absolute, _| {
        !classify::is_excluded(absolute, conventions)
    })?;

    if files.is_empty() {
        tracing::info!(
            unit = %unit,
            "skipping empty unpacked folder to avoid accidental archive deletion",
        );
        return Ok(ReconcileReport::SkippedEmpty { unit: unit.clone() });
    }

    if !archive_path.exists() {
        tracing::info!(archive = %archive_label, "making a new package file");
        let added: Vec<&DiskFile> = files.values().collect();
        replace_archive(&archive_path, |tmp| write_fresh(&archive_path, tmp, &added))?;
        let changes = added
            .iter()
            .map(|file| {
                tracing::info!("added: {}", file.entry_name);
                EntryChange::Added(file.entry_name.clone())
            })
            .collect();
        tracing::info!(archive = %archive_label, "package synchronized");
        return Ok(ReconcileReport::Created {
            archive: archive_path,
            changes,
        });
    }

    let entries = archive::read_entries(&archive_path)?;
    let plan = plan_update(&files, &entries);
    if plan.changes.is_empty() {
        tracing::info!(archive = %archive_label, "no changes found for package");
        return Ok(ReconcileReport::Unchanged {
            archive: archive_path,
        });
    }

    replace_archive(&archive_path, |tmp| {
        write_merged(&archive_path, tmp, &plan.keep, &plan.write)
    })?;
    for change in &plan.changes {
        match change {
            EntryChange::Added(name) => tracing::info!("added: {name}"),
            EntryChange::Updated(name) => tracing::info!("updated: {name}"),
            EntryChange::Removed(name) => tracing::info!("removed: {name}"),
        }
    }
    tracing::info!(archive = %archive_label, "package synchronized");

    Ok(ReconcileReport::Updated {
        archive: archive_path,
        changes: plan.changes,
    })
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

struct UpdatePlan<'a> {
    /// Entry indices to copy unchanged, in archive order.
    keep: Vec<usize>,
    /// Disk files to deflate (new or replacing a stale entry).
    write: Vec<&'a DiskFile>,
    changes: Vec<EntryChange>,
}

fn plan_update<'a>(files: &'a FileMap, entries: &[ArchiveEntry]) -> UpdatePlan<'a> {
    let mut keep = Vec::new();
    let mut write = Vec::new();
    let mut changes = Vec::new();
    let mut claimed = HashSet::new();

    for entry in entries {
        let key = entry_key(&entry.name);
        let Some(disk) = files.get(&key) else {
            changes.push(EntryChange::Removed(entry.name.clone()));
            continue;
        };
        if !claimed.insert(key) {
            // Same name twice (ignoring case): only the first survives.
            changes.push(EntryChange::Removed(entry.name.clone()));
            continue;
        }
        if archive::is_current(disk, entry) {
            keep.push(entry.index);
        } else {
            changes.push(EntryChange::Updated(disk.entry_name.clone()));
            write.push(disk);
        }
    }

    for (key, disk) in files {
        if !claimed.contains(key) {
            changes.push(EntryChange::Added(disk.entry_name.clone()));
            write.push(disk);
        }
    }

    UpdatePlan {
        keep,
        write,
        changes,
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn tmp_path(archive: &Path) -> PathBuf {
    PathBuf::from(format!("{}.autopacker.tmp", archive.display()))
}

/// Build the new archive with `write` at the temp path, then rename it over
/// `archive`. The temp file is removed on any failure.
fn replace_archive<F>(archive: &Path, write: F) -> Result<(), SyncError>
where
    F: FnOnce(&Path) -> Result<(), SyncError>,
{
    let tmp = tmp_path(archive);
    if let Err(err) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    if let Err(err) = fs::rename(&tmp, archive) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(archive, err));
    }
    Ok(())
}

fn write_fresh(archive: &Path, tmp: &Path, files: &[&DiskFile]) -> Result<(), SyncError> {
    let mut writer = create_writer(tmp)?;
    for file in files {
        archive::append_file(&mut writer, archive, file, &file.entry_name)?;
    }
    finish_writer(writer, tmp)
}

fn write_merged(
    archive: &Path,
    tmp: &Path,
    keep: &[usize],
    files: &[&DiskFile],
) -> Result<(), SyncError> {
    let mut source = archive::open_archive(archive)?;
    let mut writer = create_writer(tmp)?;
    for &index in keep {
        let entry = source.by_index_raw(index).map_err(|e| zip_err(archive, e))?;
        writer.raw_copy_file(entry).map_err(|e| zip_err(tmp, e))?;
    }
    for file in files {
        archive::append_file(&mut writer, archive, file, &file.entry_name)?;
    }
    finish_writer(writer, tmp)
}

pub(crate) fn create_writer(path: &Path) -> Result<ZipWriter<BufWriter<File>>, SyncError> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    Ok(ZipWriter::new(BufWriter::new(file)))
}

pub(crate) fn finish_writer(
    writer: ZipWriter<BufWriter<File>>,
    path: &Path,
) -> Result<(), SyncError> {
    let mut out = writer.finish().map_err(|e| zip_err(path, e))?;
    out.flush().map_err(|e| io_err(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
