//! Disk-side view of a folder: relative entry name → size and mtime.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

/// A regular file found under a scanned folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the scanned folder, `/`-separated.
    pub entry_name: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// Disk files keyed by [`entry_key`], so lookups ignore case.
pub type FileMap = BTreeMap<String, DiskFile>;

/// Zip entry name for a relative path: normal components joined with `/`.
pub fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Case-insensitive lookup key for an entry name; `\` counts as `/`.
pub fn entry_key(name: &str) -> String {
    name.replace('\\', "/").to_lowercase()
}

/// Collect every regular file under `root` for which `keep(absolute, relative)`
/// holds.
///
/// When two files differ only by case, the later one in walk order wins.
pub fn collect_files<F>(root: &Path, keep: F) -> Result<FileMap, SyncError>
where
    F: Fn(&Path, &Path) -> bool,
{
    let mut files = FileMap::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if !keep(entry.path(), relative) {
            continue;
        }

        let meta = entry.metadata()?;
        let modified = meta.modified().map_err(|e| io_err(entry.path(), e))?;
        let name = entry_name(relative);
        files.insert(
            entry_key(&name),
            DiskFile {
                path: entry.path().to_path_buf(),
                entry_name: name,
                size: meta.len(),
                modified,
            },
        );
    }
    Ok(files)
}
