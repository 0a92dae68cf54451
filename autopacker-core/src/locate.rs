//! Mapping arbitrary changed paths to the unpacked directory that owns them.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::classify::has_unpacked_suffix;
use crate::types::{Conventions, UnpackedDir};

/// Find the unpacked directory that `changed` belongs to.
///
/// `changed` may be a file deep inside a unit, the unit directory itself, a
/// path that no longer exists, or something unrelated. The walk stops once it
/// climbs above `root`.
pub fn locate_sync_unit(
    changed: &Path,
    root: &Path,
    conventions: &Conventions,
) -> Option<UnpackedDir> {
    if dir_exists(changed) && has_unpacked_suffix(changed, conventions) {
        return Some(UnpackedDir::from(changed));
    }

    let root_len = root.as_os_str().len();
    let mut candidate = changed.parent();
    while let Some(dir) = candidate {
        let len = dir.as_os_str().len();
        if len == 0 || len < root_len {
            break;
        }
        if has_unpacked_suffix(dir, conventions) {
            return Some(UnpackedDir::from(dir));
        }
        candidate = dir.parent();
    }
    None
}

/// Every unpacked directory below `root`, sorted by path.
///
/// Unreadable subtrees are skipped.
pub fn discover_units(root: &Path, conventions: &Conventions) -> Vec<UnpackedDir> {
    let mut units: Vec<UnpackedDir> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && has_unpacked_suffix(e.path(), conventions))
        .map(|e| UnpackedDir(e.into_path()))
        .collect();
    units.sort();
    units
}

fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_dir()).unwrap_or(false)
}
