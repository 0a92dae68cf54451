//! Path predicates used to filter change notifications and archive contents.
//!
//! None of these fail: a path that vanished between the event and the check
//! simply classifies as "not hidden".

use std::path::Path;

use crate::types::Conventions;

/// Return `name` without `suffix` when it ends with it, ignoring ASCII case.
pub fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = name.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// True when the last component of `path` ends with the unpacked suffix.
pub fn has_unpacked_suffix(path: &Path, conventions: &Conventions) -> bool {
    path.file_name()
        .map(|name| {
            strip_suffix_ignore_case(&name.to_string_lossy(), &conventions.unpacked_suffix)
                .is_some()
        })
        .unwrap_or(false)
}

/// Editor scratch file or hidden file.
pub fn is_temp_or_hidden(path: &Path, conventions: &Conventions) -> bool {
    let temp = path
        .extension()
        .map(|ext| {
            ext.to_string_lossy()
                .eq_ignore_ascii_case(&conventions.temp_extension)
        })
        .unwrap_or(false);
    temp || is_hidden(path)
}

/// Backup copy of an original game file.
pub fn is_backup_file(path: &Path, conventions: &Conventions) -> bool {
    let marker = conventions.backup_marker.to_ascii_lowercase();
    !marker.is_empty()
        && path
            .to_string_lossy()
            .to_ascii_lowercase()
            .contains(&marker)
}

/// True when any component of `path` ends with the unpacked suffix.
pub fn is_under_reserved_subtree(path: &Path, conventions: &Conventions) -> bool {
    path.components().any(|component| {
        strip_suffix_ignore_case(
            &component.as_os_str().to_string_lossy(),
            &conventions.unpacked_suffix,
        )
        .is_some()
    })
}

/// Files that never make it into an archive.
///
/// Backup files are only skipped while `pack_original` is off.
pub fn is_excluded(path: &Path, conventions: &Conventions) -> bool {
    is_temp_or_hidden(path, conventions)
        || (!conventions.pack_original && is_backup_file(path, conventions))
}

#[cfg(windows)]
fn is_hidden(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
