//! Domain types shared by the sync engine, the daemon and the CLI.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::strip_suffix_ignore_case;

// ---------------------------------------------------------------------------
// Conventions
// ---------------------------------------------------------------------------

/// Naming rules the game and the modding workflow agree on.
///
/// Every field can be overridden from `autopacker.yaml` in the working root;
/// missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conventions {
    /// Directory-name suffix marking an unpacked mod archive.
    pub unpacked_suffix: String,
    /// Extension (without dot) of the archive paired with each unpacked folder.
    pub archive_extension: String,
    /// Extension (without dot) editors use for scratch files.
    pub temp_extension: String,
    /// Substring marking backup copies of original game files.
    pub backup_marker: String,
    /// Process name of the game that keeps archives open.
    pub owner_process: String,
    /// Name of the game's mod directory.
    pub root_folder: String,
    /// Release directory, relative to the parent of the mod root.
    pub release_folder: PathBuf,
    /// Keep backup files inside archives instead of skipping them.
    pub pack_original: bool,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            unpacked_suffix: ".unpacked".to_string(),
            archive_extension: "pak".to_string(),
            temp_extension: "tmp".to_string(),
            backup_marker: ".original".to_string(),
            owner_process: "KingdomCome".to_string(),
            root_folder: "Mods".to_string(),
            release_folder: PathBuf::from("Mods-Dev").join("Release"),
            pack_original: false,
        }
    }
}

// ---------------------------------------------------------------------------
// UnpackedDir
// ---------------------------------------------------------------------------

/// An unpacked mod folder: the unit of synchronization.
///
/// Identity is the absolute path as discovered under the working root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnpackedDir(pub PathBuf);

impl UnpackedDir {
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Directory name with the unpacked suffix removed (`Foo.unpacked` → `Foo`).
    pub fn base_name(&self, conventions: &Conventions) -> String {
        let name = self
            .0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match strip_suffix_ignore_case(&name, &conventions.unpacked_suffix) {
            Some(base) => base.to_string(),
            None => name,
        }
    }

    /// Sibling archive path: `<parent>/<base_name>.<archive_extension>`.
    pub fn archive_path(&self, conventions: &Conventions) -> PathBuf {
        let file_name = format!(
            "{}.{}",
            self.base_name(conventions),
            conventions.archive_extension
        );
        match self.0.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    /// Path shown in logs: relative to `root` when possible.
    pub fn display_path(&self, root: &Path) -> String {
        self.0
            .strip_prefix(root)
            .unwrap_or(&self.0)
            .display()
            .to_string()
    }
}

impl fmt::Display for UnpackedDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

impl From<PathBuf> for UnpackedDir {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for UnpackedDir {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}
